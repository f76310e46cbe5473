//! Transport-independent tool contract: a tool name and JSON arguments in,
//! structured JSON out. Failures never escape as `Err`; they are rendered as
//! `{"isError": true, "error": {"kind", "message"}}` with any captured output.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use remip_client::SolverEvent;

use crate::error::{EngineError, Result};
use crate::models::{
    GetModelOutput, GetSolutionOutput, ListModelsOutput, ListSolutionsOutput, ModelJsonOutput,
    SolveProblemOutput, ToolErrorBody,
};
use crate::orchestrator::Orchestrator;

/// Every tool `ToolHandler::call` understands
pub const TOOL_NAMES: &[&str] = &[
    "define_model",
    "solve_problem",
    "get_solution",
    "process_solution",
    "list_models",
    "get_model",
    "list_solutions",
    "check_packages",
    "get_model_json",
];

#[derive(Debug, Deserialize)]
struct DefineModelArgs {
    model_name: String,
    model_code: String,
    #[serde(default)]
    inputs: Option<Vec<String>>,
    #[serde(default)]
    sample_data: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct SolveProblemArgs {
    model_name: String,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    timeout: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct GetSolutionArgs {
    solution_id: String,
    #[serde(default = "default_true")]
    include_zero_variables: bool,
}

#[derive(Debug, Deserialize)]
struct ProcessSolutionArgs {
    solution_id: String,
    processing_code: String,
}

#[derive(Debug, Deserialize)]
struct ModelNameArgs {
    model_name: String,
}

#[derive(Debug, Deserialize)]
struct ModelJsonArgs {
    model_name: String,
    #[serde(default)]
    data: Map<String, Value>,
}

/// Routes tool calls to the orchestrator
#[derive(Clone)]
pub struct ToolHandler {
    orchestrator: Arc<Orchestrator>,
}

impl ToolHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Execute `tool` for `session_id`.
    ///
    /// `events` receives solver log/metric/status events during `solve_problem`.
    pub async fn call(
        &self,
        session_id: &str,
        tool: &str,
        args: Value,
        events: Option<UnboundedSender<SolverEvent>>,
    ) -> Value {
        debug!("[{session_id}] tool call {tool}");
        if tool == "solve_problem" {
            return self.solve_problem(session_id, args, events).await;
        }
        match self.dispatch(session_id, tool, args).await {
            Ok(value) => value,
            Err(err) => {
                warn!("[{session_id}] {tool} failed: {err}");
                error_output(&err)
            }
        }
    }

    /// Release everything the session owns; called once when the session closes
    pub fn cleanup(&self, session_id: &str) {
        self.orchestrator.cleanup(session_id);
    }

    async fn dispatch(&self, session_id: &str, tool: &str, args: Value) -> Result<Value> {
        let engine = &self.orchestrator;
        match tool {
            "define_model" => {
                let a: DefineModelArgs = parse_args(tool, args)?;
                let out = engine
                    .define_model(
                        session_id,
                        &a.model_name,
                        &a.model_code,
                        a.inputs,
                        a.sample_data.as_ref(),
                    )
                    .await?;
                to_json(&out)
            }
            "get_solution" => {
                let a: GetSolutionArgs = parse_args(tool, args)?;
                let solution =
                    engine.get_solution(session_id, &a.solution_id, a.include_zero_variables)?;
                to_json(&GetSolutionOutput { solution })
            }
            "process_solution" => {
                let a: ProcessSolutionArgs = parse_args(tool, args)?;
                let out = engine
                    .process_solution(session_id, &a.solution_id, &a.processing_code)
                    .await?;
                to_json(&out)
            }
            "list_models" => to_json(&ListModelsOutput {
                models: engine.list_models(session_id),
            }),
            "get_model" => {
                let a: ModelNameArgs = parse_args(tool, args)?;
                let model = engine.get_model(session_id, &a.model_name)?;
                to_json(&GetModelOutput { model })
            }
            "list_solutions" => to_json(&ListSolutionsOutput {
                solutions: engine.list_solutions(session_id),
            }),
            "check_packages" => to_json(&engine.check_packages(session_id).await?),
            "get_model_json" => {
                let a: ModelJsonArgs = parse_args(tool, args)?;
                let model_json = engine
                    .get_model_json(session_id, &a.model_name, &a.data)
                    .await?;
                to_json(&ModelJsonOutput { model_json })
            }
            other => Err(EngineError::Validation(format!("Unknown tool: {other}"))),
        }
    }

    async fn solve_problem(
        &self,
        session_id: &str,
        args: Value,
        events: Option<UnboundedSender<SolverEvent>>,
    ) -> Value {
        let result = match parse_args::<SolveProblemArgs>("solve_problem", args) {
            Ok(a) => {
                self.orchestrator
                    .solve_problem(session_id, &a.model_name, &a.data, a.timeout, events)
                    .await
            }
            Err(err) => Err(err),
        };

        let output = match result {
            Ok(solved) => SolveProblemOutput {
                summary: Some(solved.summary),
                is_error: false,
                error: None,
                stdout: non_empty(solved.output.stdout),
                stderr: non_empty(solved.output.stderr),
            },
            Err(err) => {
                warn!("[{session_id}] solve_problem failed: {err}");
                let (stdout, stderr) = err
                    .output()
                    .map(|(out, errs)| (non_empty(out.to_string()), non_empty(errs.to_string())))
                    .unwrap_or((None, None));
                SolveProblemOutput {
                    summary: None,
                    is_error: true,
                    error: Some(error_body(&err)),
                    stdout,
                    stderr,
                }
            }
        };
        to_json(&output).unwrap_or_else(|err| error_output(&err))
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| EngineError::Validation(format!("Invalid arguments for {tool}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::Internal(format!("failed to encode tool output: {e}")))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn error_body(err: &EngineError) -> ToolErrorBody {
    ToolErrorBody {
        kind: err.kind().to_string(),
        message: err.to_string(),
    }
}

/// Structured rendering of a failed tool call
pub fn error_output(err: &EngineError) -> Value {
    let mut body = json!({
        "isError": true,
        "error": error_body(err),
    });
    if let Some((stdout, stderr)) = err.output() {
        body["stdout"] = Value::String(stdout.to_string());
        body["stderr"] = Value::String(stderr.to_string());
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::solver::Solver;
    use crate::runtime::{PackageConfig, ScriptRuntimeManager};
    use crate::store::TenantStore;
    use async_trait::async_trait;
    use remip_client::{Problem, RemipError, Solution};

    struct NoSolver;

    #[async_trait]
    impl Solver for NoSolver {
        async fn solve(
            &self,
            _problem: &Problem,
            _timeout: Option<u64>,
            _events: Option<&UnboundedSender<SolverEvent>>,
        ) -> std::result::Result<Option<Solution>, RemipError> {
            Ok(None)
        }

        fn name(&self) -> &str {
            "none"
        }
    }

    fn handler() -> ToolHandler {
        ToolHandler::new(Arc::new(Orchestrator::new(
            Arc::new(TenantStore::new()),
            Arc::new(ScriptRuntimeManager::new(PackageConfig::default())),
            Arc::new(NoSolver),
        )))
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let out = handler().call("s", "launch", Value::Null, None).await;
        assert_eq!(out["isError"], true);
        assert_eq!(out["error"]["kind"], "validation");
        assert_eq!(out["error"]["message"], "Unknown tool: launch");
    }

    #[tokio::test]
    async fn test_missing_arguments_are_reported() {
        let out = handler().call("s", "get_model", json!({}), None).await;
        assert_eq!(out["error"]["kind"], "validation");
        assert!(out["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid arguments for get_model"));
    }

    #[tokio::test]
    async fn test_list_tools_on_empty_session() {
        let h = handler();
        assert_eq!(h.call("s", "list_models", Value::Null, None).await, json!({"models": []}));
        assert_eq!(
            h.call("s", "list_solutions", Value::Null, None).await,
            json!({"solutions": []})
        );
    }

    #[tokio::test]
    async fn test_solve_without_solution_has_null_summary() {
        let h = handler();
        let defined = h
            .call(
                "s",
                "define_model",
                json!({"model_name": "m", "model_code": "print('built'); p = lp.problem('m')"}),
                None,
            )
            .await;
        assert_eq!(defined["status"], "ok");

        let out = h
            .call("s", "solve_problem", json!({"model_name": "m", "data": {}}), None)
            .await;
        assert_eq!(out["summary"], Value::Null);
        assert_eq!(out["isError"], true);
        assert_eq!(out["error"]["message"], "Solver failed to produce a solution.");
        assert_eq!(out["stdout"], "built\n");
    }

    #[tokio::test]
    async fn test_discovery_failure_carries_output() {
        let out = handler()
            .call(
                "s",
                "define_model",
                json!({"model_name": "m", "model_code": "print('no problem here')"}),
                None,
            )
            .await;
        assert_eq!(out["isError"], true);
        assert_eq!(out["error"]["kind"], "discovery");
        assert_eq!(
            out["error"]["message"],
            "No lp.problem instance found in the model code."
        );
        assert_eq!(out["stdout"], "no problem here\n");
    }

    #[tokio::test]
    async fn test_tuple_keys_are_rejected() {
        let out = handler()
            .call(
                "s",
                "define_model",
                json!({
                    "model_name": "m",
                    "model_code": "p = lp.problem('m')",
                    "sample_data": {"costs": {"('a', 'b')": 1}},
                }),
                None,
            )
            .await;
        assert_eq!(out["error"]["kind"], "validation");
        assert_eq!(
            out["error"]["message"],
            "Input data validation failed: Unsupported key type 'tuple' found in input data."
        );
    }

    #[tokio::test]
    async fn test_cleanup_forgets_models() {
        let h = handler();
        h.call(
            "s",
            "define_model",
            json!({"model_name": "m", "model_code": "p = lp.problem('m')"}),
            None,
        )
        .await;
        h.cleanup("s");
        let out = h.call("s", "get_model", json!({"model_name": "m"}), None).await;
        assert_eq!(out["error"]["kind"], "not_found");
    }
}
