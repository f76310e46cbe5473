//! Tool-level workflows over the store, the script runtimes and the solver.

use log::{info, warn};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use remip_client::SolverEvent;

use crate::config::EngineConfig;
use crate::convert::{to_solution_object, without_zero_variables};
use crate::domain::solve::{build_problem, enter, run_solver, script_failure, SolveStage};
use crate::domain::solver::Solver;
use crate::domain::validate::{validate_inputs, validate_model_name};
use crate::error::{EngineError, Result};
use crate::models::{
    CheckPackagesOutput, DefineModelOutput, EntityKind, Model, Problem, ProcessSolutionOutput,
    SolutionObject, SolutionSummary,
};
use crate::runtime::{ScriptOutput, ScriptRuntimeManager, BASELINE_PACKAGES};
use crate::store::TenantStore;

/// A persisted solve and the script output produced on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Solved {
    pub summary: SolutionSummary,
    pub output: ScriptOutput,
}

/// Session-scoped engine. Cheap to share behind an `Arc`.
pub struct Orchestrator {
    store: Arc<TenantStore>,
    runtimes: Arc<ScriptRuntimeManager>,
    solver: Arc<dyn Solver>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TenantStore>,
        runtimes: Arc<ScriptRuntimeManager>,
        solver: Arc<dyn Solver>,
    ) -> Self {
        Self {
            store,
            runtimes,
            solver,
        }
    }

    /// Engine wired to the solver and packages `config` describes
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let solver = config.solver_client()?;
        info!(
            "Using solver at {} (streaming: {})",
            solver.base_url(),
            solver.is_streaming()
        );
        Ok(Self::new(
            Arc::new(TenantStore::new()),
            Arc::new(ScriptRuntimeManager::new(config.package_config())),
            Arc::new(solver),
        ))
    }

    pub fn store(&self) -> &TenantStore {
        &self.store
    }

    pub fn runtimes(&self) -> &ScriptRuntimeManager {
        &self.runtimes
    }

    /// Register or replace a model.
    ///
    /// Declared inputs are `inputs` when given, else the keys of `sample_data`.
    /// The code is test-run through discovery when sample data is given or the
    /// model needs no inputs.
    pub async fn define_model(
        &self,
        session_id: &str,
        model_name: &str,
        model_code: &str,
        inputs: Option<Vec<String>>,
        sample_data: Option<&Map<String, Value>>,
    ) -> Result<DefineModelOutput> {
        validate_model_name(model_name)?;

        let declared = match (inputs, sample_data) {
            (Some(inputs), _) => inputs,
            (None, Some(sample)) => sample.keys().cloned().collect(),
            (None, None) => Vec::new(),
        };

        if sample_data.is_some() || declared.is_empty() {
            let empty = Map::new();
            let data = sample_data.unwrap_or(&empty);
            validate_inputs(&declared, data)?;
            let runtime = self.runtimes.acquire(session_id).await?;
            build_problem(&runtime, model_code, data).await?;
        }

        let model = Model::new(model_name, model_code, declared);
        let output = DefineModelOutput {
            status: "ok".to_string(),
            model_name: model.name.clone(),
            model_type: model.model_type.clone(),
        };
        self.store.set_model(session_id, model);
        info!("[{session_id}] defined model {model_name}");
        Ok(output)
    }

    /// Validate, execute, discover, solve and persist
    pub async fn solve_problem(
        &self,
        session_id: &str,
        model_name: &str,
        data: &Map<String, Value>,
        timeout: Option<u64>,
        events: Option<UnboundedSender<SolverEvent>>,
    ) -> Result<Solved> {
        enter(session_id, SolveStage::Validating);
        let model = self.model(session_id, model_name)?;
        validate_inputs(&model.inputs, data)?;

        let runtime = self.runtimes.acquire(session_id).await?;
        let (problem, output) = build_problem(&runtime, &model.code, data).await?;

        enter(session_id, SolveStage::Solving);
        let (solution, solve_time) = run_solver(self.solver.as_ref(), &problem, timeout, events)
            .await
            .map_err(|e| e.with_output(&output))?;
        let solution = solution.ok_or_else(|| EngineError::NoSolution {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        })?;

        if runtime.is_released() {
            warn!("[{session_id}] session closed during solve; result discarded");
            return Err(EngineError::SessionClosed(session_id.to_string()));
        }

        let solution_id = format!("sol-{}", Uuid::new_v4());
        let object = to_solution_object(solution_id, solution, solve_time);
        let summary = SolutionSummary::from(&object);
        self.store.set_solution(session_id, object);
        enter(session_id, SolveStage::Persisted);
        info!(
            "[{session_id}] stored {} ({}) for model {model_name}",
            summary.solution_id, summary.status
        );

        Ok(Solved { summary, output })
    }

    /// Stored solution, without zero-valued variables unless asked for
    pub fn get_solution(
        &self,
        session_id: &str,
        solution_id: &str,
        include_zero_variables: bool,
    ) -> Result<SolutionObject> {
        let solution = self
            .store
            .get_solution(session_id, solution_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Solution, solution_id))?;
        if include_zero_variables {
            Ok(solution)
        } else {
            Ok(without_zero_variables(&solution))
        }
    }

    /// Run `processing_code` with the stored solution bound as `solution`
    pub async fn process_solution(
        &self,
        session_id: &str,
        solution_id: &str,
        processing_code: &str,
    ) -> Result<ProcessSolutionOutput> {
        let solution = self.get_solution(session_id, solution_id, true)?;
        let value = serde_json::to_value(&solution)
            .map_err(|e| EngineError::Internal(format!("failed to encode solution: {e}")))?;
        let mut globals = Map::new();
        globals.insert("solution".to_string(), value);

        let runtime = self.runtimes.acquire(session_id).await?;
        let _turn = runtime.exclusive().await;
        let result = runtime
            .run(processing_code, &globals)
            .await
            .map_err(|e| script_failure(&runtime, "Error processing solution", e))?;
        let output = runtime.take_output();

        Ok(ProcessSolutionOutput {
            result,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    pub fn list_models(&self, session_id: &str) -> Vec<Model> {
        self.store.list_models(session_id)
    }

    pub fn get_model(&self, session_id: &str, model_name: &str) -> Result<Model> {
        self.model(session_id, model_name)
    }

    pub fn list_solutions(&self, session_id: &str) -> Vec<SolutionSummary> {
        self.store.list_solutions(session_id)
    }

    /// Which baseline and configured packages the session runtime can load
    pub async fn check_packages(&self, session_id: &str) -> Result<CheckPackagesOutput> {
        let names: Vec<String> = BASELINE_PACKAGES
            .iter()
            .map(|name| name.to_string())
            .chain(self.runtimes.package_config().extra.iter().cloned())
            .collect();

        let runtime = self.runtimes.acquire(session_id).await?;
        let (installed, not_installed) = runtime.package_status(names).await?;
        let status = if not_installed.is_empty() { "ok" } else { "error" };
        Ok(CheckPackagesOutput {
            status: status.to_string(),
            installed,
            not_installed,
        })
    }

    /// The problem a model builds from `data`, without solving it
    pub async fn get_model_json(
        &self,
        session_id: &str,
        model_name: &str,
        data: &Map<String, Value>,
    ) -> Result<Problem> {
        let model = self.model(session_id, model_name)?;
        validate_inputs(&model.inputs, data)?;
        let runtime = self.runtimes.acquire(session_id).await?;
        let (problem, _) = build_problem(&runtime, &model.code, data).await?;
        Ok(problem)
    }

    /// Release everything the session owns
    pub fn cleanup(&self, session_id: &str) {
        let had_runtime = self.runtimes.release(session_id);
        let removed = self.store.clear_session(session_id);
        info!("[{session_id}] cleaned up (runtime: {had_runtime}, entries removed: {removed})");
    }

    fn model(&self, session_id: &str, model_name: &str) -> Result<Model> {
        self.store
            .get_model(session_id, model_name)
            .ok_or_else(|| EngineError::not_found(EntityKind::Model, model_name))
    }
}
