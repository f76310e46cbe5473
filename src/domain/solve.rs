use log::{debug, info};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedSender};

use remip_client::{Solution, SolverEvent};

use crate::domain::discovery::{self, DiscoveryError};
use crate::domain::solver::Solver;
use crate::error::EngineError;
use crate::models::Problem;
use crate::runtime::{ScriptError, ScriptOutput, ScriptRuntime};

/// Steps of one solve call; any of them may end in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStage {
    Validating,
    Executing,
    Discovering,
    Solving,
    Persisted,
}

impl fmt::Display for SolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStage::Validating => "validating",
            SolveStage::Executing => "executing",
            SolveStage::Discovering => "discovering",
            SolveStage::Solving => "solving",
            SolveStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

pub fn enter(session_id: &str, stage: SolveStage) {
    debug!("[{session_id}] solve stage: {stage}");
}

/// Script failure with the output captured up to it
pub fn script_failure(runtime: &ScriptRuntime, context: &str, err: ScriptError) -> EngineError {
    let output = runtime.take_output();
    match err {
        err @ ScriptError::Execution { .. } => EngineError::ScriptExecution {
            message: format!("{context}: {}", err.friendly_message()),
            stdout: output.stdout,
            stderr: output.stderr,
        },
        other => EngineError::from(other),
    }
}

/// Run model code against `data` and extract its single problem, together
/// with the output the model wrote.
///
/// Clearing, running, discovery and the output drain happen in one exclusive
/// turn, so concurrent calls in a session never see each other's globals.
pub async fn build_problem(
    runtime: &ScriptRuntime,
    code: &str,
    data: &Map<String, Value>,
) -> Result<(Problem, ScriptOutput), EngineError> {
    let session_id = runtime.session_id();
    let _turn = runtime.exclusive().await;

    enter(session_id, SolveStage::Executing);
    discovery::clear_problems(runtime)
        .await
        .map_err(|e| script_failure(runtime, "Error preparing runtime", e))?;
    runtime
        .run(code, data)
        .await
        .map_err(|e| script_failure(runtime, "Error executing model code", e))?;

    enter(session_id, SolveStage::Discovering);
    match discovery::discover(runtime).await {
        Ok(problem) => Ok((problem, runtime.take_output())),
        Err(DiscoveryError::Script(e)) => {
            Err(script_failure(runtime, "Error serializing problem", e))
        }
        Err(e) => {
            let output = runtime.take_output();
            Err(EngineError::Discovery {
                message: e.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

/// Submit `problem`, forwarding solver events to `sink` for the duration of the call.
///
/// Returns the solution (if any) and the wall-clock solve time in seconds.
pub async fn run_solver(
    solver: &dyn Solver,
    problem: &Problem,
    timeout: Option<u64>,
    sink: Option<UnboundedSender<SolverEvent>>,
) -> Result<(Option<Solution>, f64), EngineError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<SolverEvent>();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("[solver] {event:?}");
            if let Some(sink) = &sink {
                // A caller that stopped listening does not abort the solve
                let _ = sink.send(event);
            }
        }
    });

    let started = Instant::now();
    let result = solver.solve(problem, timeout, Some(&tx)).await;
    let elapsed = started.elapsed().as_secs_f64();

    drop(tx);
    forwarder
        .await
        .map_err(|e| EngineError::Internal(format!("event forwarder failed: {e}")))?;

    let solution = result?;
    info!(
        "Solver {} finished in {:.3}s ({})",
        solver.name(),
        elapsed,
        solution
            .as_ref()
            .map(|s| s.status.to_string())
            .unwrap_or_else(|| "no result".to_string())
    );
    Ok((solution, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PackageConfig;
    use async_trait::async_trait;
    use remip_client::{RemipError, SolutionStatus};
    use serde_json::json;
    use std::collections::BTreeMap;

    struct FakeSolver {
        events: Vec<SolverEvent>,
        solution: Option<Solution>,
    }

    #[async_trait]
    impl Solver for FakeSolver {
        async fn solve(
            &self,
            _problem: &Problem,
            _timeout: Option<u64>,
            events: Option<&UnboundedSender<SolverEvent>>,
        ) -> Result<Option<Solution>, RemipError> {
            if let Some(tx) = events {
                for event in &self.events {
                    tx.send(event.clone()).unwrap();
                }
            }
            Ok(self.solution.clone())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn runtime() -> ScriptRuntime {
        ScriptRuntime::create("s", &PackageConfig::default()).unwrap()
    }

    const MODEL: &str = r#"
        prob = lp.problem("cap", lp.MAXIMIZE)
        local x = lp.variable("x", { low = 0, up = capacity })
        prob:set_objective(x)
    "#;

    #[tokio::test]
    async fn test_build_problem_uses_bound_data() {
        let rt = runtime();
        let data = json!({"capacity": 7}).as_object().unwrap().clone();
        let (problem, output) = build_problem(&rt, MODEL, &data).await.unwrap();
        assert_eq!(problem.variables[0].up_bound, Some(7.0));
        assert_eq!(output, ScriptOutput::default());
    }

    #[tokio::test]
    async fn test_build_problem_reports_script_failure_with_output() {
        let rt = runtime();
        let err = build_problem(&rt, "print('before'); return 1 // 0", &Map::new())
            .await
            .unwrap_err();
        match err {
            EngineError::ScriptExecution { message, stdout, .. } => {
                assert!(message.starts_with("Error executing model code: Division by zero"));
                assert_eq!(stdout, "before\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_problem_ignores_problems_from_earlier_runs() {
        let rt = runtime();
        let data = json!({"capacity": 1}).as_object().unwrap().clone();
        build_problem(&rt, MODEL, &data).await.unwrap();
        let err = build_problem(&rt, "y = 2", &Map::new()).await.unwrap_err();
        assert_eq!(err.kind(), "discovery");
    }

    #[tokio::test]
    async fn test_run_solver_forwards_events_before_returning() {
        let solver = FakeSolver {
            events: vec![
                SolverEvent::Log(json!({"message": "start"})),
                SolverEvent::Metric(json!({"gap": 0.1})),
            ],
            solution: Some(Solution {
                status: SolutionStatus::Optimal,
                objective_value: Some(1.0),
                variables: BTreeMap::new(),
                mip_gap: None,
                slacks: None,
                duals: None,
                reduced_costs: None,
            }),
        };
        let rt = runtime();
        let data = json!({"capacity": 1}).as_object().unwrap().clone();
        let (problem, _) = build_problem(&rt, MODEL, &data).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (solution, _) = run_solver(&solver, &problem, None, Some(tx)).await.unwrap();

        assert_eq!(solution.unwrap().status, SolutionStatus::Optimal);
        assert!(matches!(rx.recv().await, Some(SolverEvent::Log(_))));
        assert!(matches!(rx.recv().await, Some(SolverEvent::Metric(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_builds_in_one_session_keep_their_own_data() {
        let rt = std::sync::Arc::new(runtime());
        let handles: Vec<_> = (1..=30)
            .map(|capacity| {
                let rt = std::sync::Arc::clone(&rt);
                tokio::spawn(async move {
                    let data = json!({"capacity": capacity}).as_object().unwrap().clone();
                    let code = format!("{MODEL}\nprint({capacity})");
                    let (problem, output) = build_problem(&rt, &code, &data).await.unwrap();
                    (capacity, problem, output)
                })
            })
            .collect();

        for handle in handles {
            let (capacity, problem, output) = handle.await.unwrap();
            assert_eq!(problem.variables[0].up_bound, Some(capacity as f64));
            assert_eq!(output.stdout, format!("{capacity}\n"));
        }
    }
}
