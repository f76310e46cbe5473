use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use remip_client::{Problem, RemipClient, RemipError, Solution, SolverEvent};

/// Common interface for remote MIP solvers
#[async_trait]
pub trait Solver: Send + Sync {
    /// Solve one problem
    ///
    /// # Arguments
    /// * `problem` - The solver-ready problem description
    /// * `timeout` - Solver-side time limit in seconds
    /// * `events` - Receives log, metric and status events while the call runs
    ///
    /// # Returns
    /// The terminal solution, or `None` when the solver produced no result
    async fn solve(
        &self,
        problem: &Problem,
        timeout: Option<u64>,
        events: Option<&UnboundedSender<SolverEvent>>,
    ) -> Result<Option<Solution>, RemipError>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}

#[async_trait]
impl Solver for RemipClient {
    async fn solve(
        &self,
        problem: &Problem,
        timeout: Option<u64>,
        events: Option<&UnboundedSender<SolverEvent>>,
    ) -> Result<Option<Solution>, RemipError> {
        RemipClient::solve(self, problem, timeout, events).await
    }

    fn name(&self) -> &str {
        "remip"
    }
}
