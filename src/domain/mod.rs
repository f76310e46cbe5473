pub mod discovery;
pub mod solve;
pub mod solver;
pub mod validate;

pub use discovery::DiscoveryError;
pub use solve::SolveStage;
pub use solver::Solver;
