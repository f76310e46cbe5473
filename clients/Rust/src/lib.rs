//! # ReMIP Client
//!
//! A Rust client for ReMIP (Remote MIP) solver servers. Problems are posted as
//! JSON; the answer is either a single JSON solution or an event stream of
//! `log`, `metric`, `status` and `result` frames.
//!
//! ## Example
//!
//! ```no_run
//! use remip_client::{Problem, RemipClient};
//!
//! # async fn run(problem: Problem) -> Result<(), Box<dyn std::error::Error>> {
//! let client = RemipClient::new("http://localhost:9000")?;
//! match client.solve(&problem, None, None).await? {
//!     Some(solution) => println!("{}: {:?}", solution.status, solution.objective_value),
//!     None => println!("no solution produced"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod sse;
pub mod types;

pub use client::RemipClient;
pub use error::{RemipError, Result};
pub use types::{
    Coefficient, Constraint, Objective, Parameters, Problem, Solution, SolutionStatus,
    SolverEvent, Variable,
};
