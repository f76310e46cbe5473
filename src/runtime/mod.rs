//! Per-session embedded Lua runtimes.
//!
//! Each session gets its own VM with the `lp` modelling package and a `json`
//! helper preloaded, standard streams captured into drainable buffers, and
//! caller data injected as globals after validation.

pub mod error;
pub mod globals;
pub mod literal;
pub mod manager;
pub mod packages;
pub mod session;

pub use error::{ScriptError, ScriptErrorKind};
pub use manager::ScriptRuntimeManager;
pub use packages::{PackageConfig, BASELINE_PACKAGES};
pub use session::{ScriptOutput, ScriptRuntime};
