//! # remip-engine
//!
//! Session-scoped modelling engine: callers register Lua model scripts,
//! run them against data in a per-session runtime, send the resulting
//! problem to a ReMIP solver and keep the solutions per session.
//!
//! ```no_run
//! use std::sync::Arc;
//! use remip_engine::{EngineConfig, Orchestrator, ToolHandler};
//!
//! # async fn run() -> Result<(), remip_engine::EngineError> {
//! remip_engine::logging::init();
//! let config = EngineConfig::from_env();
//! let tools = ToolHandler::new(Arc::new(Orchestrator::from_config(&config)?));
//!
//! let out = tools
//!     .call("session-1", "list_models", serde_json::Value::Null, None)
//!     .await;
//! println!("{out}");
//! tools.cleanup("session-1");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod runtime;
pub mod store;
pub mod tools;

pub use config::EngineConfig;
pub use error::EngineError;
pub use orchestrator::{Orchestrator, Solved};
pub use runtime::{ScriptRuntimeManager, ScriptError};
pub use store::TenantStore;
pub use tools::ToolHandler;
