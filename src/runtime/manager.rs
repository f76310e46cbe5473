use log::{debug, info};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::error::ScriptError;
use super::packages::PackageConfig;
use super::session::{ScriptOutput, ScriptRuntime};

/// Memoized runtime creation for one session
#[derive(Default)]
struct SessionSlot {
    runtime: OnceCell<Arc<ScriptRuntime>>,
}

/// Owns one script runtime per session.
///
/// Creation is memoized per session: concurrent callers for the same session
/// wait on the first caller's initialization. Sessions never share a lock
/// beyond the short map lookup.
pub struct ScriptRuntimeManager {
    config: PackageConfig,
    sessions: Mutex<HashMap<String, Arc<SessionSlot>>>,
    created: AtomicUsize,
}

impl ScriptRuntimeManager {
    pub fn new(config: PackageConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
        }
    }

    pub fn package_config(&self) -> &PackageConfig {
        &self.config
    }

    /// The session's runtime, created on first use
    pub async fn acquire(&self, session_id: &str) -> Result<Arc<ScriptRuntime>, ScriptError> {
        let slot = {
            let mut sessions = self.sessions.lock();
            Arc::clone(sessions.entry(session_id.to_string()).or_default())
        };

        let runtime = slot
            .runtime
            .get_or_try_init(|| async {
                let id = session_id.to_string();
                let config = self.config.clone();
                let runtime = tokio::task::spawn_blocking(move || ScriptRuntime::create(&id, &config))
                    .await
                    .map_err(|e| ScriptError::Aborted(e.to_string()))??;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Script runtime ready for session {session_id} ({total} created)");
                Ok::<_, ScriptError>(Arc::new(runtime))
            })
            .await?;

        // Released while initializing: the runtime belongs to nobody
        let current = self.sessions.lock().get(session_id).cloned();
        if !current.is_some_and(|c| Arc::ptr_eq(&c, &slot)) {
            runtime.mark_released();
            return Err(ScriptError::Closed(session_id.to_string()));
        }
        Ok(Arc::clone(runtime))
    }

    /// Run `code` in the session's runtime with `globals` bound
    pub async fn run(
        &self,
        session_id: &str,
        code: &str,
        globals: &Map<String, Value>,
    ) -> Result<Value, ScriptError> {
        let runtime = self.acquire(session_id).await?;
        runtime.run(code, globals).await
    }

    /// Drain captured output; empty when the session has no runtime
    pub fn get_output(&self, session_id: &str) -> ScriptOutput {
        let slot = self.sessions.lock().get(session_id).cloned();
        slot.and_then(|s| s.runtime.get().map(|rt| rt.take_output()))
            .unwrap_or_default()
    }

    /// Discard the session's runtime. Returns whether one was registered.
    pub fn release(&self, session_id: &str) -> bool {
        let slot = self.sessions.lock().remove(session_id);
        match slot {
            Some(slot) => {
                if let Some(runtime) = slot.runtime.get() {
                    runtime.mark_released();
                }
                debug!("Released script runtime for session {session_id}");
                true
            }
            None => false,
        }
    }

    /// Total runtimes created over the manager's lifetime
    pub fn runtimes_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Sessions that currently own an initialized runtime
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|slot| slot.runtime.initialized())
            .count()
    }
}
