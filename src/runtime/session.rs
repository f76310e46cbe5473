use log::debug;
use mlua::{Function, Lua, LuaSerdeExt, Value as LuaValue};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use super::error::ScriptError;
use super::globals;
use super::packages::{self, OutputBuffers, PackageConfig};

/// Captured standard streams of a runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One isolated interpreter bound to a session.
///
/// Executions are serialized; the lock guard travels into the blocking task,
/// so the next execution only starts once the VM is idle even if the caller
/// that started the previous one went away.
pub struct ScriptRuntime {
    session_id: String,
    lua: Lua,
    output: Arc<Mutex<OutputBuffers>>,
    exec_lock: Arc<tokio::sync::Mutex<()>>,
    turn: Arc<tokio::sync::Mutex<()>>,
    released: Arc<AtomicBool>,
}

impl std::fmt::Debug for ScriptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRuntime")
            .field("session_id", &self.session_id)
            .field("released", &self.is_released())
            .finish()
    }
}

impl ScriptRuntime {
    /// Build a runtime with the baseline and configured packages. Blocking.
    pub fn create(session_id: &str, config: &PackageConfig) -> Result<Self, ScriptError> {
        let lua = Lua::new();
        let output = Arc::new(Mutex::new(OutputBuffers::default()));
        packages::install(&lua, &output, config).map_err(|e| ScriptError::Init(e.to_string()))?;
        debug!("Created script runtime for session {session_id}");
        Ok(Self {
            session_id: session_id.to_string(),
            lua,
            output,
            exec_lock: Arc::new(tokio::sync::Mutex::new(())),
            turn: Arc::new(tokio::sync::Mutex::new(())),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the owning session was torn down
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_released(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    /// Exclusive use of the session for a multi-step workflow.
    ///
    /// Executions by other holders cannot interleave with the ones made while
    /// the guard is alive. Single executions do not need it.
    pub async fn exclusive(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.turn).lock_owned().await
    }

    /// Bind `globals`, execute `code` and return its terminal value as JSON
    pub async fn run(&self, code: &str, globals: &Map<String, Value>) -> Result<Value, ScriptError> {
        let prepared = globals::prepare(globals)?;
        let code = code.to_string();
        self.with_lua(move |lua| {
            let table = lua.globals();
            for (name, value) in &prepared {
                let value = packages::json_to_lua(lua, value).map_err(|e| ScriptError::execution(&e))?;
                table
                    .set(name.as_str(), value)
                    .map_err(|e| ScriptError::execution(&e))?;
            }
            let result: LuaValue = lua
                .load(code.as_str())
                .set_name("=model")
                .eval()
                .map_err(|e| ScriptError::execution(&e))?;
            to_json(lua, result).map_err(|e| ScriptError::execution(&e))
        })
        .await
    }

    /// Execute `code` and deserialize its value into `T`
    pub async fn eval<T>(&self, code: &'static str) -> Result<T, ScriptError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.with_lua(move |lua| {
            let result: LuaValue = lua
                .load(code)
                .set_name("=engine")
                .eval()
                .map_err(|e| ScriptError::execution(&e))?;
            lua.from_value(result).map_err(|e| ScriptError::execution(&e))
        })
        .await
    }

    /// Split `names` into available and unavailable packages
    pub async fn package_status(
        &self,
        names: Vec<String>,
    ) -> Result<(Vec<String>, Vec<String>), ScriptError> {
        self.with_lua(move |lua| packages::status(lua, &names).map_err(|e| ScriptError::execution(&e)))
            .await
    }

    /// Drain everything written to the standard streams so far
    pub fn take_output(&self) -> ScriptOutput {
        let mut buffers = self.output.lock();
        ScriptOutput {
            stdout: std::mem::take(&mut buffers.stdout),
            stderr: std::mem::take(&mut buffers.stderr),
        }
    }

    async fn with_lua<R, F>(&self, f: F) -> Result<R, ScriptError>
    where
        F: FnOnce(&Lua) -> Result<R, ScriptError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_released() {
            return Err(ScriptError::Closed(self.session_id.clone()));
        }
        let guard = Arc::clone(&self.exec_lock).lock_owned().await;
        let lua = self.lua.clone();
        let released = Arc::clone(&self.released);
        let session_id = self.session_id.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            // released while waiting for the previous execution
            if released.load(Ordering::SeqCst) {
                return Err(ScriptError::Closed(session_id));
            }
            f(&lua)
        })
        .await
        .map_err(|e| ScriptError::Aborted(e.to_string()))?
    }
}

/// JSON view of a script value; values with no JSON form use their `tostring` text
fn to_json(lua: &Lua, value: LuaValue) -> mlua::Result<Value> {
    if value.is_nil() {
        return Ok(Value::Null);
    }
    match lua.from_value::<Value>(value.clone()) {
        Ok(json) => Ok(json),
        Err(_) => {
            let tostring: Function = lua.globals().get("tostring")?;
            tostring.call::<String>(value).map(Value::String)
        }
    }
}
