use thiserror::Error;

/// Category of an interpreter fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    Syntax,
    Name,
    ZeroDivision,
    Runtime,
}

/// Errors raised by a session script runtime
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The interpreter rejected or aborted the script; `message` is its own text
    #[error("{message}")]
    Execution {
        kind: ScriptErrorKind,
        message: String,
    },

    #[error("{0}")]
    InvalidGlobals(String),

    #[error("failed to initialize script runtime: {0}")]
    Init(String),

    #[error("script runtime for session {0} was released")]
    Closed(String),

    #[error("script execution aborted: {0}")]
    Aborted(String),
}

impl ScriptError {
    pub fn execution(err: &mlua::Error) -> Self {
        let message = native_message(err);
        let kind = match err {
            mlua::Error::SyntaxError { .. } => ScriptErrorKind::Syntax,
            _ if is_zero_division(&message) => ScriptErrorKind::ZeroDivision,
            _ if undefined_name(&message).is_some() => ScriptErrorKind::Name,
            _ => ScriptErrorKind::Runtime,
        };
        ScriptError::Execution { kind, message }
    }

    pub fn kind(&self) -> Option<ScriptErrorKind> {
        match self {
            ScriptError::Execution { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Message rewritten for people who did not write the interpreter
    pub fn friendly_message(&self) -> String {
        match self {
            ScriptError::Execution { kind, message } => match kind {
                ScriptErrorKind::Syntax => format!("Syntax error: {message}"),
                ScriptErrorKind::ZeroDivision => format!("Division by zero: {message}"),
                ScriptErrorKind::Name => match undefined_name(message) {
                    Some(name) => format!("Name '{name}' is not defined: {message}"),
                    None => message.clone(),
                },
                ScriptErrorKind::Runtime => message.clone(),
            },
            other => other.to_string(),
        }
    }
}

fn native_message(err: &mlua::Error) -> String {
    let full = match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => return native_message(cause),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    match full.find("\nstack traceback:") {
        Some(idx) => full[..idx].to_string(),
        None => full,
    }
}

/// Integer `//` and `%` by zero; float division yields inf or nan instead
fn is_zero_division(message: &str) -> bool {
    message.contains("attempt to divide by zero")
        || message.contains("attempt to perform 'n%0'")
        || message.contains("attempt to perform 'n//0'")
}

/// Name from "attempt to <op> a nil value (global 'name')"
fn undefined_name(message: &str) -> Option<&str> {
    if !message.contains("a nil value") {
        return None;
    }
    let start = message.find("(global '")? + "(global '".len();
    let len = message[start..].find('\'')?;
    Some(&message[start..start + len])
}
