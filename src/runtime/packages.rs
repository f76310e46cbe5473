//! Baseline packages and host bindings installed into every session runtime.

use log::debug;
use mlua::{Function, Lua, LuaSerdeExt, MultiValue, SerializeOptions, Table, Value as LuaValue};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Modelling package source
const LP_SOURCE: &str = include_str!("lua/lp.lua");

/// Packages every runtime starts with
pub const BASELINE_PACKAGES: &[&str] = &["lp", "json"];

/// Globals that could reach outside the runtime
const REMOVED_GLOBALS: &[&str] = &["dofile", "loadfile"];

/// Extra packages required into each new runtime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageConfig {
    pub extra: Vec<String>,
    pub path: Option<PathBuf>,
}

/// Text written to the standard streams since the last drain
#[derive(Debug, Default)]
pub struct OutputBuffers {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl OutputBuffers {
    fn push(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => self.stdout.push_str(text),
            Stream::Stderr => self.stderr.push_str(text),
        }
    }
}

/// Lua conversion of a JSON value, with `null` becoming `nil`
pub fn json_to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    lua.to_value_with(
        value,
        SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false),
    )
}

/// Set up a freshly created VM: sandbox, output capture, baseline and extra packages
pub fn install(lua: &Lua, output: &Arc<Mutex<OutputBuffers>>, config: &PackageConfig) -> mlua::Result<()> {
    restrict(lua)?;
    capture_output(lua, output)?;

    let lp: Table = lua.load(LP_SOURCE).set_name("=lp").eval()?;
    register(lua, "lp", LuaValue::Table(lp))?;
    register(lua, "json", LuaValue::Table(json_module(lua)?))?;

    if let Some(dir) = &config.path {
        let package: Table = lua.globals().get("package")?;
        let current: String = package.get("path")?;
        let dir = dir.display();
        package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{current}"))?;
    }

    let require: Function = lua.globals().get("require")?;
    for name in &config.extra {
        let module: LuaValue = require.call(name.as_str()).map_err(|e| {
            mlua::Error::RuntimeError(format!("failed to load package '{name}': {e}"))
        })?;
        lua.globals().set(name.as_str(), module)?;
        debug!("Loaded script package {name}");
    }
    Ok(())
}

/// Partition `names` into packages that are loaded or loadable, and the rest
pub fn status(lua: &Lua, names: &[String]) -> mlua::Result<(Vec<String>, Vec<String>)> {
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;
    let path: String = package.get("path")?;
    let searchpath: Function = package.get("searchpath")?;

    let mut installed = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        let present = !loaded.get::<LuaValue>(name.as_str())?.is_nil()
            || !searchpath
                .call::<LuaValue>((name.as_str(), path.as_str()))?
                .is_nil();
        if present {
            installed.push(name.clone());
        } else {
            missing.push(name.clone());
        }
    }
    Ok((installed, missing))
}

fn register(lua: &Lua, name: &str, module: LuaValue) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let loaded: Table = package.get("loaded")?;
    loaded.set(name, module.clone())?;
    lua.globals().set(name, module)
}

fn restrict(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(*name, LuaValue::Nil)?;
    }
    let os: Table = globals.get("os")?;
    os.set("exit", LuaValue::Nil)?;
    os.set("execute", LuaValue::Nil)?;
    let io: Table = globals.get("io")?;
    io.set("popen", LuaValue::Nil)?;
    Ok(())
}

fn render(tostring: &Function, args: MultiValue, separator: &str) -> mlua::Result<String> {
    let parts = args
        .into_iter()
        .map(|arg| tostring.call::<String>(arg))
        .collect::<mlua::Result<Vec<_>>>()?;
    Ok(parts.join(separator))
}

fn capture_output(lua: &Lua, output: &Arc<Mutex<OutputBuffers>>) -> mlua::Result<()> {
    let globals = lua.globals();
    let tostring: Function = globals.get("tostring")?;

    let line_printer = |stream: Stream| {
        let buffers = Arc::clone(output);
        let tostring = tostring.clone();
        lua.create_function(move |_, args: MultiValue| {
            let mut line = render(&tostring, args, "\t")?;
            line.push('\n');
            buffers.lock().push(stream, &line);
            Ok(())
        })
    };
    globals.set("print", line_printer(Stream::Stdout)?)?;
    globals.set("eprint", line_printer(Stream::Stderr)?)?;

    let buffers = Arc::clone(output);
    let warn_tostring = tostring.clone();
    globals.set(
        "warn",
        lua.create_function(move |_, args: MultiValue| {
            let mut line = render(&warn_tostring, args, "")?;
            line.push('\n');
            buffers.lock().push(Stream::Stderr, &line);
            Ok(())
        })?,
    )?;

    let io: Table = globals.get("io")?;
    for (field, stream) in [("stdout", Stream::Stdout), ("stderr", Stream::Stderr)] {
        let handle = lua.create_table()?;
        let buffers = Arc::clone(output);
        let tostring = tostring.clone();
        handle.set(
            "write",
            lua.create_function(move |_, (this, args): (Table, MultiValue)| {
                let text = render(&tostring, args, "")?;
                buffers.lock().push(stream, &text);
                Ok(this)
            })?,
        )?;
        io.set(field, handle)?;
    }

    let buffers = Arc::clone(output);
    io.set(
        "write",
        lua.create_function(move |_, args: MultiValue| {
            let text = render(&tostring, args, "")?;
            buffers.lock().push(Stream::Stdout, &text);
            Ok(())
        })?,
    )?;
    Ok(())
}

fn json_module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "encode",
        lua.create_function(|lua, value: LuaValue| {
            let json: Value = lua.from_value(value)?;
            serde_json::to_string(&json).map_err(mlua::Error::external)
        })?,
    )?;
    module.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let json: Value = serde_json::from_str(&text).map_err(mlua::Error::external)?;
            json_to_lua(lua, &json)
        })?,
    )?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(config: &PackageConfig) -> (Lua, Arc<Mutex<OutputBuffers>>) {
        let lua = Lua::new();
        let output = Arc::new(Mutex::new(OutputBuffers::default()));
        install(&lua, &output, config).unwrap();
        (lua, output)
    }

    #[test]
    fn test_print_and_stderr_are_captured() {
        let (lua, output) = setup(&PackageConfig::default());
        lua.load(
            r#"
            print("a", 1, true)
            io.write("b", 2)
            io.stderr:write("oops")
            eprint("err")
            "#,
        )
        .exec()
        .unwrap();
        let buffers = output.lock();
        assert_eq!(buffers.stdout, "a\t1\ttrue\nb2");
        assert_eq!(buffers.stderr, "oopserr\n");
    }

    #[test]
    fn test_escape_hatches_are_removed() {
        let (lua, _) = setup(&PackageConfig::default());
        let removed: bool = lua
            .load("return os.exit == nil and os.execute == nil and io.popen == nil and dofile == nil")
            .eval()
            .unwrap();
        assert!(removed);
    }

    #[test]
    fn test_json_round_trip_in_lua() {
        let (lua, _) = setup(&PackageConfig::default());
        let value: i64 = lua
            .load(r#"return json.decode(json.encode({a = {b = 41}})).a.b + 1"#)
            .eval()
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_lp_to_dict_wire_format() {
        let (lua, _) = setup(&PackageConfig::default());
        let problem: remip_client::Problem = lua
            .from_value(
                lua.load(
                    r#"
                    local prob = lp.problem("mix", lp.MAXIMIZE)
                    local x = lp.variable("x", { low = 0 })
                    local y = lp.variable("y", { low = 0, cat = "Binary" })
                    prob:set_objective(3 * x + 2 * y)
                    prob:add(lp.le(x + y, 4), "cap")
                    return prob:to_dict()
                    "#,
                )
                .eval()
                .unwrap(),
            )
            .unwrap();
        assert_eq!(problem.parameters.name, "mix");
        assert_eq!(problem.parameters.sense, -1);
        assert_eq!(problem.objective.coefficients.len(), 2);
        assert_eq!(problem.constraints[0].name, "cap");
        assert_eq!(problem.constraints[0].sense, -1);
        assert_eq!(problem.constraints[0].constant, -4.0);
        let names: Vec<&str> = problem.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(problem.variables[1].cat, "Integer");
        assert_eq!(problem.variables[1].up_bound, Some(1.0));
    }

    #[test]
    fn test_missing_extra_package_fails_install() {
        let lua = Lua::new();
        let output = Arc::new(Mutex::new(OutputBuffers::default()));
        let config = PackageConfig {
            extra: vec!["definitely_not_here".to_string()],
            path: None,
        };
        let err = install(&lua, &output, &config).unwrap_err();
        assert!(err.to_string().contains("definitely_not_here"));
    }

    #[test]
    fn test_status_splits_known_and_unknown() {
        let (lua, _) = setup(&PackageConfig::default());
        let (installed, missing) =
            status(&lua, &["lp".to_string(), "string".to_string(), "nope".to_string()]).unwrap();
        assert_eq!(installed, vec!["lp", "string"]);
        assert_eq!(missing, vec!["nope"]);
    }
}
