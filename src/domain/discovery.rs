//! Locating the single `lp.problem` a model defines.
//!
//! Model code must leave exactly one problem object in the runtime's global
//! scope. Objects left over from earlier executions are removed before the
//! model runs, so only the ones it creates are counted.

use serde::Deserialize;
use thiserror::Error;

use crate::models::Problem;
use crate::runtime::{ScriptError, ScriptRuntime};

const CLEAR_SNIPPET: &str = r#"
local is_problem = package.loaded.lp.is_problem
local stale = {}
for name, value in pairs(_G) do
  if is_problem(value) then
    stale[#stale + 1] = name
  end
end
for _, name in ipairs(stale) do
  _G[name] = nil
end
return #stale
"#;

const DISCOVERY_SNIPPET: &str = r#"
local is_problem = package.loaded.lp.is_problem
local names = {}
for name, value in pairs(_G) do
  if type(name) == "string" and is_problem(value) then
    names[#names + 1] = name
  end
end
table.sort(names)
local report = { count = #names, names = table.concat(names, ", ") }
if #names == 1 then
  report.problem = _G[names[1]]:to_dict()
end
return report
"#;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No lp.problem instance found in the model code.")]
    NotFound,

    #[error("Multiple lp.problem instances found ({0}). Please ensure only one is defined.")]
    Multiple(String),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

#[derive(Debug, Deserialize)]
struct DiscoveryReport {
    count: usize,
    names: String,
    problem: Option<Problem>,
}

/// Remove problem objects left in global scope; returns how many were removed
pub async fn clear_problems(runtime: &ScriptRuntime) -> Result<usize, ScriptError> {
    runtime.eval(CLEAR_SNIPPET).await
}

/// The wire form of the one problem object in global scope
pub async fn discover(runtime: &ScriptRuntime) -> Result<Problem, DiscoveryError> {
    let report: DiscoveryReport = runtime.eval(DISCOVERY_SNIPPET).await?;
    match (report.count, report.problem) {
        (0, _) => Err(DiscoveryError::NotFound),
        (1, Some(problem)) => Ok(problem),
        (1, None) => Err(DiscoveryError::NotFound),
        _ => Err(DiscoveryError::Multiple(report.names)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PackageConfig;
    use serde_json::Map;

    fn runtime() -> ScriptRuntime {
        ScriptRuntime::create("s", &PackageConfig::default()).unwrap()
    }

    const ONE_PROBLEM: &str = r#"
        prob = lp.problem("one", lp.MINIMIZE)
        local x = lp.variable("x", { low = 0 })
        prob:set_objective(x)
        prob:add(lp.ge(x, 1), "floor")
    "#;

    #[tokio::test]
    async fn test_discover_single_problem() {
        let rt = runtime();
        rt.run(ONE_PROBLEM, &Map::new()).await.unwrap();
        let problem = discover(&rt).await.unwrap();
        assert_eq!(problem.parameters.name, "one");
        assert_eq!(problem.constraints.len(), 1);
    }

    #[tokio::test]
    async fn test_discover_without_problem_fails() {
        let rt = runtime();
        rt.run("x = 1", &Map::new()).await.unwrap();
        let err = discover(&rt).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "No lp.problem instance found in the model code."
        );
    }

    #[tokio::test]
    async fn test_discover_two_problems_fails_with_names() {
        let rt = runtime();
        rt.run("b = lp.problem('b'); a = lp.problem('a')", &Map::new())
            .await
            .unwrap();
        let err = discover(&rt).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Multiple lp.problem instances found (a, b). Please ensure only one is defined."
        );
    }

    #[tokio::test]
    async fn test_clear_problems_removes_leftovers() {
        let rt = runtime();
        rt.run(ONE_PROBLEM, &Map::new()).await.unwrap();
        assert_eq!(clear_problems(&rt).await.unwrap(), 1);
        assert!(matches!(discover(&rt).await, Err(DiscoveryError::NotFound)));
    }
}
