use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{RemipError, Result};

/// A `(variable name, coefficient)` pair of a linear expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub value: f64,
}

/// The objective of a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coefficients: Vec<Coefficient>,
}

/// A linear constraint `sum(coefficients) + constant <sense> 0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    /// -1 for `<=`, 0 for `=`, 1 for `>=`
    pub sense: i8,
    #[serde(default)]
    pub constant: f64,
    #[serde(default)]
    pub coefficients: Vec<Coefficient>,
    #[serde(default)]
    pub pi: Option<f64>,
}

/// A decision variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "lowBound", default)]
    pub low_bound: Option<f64>,
    #[serde(rename = "upBound", default)]
    pub up_bound: Option<f64>,
    #[serde(default = "default_category")]
    pub cat: String,
    #[serde(rename = "varValue", default)]
    pub var_value: Option<f64>,
    #[serde(default)]
    pub dj: Option<f64>,
}

fn default_category() -> String {
    "Continuous".to_string()
}

/// Problem-level parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub name: String,
    /// 1 to minimize, -1 to maximize
    pub sense: i8,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub sol_status: i32,
}

/// Solver-agnostic problem description posted to `/solve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub objective: Objective,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub parameters: Parameters,
}

/// Terminal status of a solve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NotSolved,
    Timeout,
}

impl SolutionStatus {
    /// Parse one of the canonical status names (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "optimal" => Some(SolutionStatus::Optimal),
            "infeasible" => Some(SolutionStatus::Infeasible),
            "unbounded" => Some(SolutionStatus::Unbounded),
            "not_solved" => Some(SolutionStatus::NotSolved),
            "timeout" => Some(SolutionStatus::Timeout),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "optimal",
            SolutionStatus::Infeasible => "infeasible",
            SolutionStatus::Unbounded => "unbounded",
            SolutionStatus::NotSolved => "not_solved",
            SolutionStatus::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal solution returned by the solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub variables: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mip_gap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slacks: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duals: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_costs: Option<BTreeMap<String, f64>>,
}

/// Loose shape of a solver result payload
#[derive(Debug, Deserialize)]
struct RawSolution {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    objective_value: Option<f64>,
    #[serde(default)]
    variables: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    variable_values: Option<BTreeMap<String, Option<f64>>>,
    #[serde(default)]
    mip_gap: Option<f64>,
    #[serde(default)]
    slacks: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    duals: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    reduced_costs: Option<BTreeMap<String, f64>>,
}

impl Solution {
    /// Build a solution from a result payload, either `{"solution": {...}}` or the bare object.
    ///
    /// `fallback_status` is used when the payload carries no status of its own.
    pub fn from_payload(payload: Value, fallback_status: Option<SolutionStatus>) -> Result<Self> {
        let payload = match payload {
            Value::Object(mut map) if map.get("solution").is_some_and(Value::is_object) => {
                map.remove("solution").unwrap_or(Value::Null)
            }
            other => other,
        };

        let raw: RawSolution =
            serde_json::from_value(payload).map_err(|e| RemipError::ParseError(e.to_string()))?;

        let status = match raw.status.as_deref() {
            Some(s) => SolutionStatus::parse(s).unwrap_or_else(|| {
                log::warn!("[remip] unrecognized solution status {s:?}, treating as not_solved");
                SolutionStatus::NotSolved
            }),
            None => match (fallback_status, raw.objective_value) {
                (Some(status), _) => status,
                (None, Some(_)) => SolutionStatus::Optimal,
                (None, None) => SolutionStatus::NotSolved,
            },
        };

        let variables = raw
            .variables
            .or(raw.variable_values)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        Ok(Solution {
            status,
            objective_value: raw.objective_value,
            variables,
            mip_gap: raw.mip_gap,
            slacks: raw.slacks,
            duals: raw.duals,
            reduced_costs: raw.reduced_costs,
        })
    }
}

/// Intermediate telemetry surfaced while a streaming solve is in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SolverEvent {
    Log(Value),
    Metric(Value),
    Status(Value),
}
