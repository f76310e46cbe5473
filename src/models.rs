use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use remip_client::{Problem, SolutionStatus};

/// Type tag reported for every stored model
pub const MODEL_TYPE: &str = "lp.problem";

// ---------- Stored entities ----------

/// Named model script and the data names it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub inputs: Vec<String>,
}

impl Model {
    pub fn new(name: impl Into<String>, code: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            model_type: MODEL_TYPE.to_string(),
            inputs,
        }
    }
}

/// Listing view of a solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionSummary {
    pub solution_id: String,
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub solve_time_seconds: f64,
}

/// Full stored outcome of one solve call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionObject {
    pub solution_id: String,
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub solve_time_seconds: f64,
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

/// Kinds of entities kept per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Model,
    Solution,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Model => f.write_str("Model"),
            EntityKind::Solution => f.write_str("Solution"),
        }
    }
}

// ---------- Tool outputs ----------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefineModelOutput {
    pub status: String,
    pub model_name: String,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveProblemOutput {
    pub summary: Option<SolutionSummary>,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSolutionOutput {
    pub solution: SolutionObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSolutionOutput {
    pub result: Value,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListModelsOutput {
    pub models: Vec<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetModelOutput {
    pub model: Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSolutionsOutput {
    pub solutions: Vec<SolutionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckPackagesOutput {
    pub status: String,
    pub installed: Vec<String>,
    pub not_installed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelJsonOutput {
    pub model_json: Problem,
}
