use remip_client::Solution;

use crate::models::{SolutionObject, SolutionSummary};

/// Build the stored object for one terminal solver result
pub fn to_solution_object(
    solution_id: String,
    solution: Solution,
    solve_time_seconds: f64,
) -> SolutionObject {
    SolutionObject {
        solution_id,
        status: solution.status,
        objective_value: solution.objective_value,
        solve_time_seconds,
        variables: solution.variables,
        mip_gap: solution.mip_gap,
        slacks: solution.slacks,
        duals: solution.duals,
        reduced_costs: solution.reduced_costs,
    }
}

impl From<&SolutionObject> for SolutionSummary {
    fn from(s: &SolutionObject) -> Self {
        SolutionSummary {
            solution_id: s.solution_id.clone(),
            status: s.status,
            objective_value: s.objective_value,
            solve_time_seconds: s.solve_time_seconds,
        }
    }
}

/// Copy of `solution` without the variables whose value is exactly zero
pub fn without_zero_variables(solution: &SolutionObject) -> SolutionObject {
    let mut filtered = solution.clone();
    filtered.variables.retain(|_, value| *value != 0.0);
    filtered
}
