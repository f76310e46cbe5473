use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::EngineError;

pub fn validate_model_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(
            "Model name cannot be empty.".to_string(),
        ));
    }
    Ok(())
}

/// The data keys must equal the declared inputs as sets
pub fn validate_inputs(declared: &[String], data: &Map<String, Value>) -> Result<(), EngineError> {
    let required: HashSet<&str> = declared.iter().map(String::as_str).collect();
    let provided: HashSet<&str> = data.keys().map(String::as_str).collect();

    if required != provided {
        let provided: Vec<&str> = data.keys().map(String::as_str).collect();
        return Err(EngineError::Validation(format!(
            "Input data does not match model inputs. Required: {}. Provided: {}",
            declared.join(","),
            provided.join(","),
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_validate_model_name_given_blank_name_should_return_error() {
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("   ").is_err());
        assert!(validate_model_name("knapsack").is_ok());
    }

    #[test]
    fn test_validate_inputs_given_same_keys_in_any_order_should_return_ok() {
        let declared = inputs(&["costs", "demand"]);
        assert!(validate_inputs(&declared, &data(json!({"demand": 1, "costs": 2}))).is_ok());
    }

    #[test]
    fn test_validate_inputs_given_missing_key_should_return_error() {
        let declared = inputs(&["costs", "demand"]);
        let err = validate_inputs(&declared, &data(json!({"costs": 2}))).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(
            err.to_string(),
            "Input data does not match model inputs. Required: costs,demand. Provided: costs"
        );
    }

    #[test]
    fn test_validate_inputs_given_extra_key_should_return_error() {
        let declared = inputs(&["costs"]);
        assert!(validate_inputs(&declared, &data(json!({"costs": 2, "extra": 1}))).is_err());
    }

    #[test]
    fn test_validate_inputs_given_no_inputs_and_no_data_should_return_ok() {
        assert!(validate_inputs(&[], &Map::new()).is_ok());
    }
}
