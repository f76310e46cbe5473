//! Validation and normalization of values injected as runtime globals.

use serde_json::{Map, Value};

use super::error::ScriptError;
use super::literal::{self, Literal, LiteralError, MAX_DEPTH};

/// Validate caller globals and decode stringified collections.
///
/// Strings that parse as a list, tuple or dict literal are replaced by the
/// structure they describe; other strings are left untouched. Mapping keys
/// spelled as tuple or list literals are rejected.
pub fn prepare(globals: &Map<String, Value>) -> Result<Map<String, Value>, ScriptError> {
    let mut prepared = Map::with_capacity(globals.len());
    for (name, value) in globals {
        check_key(name)?;
        prepared.insert(name.clone(), normalize(value, 0)?);
    }
    Ok(prepared)
}

fn normalize(value: &Value, depth: usize) -> Result<Value, ScriptError> {
    if depth > MAX_DEPTH {
        return Err(unsupported(LiteralError::TooDeep));
    }
    match value {
        Value::String(s) => decode_string(s),
        Value::Array(items) => items
            .iter()
            .map(|item| normalize(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                check_key(key)?;
                out.insert(key.clone(), normalize(item, depth + 1)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn looks_structured(s: &str) -> bool {
    matches!(s.trim_start().chars().next(), Some('[' | '{' | '('))
}

fn decode_string(s: &str) -> Result<Value, ScriptError> {
    if !looks_structured(s) {
        return Ok(Value::String(s.to_string()));
    }
    match literal::parse(s) {
        Ok(parsed) if parsed.is_collection() => parsed.into_json().map_err(unsupported),
        Err(LiteralError::TooDeep) => Err(unsupported(LiteralError::TooDeep)),
        _ => Ok(Value::String(s.to_string())),
    }
}

fn check_key(key: &str) -> Result<(), ScriptError> {
    if !looks_structured(key) {
        return Ok(());
    }
    match literal::parse(key) {
        Ok(parsed @ (Literal::Tuple(_) | Literal::List(_))) => {
            Err(unsupported(LiteralError::UnsupportedKey(parsed.type_name())))
        }
        _ => Ok(()),
    }
}

fn unsupported(err: LiteralError) -> ScriptError {
    let detail = match err {
        LiteralError::UnsupportedKey(kind) => {
            format!("Unsupported key type '{kind}' found in input data.")
        }
        LiteralError::TooDeep => format!("Values nested deeper than {MAX_DEPTH} levels are not supported."),
        LiteralError::Syntax(msg) => msg,
    };
    ScriptError::InvalidGlobals(format!("Input data validation failed: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn globals(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_plain_values_pass_through() {
        let input = globals(json!({"costs": {"P1": 100, "P2": 120}, "demands": [{"region": "north", "value": 50}]}));
        assert_eq!(prepare(&input).unwrap(), input);
    }

    #[test]
    fn test_stringified_collections_are_decoded() {
        let input = globals(json!({
            "items": "[1, 2, 3]",
            "nested": {"weights": "{'a': 1.5}"},
        }));
        let prepared = prepare(&input).unwrap();
        assert_eq!(prepared["items"], json!([1, 2, 3]));
        assert_eq!(prepared["nested"]["weights"], json!({"a": 1.5}));
    }

    #[test]
    fn test_scalar_strings_stay_strings() {
        let input = globals(json!({"zip": "007", "label": "(draft", "word": "True"}));
        let prepared = prepare(&input).unwrap();
        assert_eq!(prepared["zip"], json!("007"));
        assert_eq!(prepared["label"], json!("(draft"));
        assert_eq!(prepared["word"], json!("True"));
    }

    #[test]
    fn test_tuple_key_is_rejected() {
        let input = globals(json!({"costs": {"(\"P1\", \"F1\")": 10}}));
        let err = prepare(&input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Input data validation failed: Unsupported key type 'tuple' found in input data."
        );
    }

    #[test]
    fn test_list_key_is_rejected() {
        let input = globals(json!({"[1, 2]": 3}));
        let err = prepare(&input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Input data validation failed: Unsupported key type 'list' found in input data."
        );
    }

    #[test]
    fn test_tuple_key_inside_stringified_dict_is_rejected() {
        let input = globals(json!({"costs": "{('P1', 'F1'): 10}"}));
        assert!(matches!(prepare(&input), Err(ScriptError::InvalidGlobals(_))));
    }

    #[test]
    fn test_prepare_given_deeply_nested_string_should_return_error() {
        let deep = format!("{}{}", "[".repeat(200_000), "]".repeat(200_000));
        let err = prepare(&globals(json!({"items": deep}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Input data validation failed: Values nested deeper than 128 levels are not supported."
        );
    }

    #[test]
    fn test_prepare_given_deeply_nested_json_should_return_error() {
        let mut value = json!(1);
        for _ in 0..(MAX_DEPTH + 2) {
            value = json!([value]);
        }
        let err = prepare(&globals(json!({"items": value}))).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidGlobals(_)));
    }
}
