//! Argument validation against an input contract.

use serde_json::{Map, Number, Value};

use crate::contract::{InputContract, ParamType};
use crate::types::{FieldIssue, IssueKind, ValidationError};

/// Field name used for issues about the argument payload as a whole.
pub const ROOT_FIELD: &str = "(arguments)";

/// Validate `arguments` against `contract` and return the argument map with
/// defaults applied.
///
/// `null` is treated as "no arguments". An optional parameter given as
/// `null` is treated as absent. All issues are collected, not just the first.
pub fn validate(
    contract: &InputContract,
    arguments: &Value,
) -> Result<Map<String, Value>, ValidationError> {
    let provided = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(ValidationError {
                issues: vec![FieldIssue {
                    field: ROOT_FIELD.to_string(),
                    problem: IssueKind::NotAnObject {
                        actual: type_name(other).to_string(),
                    },
                }],
            });
        }
    };

    let mut issues = Vec::new();
    let mut validated = Map::new();

    for spec in &contract.params {
        match provided.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    issues.push(FieldIssue {
                        field: spec.name.clone(),
                        problem: IssueKind::Required,
                    });
                } else if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                }
            }
            Some(value) => match check_type(&spec.ty, value) {
                Some(problem) => issues.push(FieldIssue {
                    field: spec.name.clone(),
                    problem,
                }),
                None => {
                    validated.insert(spec.name.clone(), value.clone());
                }
            },
        }
    }

    let mut unknown: Vec<&String> = provided
        .keys()
        .filter(|k| contract.get(k).is_none())
        .collect();
    unknown.sort();

    for key in unknown {
        if contract.allow_unknown {
            validated.insert(key.clone(), provided[key].clone());
        } else {
            issues.push(FieldIssue {
                field: key.clone(),
                problem: IssueKind::UnknownField,
            });
        }
    }

    if issues.is_empty() {
        Ok(validated)
    } else {
        Err(ValidationError { issues })
    }
}

fn check_type(expected: &ParamType, value: &Value) -> Option<IssueKind> {
    match (expected, value) {
        (ParamType::String, Value::String(_))
        | (ParamType::Number, Value::Number(_))
        | (ParamType::Boolean, Value::Bool(_))
        | (ParamType::Object, Value::Object(_))
        | (ParamType::Array, Value::Array(_)) => None,
        (ParamType::Integer, Value::Number(n)) if is_whole(n) => None,
        (ParamType::Enum { values }, Value::String(s)) if values.contains(s) => None,
        (ParamType::Enum { values }, _) => Some(IssueKind::NotInEnum {
            allowed: values.clone(),
        }),
        (expected, actual) => Some(IssueKind::TypeMismatch {
            expected: expected.name().to_string(),
            actual: type_name(actual).to_string(),
        }),
    }
}

fn is_whole(n: &Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

/// Runtime type name of a JSON value.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
