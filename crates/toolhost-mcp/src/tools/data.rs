//! The `process_data` tool: filter, sort, transform or aggregate a JSON array.

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use toolhost::{
    handler_fn, Arguments, Capability, HandlerError, HandlerResult, InputContract, ParamSpec,
};

use super::parse_args;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Filter,
    Sort,
    Transform,
    Aggregate,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Aggregate {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

#[derive(Debug, Deserialize)]
struct ProcessParams {
    data: String,
    operation: Operation,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    key: Option<String>,
    reverse: bool,
    #[serde(default)]
    mapping: Option<Map<String, Value>>,
    function: Aggregate,
    #[serde(default)]
    field: Option<String>,
}

pub fn capability() -> Capability {
    Capability::tool(
        "process_data",
        InputContract::new()
            .param(
                ParamSpec::string("data")
                    .required()
                    .description("Data to process, as a JSON string"),
            )
            .param(
                ParamSpec::enumeration("operation", ["filter", "sort", "transform", "aggregate"])
                    .required()
                    .description("Operation to perform"),
            )
            .param(ParamSpec::string("condition").description("Filter condition, e.g. status == active"))
            .param(ParamSpec::string("key").description("Sort key"))
            .param(
                ParamSpec::boolean("reverse")
                    .default(false)
                    .description("Sort in descending order"),
            )
            .param(ParamSpec::object("mapping").description("Key renames for transform"))
            .param(
                ParamSpec::enumeration("function", ["sum", "avg", "count", "min", "max"])
                    .default("sum")
                    .description("Aggregate function"),
            )
            .param(ParamSpec::string("field").description("Field to aggregate")),
        handler_fn(execute),
    )
    .with_description("Process and transform JSON data")
}

async fn execute(args: Arguments) -> HandlerResult<Value> {
    let params: ProcessParams = parse_args(args)?;
    let data: Value = serde_json::from_str(&params.data)
        .map_err(|e| HandlerError::new(format!("Invalid JSON data: {e}")))?;

    let result = match params.operation {
        Operation::Filter => filter(data, params.condition.as_deref())?,
        Operation::Sort => sort(data, params.key.as_deref(), params.reverse),
        Operation::Transform => transform(data, params.mapping.as_ref()),
        Operation::Aggregate => aggregate(data, params.function, params.field.as_deref()),
    };

    let operation = match params.operation {
        Operation::Filter => "filter",
        Operation::Sort => "sort",
        Operation::Transform => "transform",
        Operation::Aggregate => "aggregate",
    };
    Ok(json!({ "operation": operation, "result": result }))
}

/// Value as compared by conditions: strings without quotes, everything else as JSON.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filter(data: Value, condition: Option<&str>) -> HandlerResult<Value> {
    let (Value::Array(items), Some(condition)) = (&data, condition) else {
        return Ok(data);
    };

    let (key, expected) = condition.split_once("==").ok_or_else(|| {
        HandlerError::new(format!(
            "unsupported condition '{condition}', expected 'key == value'"
        ))
    })?;
    let key = key.trim();
    let expected = expected.trim().trim_matches(|c| c == '"' || c == '\'');

    let kept = items
        .iter()
        .filter(|item| match item {
            Value::Object(fields) => {
                fields.get(key).map(plain_text).unwrap_or_default() == expected
            }
            _ => true,
        })
        .cloned()
        .collect();
    Ok(Value::Array(kept))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then numerically or lexically.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn sort(data: Value, key: Option<&str>, reverse: bool) -> Value {
    let Value::Array(mut items) = data else {
        return data;
    };

    let missing = json!(0);
    items.sort_by(|a, b| {
        let ordering = match key {
            Some(key) => {
                let a = a.get(key).unwrap_or(&missing);
                let b = b.get(key).unwrap_or(&missing);
                compare(a, b)
            }
            None => compare(a, b),
        };
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Value::Array(items)
}

fn transform(data: Value, mapping: Option<&Map<String, Value>>) -> Value {
    let Some(mapping) = mapping else {
        return data;
    };
    let Value::Array(items) = data else {
        return data;
    };

    let renamed = items
        .into_iter()
        .map(|item| match item {
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| {
                        let renamed = mapping
                            .get(&k)
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or(k);
                        (renamed, v)
                    })
                    .collect(),
            ),
            other => other,
        })
        .collect();
    Value::Array(renamed)
}

fn aggregate(data: Value, function: Aggregate, field: Option<&str>) -> Value {
    let (Value::Array(items), Some(field)) = (&data, field) else {
        return data;
    };

    let values: Vec<&Value> = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => fields.get(field),
            other => Some(other),
        })
        .filter(|v| !v.is_null())
        .collect();

    let numbers: Option<Vec<f64>> = values.iter().map(|v| v.as_f64()).collect();

    match function {
        Aggregate::Count => json!(values.len()),
        Aggregate::Sum => match numbers {
            Some(nums) => {
                // Integer sums stay exact; overflow falls back to a float sum.
                let exact = values
                    .iter()
                    .try_fold(0i64, |acc, v| v.as_i64().and_then(|n| acc.checked_add(n)));
                match exact {
                    Some(total) => json!(total),
                    None => json!(nums.iter().sum::<f64>()),
                }
            }
            None => Value::Null,
        },
        Aggregate::Avg => match numbers {
            Some(nums) if !nums.is_empty() => json!(nums.iter().sum::<f64>() / nums.len() as f64),
            _ => Value::Null,
        },
        Aggregate::Min => values
            .iter()
            .min_by(|a, b| compare(a, b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
        Aggregate::Max => values
            .iter()
            .max_by(|a, b| compare(a, b))
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
    }
}
