//! Input contracts: the declared shape of a capability's arguments.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Declared runtime type of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// A closed set of string literals.
    Enum { values: Vec<String> },
}

impl ParamType {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Type name as used in issue messages and JSON Schema.
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Enum { .. } => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }
}

/// One named parameter in a contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(flatten)]
    pub ty: ParamType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Object)
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, ParamType::enumeration(values))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value substituted when the argument is absent. Ignored for required params.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!(self.ty.name()));
        if let ParamType::Enum { values } = &self.ty {
            schema.insert("enum".to_string(), json!(values));
        }
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), json!(description));
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Ordered set of parameters a capability accepts.
///
/// Contracts are strict by default: arguments not declared here are
/// rejected so that a misspelled parameter name never passes silently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputContract {
    pub params: Vec<ParamSpec>,
    pub allow_unknown: bool,
}

impl InputContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter. A later spec with the same name replaces the earlier one in place.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        match self.params.iter_mut().find(|p| p.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.params.push(spec),
        }
        self
    }

    /// Accept arguments that the contract does not declare.
    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// Render as a JSON Schema object, the form MCP clients expect in `inputSchema`.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));

        let required: Vec<&str> = self.required_names().collect();
        if !required.is_empty() {
            schema.insert("required".to_string(), json!(required));
        }
        schema.insert(
            "additionalProperties".to_string(),
            json!(self.allow_unknown),
        );
        Value::Object(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_schema_rendering() {
        let contract = InputContract::new()
            .param(ParamSpec::string("url").required().description("Endpoint"))
            .param(ParamSpec::enumeration("method", ["GET", "POST"]).default("GET"));

        let schema = contract.to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["url"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["properties"]["url"]["type"], "string");
        assert_eq!(schema["properties"]["url"]["description"], "Endpoint");
        assert_eq!(schema["properties"]["method"]["enum"], json!(["GET", "POST"]));
        assert_eq!(schema["properties"]["method"]["default"], "GET");
    }

    #[test]
    fn test_empty_contract_has_no_required_key() {
        let schema = InputContract::new().to_json_schema();
        assert!(schema.get("required").is_none());
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn test_param_replaces_same_name() {
        let contract = InputContract::new()
            .param(ParamSpec::string("a"))
            .param(ParamSpec::integer("b"))
            .param(ParamSpec::number("a").required());

        assert_eq!(contract.params.len(), 2);
        assert_eq!(contract.params[0].name, "a");
        assert_eq!(contract.params[0].ty, ParamType::Number);
        assert!(contract.params[0].required);
    }

    #[test]
    fn test_contract_serializes_in_declaration_order() {
        let contract = InputContract::new()
            .param(ParamSpec::string("zeta").required())
            .param(ParamSpec::boolean("alpha").default(false));

        let value = serde_json::to_value(&contract).unwrap();
        assert_eq!(value["params"][0]["name"], "zeta");
        assert_eq!(value["params"][0]["type"], "string");
        assert_eq!(value["params"][1]["name"], "alpha");
        assert_eq!(value["params"][1]["default"], false);
        assert_eq!(value["allowUnknown"], false);
    }
}
