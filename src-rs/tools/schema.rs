use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub allowed: Option<Vec<String>>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            default: None,
            allowed: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Number, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, FieldType::Boolean, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn to_json(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".to_string(), json!(self.kind.as_str()));
        prop.insert("description".to_string(), json!(self.description));
        if let Some(default) = &self.default {
            prop.insert("default".to_string(), default.clone());
        }
        if let Some(allowed) = &self.allowed {
            prop.insert("enum".to_string(), json!(allowed));
        }
        if let Some(min) = self.minimum {
            prop.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = self.maximum {
            prop.insert("maximum".to_string(), json!(max));
        }
        Value::Object(prop)
    }
}

/// Declared inputs of one tool, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    pub fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.to_json());
            if field.required {
                required.push(json!(field.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_schema_keeps_declaration_order_and_constraints() {
        let schema = InputSchema::new()
            .field(FieldSpec::string("query", "Search keywords").required())
            .field(FieldSpec::integer("num_results", "How many").default_value(json!(10)))
            .field(FieldSpec::string("sort_by", "Order").one_of(&["relevance", "date"]))
            .field(FieldSpec::integer("job_fit", "Fit").range(0, 5));

        let value = schema.to_json_schema();
        assert_eq!(value["required"], json!(["query"]));
        assert_eq!(value["properties"]["num_results"]["default"], json!(10));
        assert_eq!(value["properties"]["sort_by"]["enum"], json!(["relevance", "date"]));
        assert_eq!(value["properties"]["job_fit"]["maximum"], json!(5));

        let keys: Vec<&String> = value["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
    }
}
