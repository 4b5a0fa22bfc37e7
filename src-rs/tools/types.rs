use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::context::ToolContext;
use super::schema::InputSchema;
use crate::error::ToolError;

/// What the model sees of a tool: never the handler.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Outcome of one dispatch. Always a mapping on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Success(Map<String, Value>),
    Error(String),
}

impl ToolResult {
    pub fn success(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolResult::Success(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ToolResult::Success(map)
            }
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResult::Error(message) => Some(message),
            ToolResult::Success(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ToolResult::Success(map) => Value::Object(map.clone()),
            ToolResult::Error(message) => json!({ "error": message }),
        }
    }
}

impl Serialize for ToolResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

pub type ToolHandler =
    Arc<dyn Fn(Value, ToolContext) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: InputSchema,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, schema: InputSchema, handler: ToolHandler) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            schema,
            handler,
        }
    }

    pub fn tool_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.to_json_schema(),
        }
    }
}

/// Arguments of tools that take none.
#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

/// Wraps a typed async function as a handler. The validated argument map is
/// deserialized into `A` before the function runs.
pub fn handler<A, F, Fut>(f: F) -> ToolHandler
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    Arc::new(move |args: Value, ctx: ToolContext| {
        match serde_json::from_value::<A>(args) {
            Ok(parsed) => f(parsed, ctx).boxed(),
            Err(err) => {
                let message = format!("invalid arguments: {}", err);
                async move { Err(ToolError::Validation(message)) }.boxed()
            }
        }
    })
}
