use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::context::ToolContext;
use super::registry::ToolRegistry;
use super::types::{ToolResult, ToolSchema};
use super::validation::validate;

const ARGS_SUMMARY_LIMIT: usize = 200;

/// Looks up, validates and runs tools. Every outcome is a `ToolResult`;
/// nothing escapes as an error or a panic.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> Vec<ToolSchema> {
        self.registry.list()
    }

    pub async fn dispatch(&self, name: &str, raw_args: &Value, ctx: &ToolContext) -> ToolResult {
        let tool = match self.registry.get(name) {
            Some(tool) => tool,
            None => {
                warn!(tool = name, "model requested unknown tool");
                return ToolResult::error(format!("unknown tool {}", name));
            }
        };

        let args = match validate(name, &tool.schema, raw_args) {
            Ok(args) => args,
            Err(err) => {
                warn!(tool = name, args = %summarize(raw_args), error = %err, "tool arguments rejected");
                return ToolResult::error(err.to_string());
            }
        };

        debug!(tool = name, args = %summarize(&args), "dispatching tool");
        let call = (tool.handler)(args, ctx.clone());
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => ToolResult::success(value),
            Ok(Err(err)) => {
                warn!(
                    tool = name,
                    kind = err.kind(),
                    args = %summarize(raw_args),
                    error = %err,
                    "tool failed"
                );
                ToolResult::error(err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(tool = name, args = %summarize(raw_args), panic = %message, "tool panicked");
                ToolResult::error(format!("tool {} failed: {}", name, message))
            }
        }
    }
}

fn summarize(args: &Value) -> String {
    let rendered = args.to_string();
    if rendered.chars().count() <= ARGS_SUMMARY_LIMIT {
        return rendered;
    }
    let truncated: String = rendered.chars().take(ARGS_SUMMARY_LIMIT).collect();
    format!("{}...", truncated)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tools::schema::{FieldSpec, InputSchema};
    use crate::tools::types::{handler, ToolDefinition};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
        times: i64,
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDefinition::new(
                "echo",
                "Echo text",
                InputSchema::new()
                    .field(FieldSpec::string("text", "Text").required())
                    .field(FieldSpec::integer("times", "Repeat").default_value(json!(1))),
                handler(|args: EchoArgs, _ctx| async move {
                    Ok(json!({ "echo": args.text.repeat(args.times as usize) }))
                }),
            ))
            .unwrap();
        registry
            .register(ToolDefinition::new(
                "fail",
                "Always fails",
                InputSchema::new(),
                handler(|_: Value, _ctx| async { Err(ToolError::Upstream("upstream down".to_string())) }),
            ))
            .unwrap();
        registry
            .register(ToolDefinition::new(
                "explode",
                "Panics",
                InputSchema::new(),
                handler(|_: Value, _ctx| async {
                    if true {
                        panic!("kaboom");
                    }
                    Ok(json!({}))
                }),
            ))
            .unwrap();
        Dispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_value() {
        let ctx = ToolContext::in_memory();
        let result = dispatcher().dispatch("nope", &json!({}), &ctx).await;
        assert_eq!(result.error_message(), Some("unknown tool nope"));
    }

    #[tokio::test]
    async fn missing_required_field_is_named() {
        let ctx = ToolContext::in_memory();
        let result = dispatcher().dispatch("echo", &json!({"times": 2}), &ctx).await;
        let message = result.error_message().unwrap();
        assert!(message.contains("text"), "{}", message);
    }

    #[tokio::test]
    async fn defaults_and_coercion_reach_the_handler() {
        let ctx = ToolContext::in_memory();
        let d = dispatcher();
        let result = d.dispatch("echo", &json!({"text": "ab"}), &ctx).await;
        assert_eq!(result.to_value(), json!({"echo": "ab"}));
        let result = d.dispatch("echo", &json!({"text": "ab", "times": 2.0, "extra": true}), &ctx).await;
        assert_eq!(result.to_value(), json!({"echo": "abab"}));
    }

    #[tokio::test]
    async fn handler_errors_and_panics_become_results() {
        let ctx = ToolContext::in_memory();
        let d = dispatcher();
        let failed = d.dispatch("fail", &json!({}), &ctx).await;
        assert_eq!(failed.to_value(), json!({"error": "upstream down"}));

        let panicked = d.dispatch("explode", &json!({}), &ctx).await;
        assert_eq!(panicked.error_message(), Some("tool explode failed: kaboom"));
    }

    #[test]
    fn summary_is_truncated() {
        let long = json!({ "text": "x".repeat(500) });
        let summary = summarize(&long);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), ARGS_SUMMARY_LIMIT + 3);
    }
}
