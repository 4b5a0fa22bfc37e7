use serde_json::{json, Map, Value};
use tracing::info;

use super::context::ToolContext;
use super::schema::InputSchema;
use super::types::{handler, NoArgs, ToolDefinition};
use crate::error::ToolError;

async fn read_resume(_: NoArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let doc = ctx.resume.load().await?.ok_or_else(|| {
        ToolError::NotFound("No resume uploaded. The user hasn't uploaded a resume yet.".to_string())
    })?;

    let mut out = Map::new();
    out.insert("filename".to_string(), json!(doc.filename));
    let text_len = doc.text.as_deref().map_or(0, |t| t.chars().count());
    let parsed = doc.parsed.is_some();
    match (doc.parsed, doc.text) {
        (Some(parsed), _) => {
            out.insert("parsed".to_string(), parsed);
        }
        (None, Some(text)) if !text.is_empty() => {
            out.insert("text".to_string(), json!(text));
            out.insert("text_length".to_string(), json!(text_len));
        }
        _ => {}
    }
    info!("read_resume: filename={} parsed={} text_len={}", doc.filename, parsed, text_len);
    Ok(Value::Object(out))
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition::new(
        "read_resume",
        "Read the user's uploaded resume.",
        InputSchema::new(),
        handler(read_resume),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryProfileStore, MemoryStore, ResumeDocument, StaticResume};
    use std::sync::Arc;

    fn ctx(doc: Option<ResumeDocument>) -> ToolContext {
        ToolContext::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryProfileStore::default()),
            Arc::new(StaticResume(doc)),
        )
    }

    #[tokio::test]
    async fn missing_resume_is_an_error() {
        let err = read_resume(NoArgs {}, ctx(None)).await.unwrap_err();
        assert_eq!(err.to_string(), "No resume uploaded. The user hasn't uploaded a resume yet.");
    }

    #[tokio::test]
    async fn parsed_content_wins_over_text() {
        let doc = ResumeDocument {
            filename: "cv.pdf".to_string(),
            text: Some("raw".to_string()),
            parsed: Some(json!({"name": "Sam"})),
        };
        let value = read_resume(NoArgs {}, ctx(Some(doc))).await.unwrap();
        assert_eq!(value, json!({"filename": "cv.pdf", "parsed": {"name": "Sam"}}));
    }

    #[tokio::test]
    async fn text_only_reports_length() {
        let doc = ResumeDocument {
            filename: "cv.txt".to_string(),
            text: Some("Rust engineer".to_string()),
            parsed: None,
        };
        let value = read_resume(NoArgs {}, ctx(Some(doc))).await.unwrap();
        assert_eq!(value["text_length"], json!(13));
    }
}
