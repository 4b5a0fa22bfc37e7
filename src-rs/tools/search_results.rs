use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::context::ToolContext;
use super::schema::{FieldSpec, InputSchema};
use super::types::{handler, ToolDefinition};
use crate::error::ToolError;
use crate::store::{NewSearchResult, RemoteType};

pub const SEARCH_RESULT_ADDED: &str = "search_result_added";

#[derive(Debug, Deserialize)]
struct ListSearchResultsArgs {
    min_fit: Option<i64>,
}

fn require_conversation(ctx: &ToolContext, action: &str) -> Result<i64, ToolError> {
    ctx.conversation_id.ok_or_else(|| {
        ToolError::Configuration(format!("No conversation context: cannot {} search results", action))
    })
}

async fn add_search_result(args: NewSearchResult, ctx: ToolContext) -> Result<Value, ToolError> {
    let conversation_id = require_conversation(&ctx, "store")?;
    let record = ctx.store.add_search_result(conversation_id, args).await?;
    info!(
        "add_search_result: id={} company={} title={} fit={}",
        record.id, record.company, record.title, record.job_fit
    );

    let payload = json!(record);
    ctx.events.emit(SEARCH_RESULT_ADDED, payload.clone());
    Ok(json!({ "search_result": payload }))
}

async fn list_search_results(args: ListSearchResultsArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let conversation_id = require_conversation(&ctx, "query")?;
    let results = ctx
        .store
        .list_search_results(conversation_id, args.min_fit)
        .await?;
    info!(
        "list_search_results: conversation_id={} count={} min_fit={:?}",
        conversation_id,
        results.len(),
        args.min_fit
    );
    Ok(json!({ "count": results.len(), "results": results }))
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "add_search_result",
            "Add a qualifying job to the search results panel. Only add jobs rated >=3/5 stars. Include structured data and a fit_reason.",
            InputSchema::new()
                .field(FieldSpec::string("company", "Company name").required())
                .field(FieldSpec::string("title", "Job title").required())
                .field(
                    FieldSpec::integer("job_fit", "Job fit rating 0-5 based on user profile match")
                        .required()
                        .range(0, 5),
                )
                .field(FieldSpec::string("url", "Job posting URL"))
                .field(FieldSpec::integer("salary_min", "Minimum salary"))
                .field(FieldSpec::integer("salary_max", "Maximum salary"))
                .field(FieldSpec::string("location", "Job location"))
                .field(FieldSpec::string("remote_type", "Remote type").one_of(RemoteType::ALL))
                .field(FieldSpec::string("source", "Where the job was found (jsearch, adzuna, web)"))
                .field(FieldSpec::string("description", "Brief job description summary"))
                .field(FieldSpec::string("requirements", "Key requirements, newline-separated"))
                .field(FieldSpec::string("nice_to_haves", "Nice-to-have qualifications, newline-separated"))
                .field(FieldSpec::string("fit_reason", "Brief explanation of the fit rating")),
            handler(add_search_result),
        ),
        ToolDefinition::new(
            "list_search_results",
            "List job search results from the current conversation.",
            InputSchema::new().field(FieldSpec::integer("min_fit", "Minimum fit rating 0-5").range(0, 5)),
            handler(list_search_results),
        ),
    ]
}
