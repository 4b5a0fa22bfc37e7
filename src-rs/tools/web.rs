use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, info};

use super::context::ToolContext;
use super::normalize::truncate_chars;
use super::schema::{FieldSpec, InputSchema};
use super::types::{handler, ToolDefinition};
use crate::error::ToolError;

const CONTENT_LIMIT: usize = 6000;
const MAX_SEARCH_RESULTS: i64 = 10;
const MAX_RESEARCH_POLLS: usize = 90;

#[derive(Debug, Deserialize)]
struct ScrapeArgs {
    url: String,
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    num_results: i64,
}

#[derive(Debug, Deserialize)]
struct ResearchArgs {
    query: String,
}

/// Thin client over the Tavily REST API.
struct Tavily<'a> {
    ctx: &'a ToolContext,
    api_key: String,
}

impl<'a> Tavily<'a> {
    fn from_context(ctx: &'a ToolContext) -> Result<Self, ToolError> {
        match ctx.credentials.search_api_key.as_deref() {
            Some(key) if ctx.credentials.has_search() => Ok(Self {
                ctx,
                api_key: key.to_string(),
            }),
            _ => Err(ToolError::Configuration(
                "No Tavily API key configured. Set SEARCH_API_KEY or configure it in Settings."
                    .to_string(),
            )),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.ctx.endpoints.tavily.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ToolError> {
        let request = self.ctx.http.post(self.url(path)).json(&body);
        self.send(request).await
    }

    async fn get(&self, path: &str) -> Result<Value, ToolError> {
        let request = self.ctx.http.get(self.url(path));
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ToolError> {
        request
            .bearer_auth(&self.api_key)
            .timeout(self.ctx.http_timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| ToolError::upstream("Tavily", err))?
            .json()
            .await
            .map_err(|err| ToolError::upstream("Tavily", err))
    }
}

async fn scrape_url(args: ScrapeArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let tavily = Tavily::from_context(&ctx)?;
    let mut body = json!({ "urls": [args.url], "extract_depth": "advanced" });
    if let Some(query) = &args.query {
        body["query"] = json!(query);
    }
    let response = tavily.post("extract", body).await?;
    let content = response
        .get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .map(|first| first.get("raw_content").and_then(Value::as_str).unwrap_or_default())
        .ok_or_else(|| ToolError::Upstream(format!("Failed to extract content from {}", args.url)))?;

    info!(url = %args.url, chars = content.len(), "scrape_url: extracted");
    Ok(json!({ "content": truncate_chars(content, CONTENT_LIMIT), "url": args.url }))
}

async fn web_search(args: WebSearchArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let tavily = Tavily::from_context(&ctx)?;
    let response = tavily
        .post(
            "search",
            json!({
                "query": args.query,
                "max_results": args.num_results.clamp(1, MAX_SEARCH_RESULTS),
                "include_answer": "advanced",
            }),
        )
        .await?;

    let results: Vec<Value> = response
        .get("results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|r| {
                    json!({
                        "title": r.get("title").and_then(Value::as_str).unwrap_or_default(),
                        "url": r.get("url").and_then(Value::as_str).unwrap_or_default(),
                        "content": r.get("content").and_then(Value::as_str).unwrap_or_default(),
                        "score": r.get("score").and_then(Value::as_f64).unwrap_or(0.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let answer = response.get("answer").and_then(Value::as_str).unwrap_or_default();
    Ok(json!({ "answer": answer, "results": results }))
}

fn research_report(response: &Value) -> Option<Value> {
    let status = response.get("status").and_then(Value::as_str);
    let report = response
        .get("content")
        .or_else(|| response.get("response"))
        .and_then(Value::as_str);
    match (status, report) {
        (Some("completed"), _) | (None, Some(_)) => Some(json!({
            "report": report.unwrap_or_default(),
            "sources": response.get("sources").cloned().unwrap_or_else(|| json!([])),
        })),
        _ => None,
    }
}

async fn web_research(args: ResearchArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let tavily = Tavily::from_context(&ctx)?;
    let mut response = tavily
        .post("research", json!({ "input": args.query, "model": "mini" }))
        .await?;

    let request_id = response
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    for attempt in 0..=MAX_RESEARCH_POLLS {
        if response.get("status").and_then(Value::as_str) == Some("failed") {
            return Err(ToolError::Upstream("Tavily research task failed".to_string()));
        }
        if let Some(report) = research_report(&response) {
            info!(query = %args.query, polls = attempt, "web_research: completed");
            return Ok(report);
        }
        let id = request_id.as_deref().ok_or_else(|| {
            ToolError::Upstream("Tavily research response carried no request id".to_string())
        })?;
        debug!(request_id = id, attempt, "web_research: task pending");
        sleep(ctx.poll_interval).await;
        response = tavily.get(&format!("research/{}", id)).await?;
    }
    Err(ToolError::Upstream("Tavily research did not finish in time".to_string()))
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "scrape_url",
            "Scrape a web page and return its text content.",
            InputSchema::new()
                .field(FieldSpec::string("url", "The URL to scrape").required())
                .field(FieldSpec::string(
                    "query",
                    "Optional query used to re-rank the extracted content for relevance",
                )),
            handler(scrape_url),
        ),
        ToolDefinition::new(
            "web_search",
            "Search the web for current information. Returns an LLM-generated answer plus a list of relevant results with title, URL, content snippet, and relevance score. Use for simple-to-moderate queries. For complex topics requiring thorough, multi-angle investigation, use web_research instead.",
            InputSchema::new()
                .field(FieldSpec::string("query", "Search query").required())
                .field(FieldSpec::integer("num_results", "Number of results (max 10)").default_value(json!(5))),
            handler(web_search),
        ),
        ToolDefinition::new(
            "web_research",
            "Conduct in-depth web research on a complex topic. Performs a multi-step investigation and synthesizes a report with citations. Costs significantly more credits than web_search, so only use it for complex queries that require thorough research.",
            InputSchema::new().field(
                FieldSpec::string("query", "Research question or topic to investigate in depth").required(),
            ),
            handler(web_research),
        ),
    ]
}
