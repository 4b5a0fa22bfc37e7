use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use super::context::ToolContext;
use super::normalize::{dedupe, from_adzuna, from_jsearch, NormalizedJobListing};
use super::schema::{FieldSpec, InputSchema};
use super::types::{handler, ToolDefinition};
use crate::error::ToolError;

pub const MAX_RESULTS: usize = 20;
const JSEARCH_HOST: &str = "jsearch.p.rapidapi.com";

pub const DATE_POSTED: [&str; 4] = ["today", "3days", "week", "month"];
pub const EMPLOYMENT_TYPES: [&str; 4] = ["fulltime", "parttime", "contract", "temporary"];

#[derive(Debug, Deserialize)]
struct JobSearchArgs {
    query: String,
    location: Option<String>,
    #[serde(default)]
    remote_only: bool,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    num_results: i64,
    provider: Option<String>,
    date_posted: Option<String>,
    employment_type: Option<String>,
    sort_by: Option<String>,
}

/// Provider-neutral search filters.
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    pub query: String,
    pub location: Option<String>,
    pub remote_only: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub num_results: usize,
    pub date_posted: Option<String>,
    pub employment_type: Option<String>,
    pub sort_by: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobSearchOutcome {
    pub results: Vec<NormalizedJobListing>,
    pub provider: String,
    pub total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One job board behind the `job_search` tool.
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// Wire name, as reported in `provider`.
    fn name(&self) -> &'static str;
    /// Human name used in warnings and errors.
    fn label(&self) -> &'static str;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<NormalizedJobListing>, ToolError>;
}

pub struct JSearchBoard {
    pub http: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[async_trait]
impl JobBoard for JSearchBoard {
    fn name(&self) -> &'static str {
        "jsearch"
    }

    fn label(&self) -> &'static str {
        "JSearch"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<NormalizedJobListing>, ToolError> {
        let search_query = match &query.location {
            Some(location) => format!("{} in {}", query.query, location),
            None => query.query.clone(),
        };
        let mut params: Vec<(&str, String)> = vec![
            ("query", search_query),
            ("num_pages", "1".to_string()),
        ];
        if query.remote_only {
            params.push(("remote_jobs_only", "true".to_string()));
        }
        if let Some(date_posted) = &query.date_posted {
            params.push(("date_posted", date_posted.clone()));
        }
        if let Some(kind) = query.employment_type.as_deref().and_then(jsearch_employment_type) {
            params.push(("employment_types", kind.to_string()));
        }

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let body: Value = self
            .http
            .get(url)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", JSEARCH_HOST)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(ToolError::transport)?
            .json()
            .await
            .map_err(ToolError::transport)?;

        let mut listings: Vec<NormalizedJobListing> = body
            .get("data")
            .and_then(Value::as_array)
            .map(|data| data.iter().filter_map(from_jsearch).collect())
            .unwrap_or_default();
        listings.truncate(query.num_results);
        Ok(listings)
    }
}

pub struct AdzunaBoard {
    pub http: reqwest::Client,
    pub base_url: String,
    pub app_id: String,
    pub app_key: String,
    pub country: String,
    pub timeout: Duration,
}

#[async_trait]
impl JobBoard for AdzunaBoard {
    fn name(&self) -> &'static str {
        "adzuna"
    }

    fn label(&self) -> &'static str {
        "Adzuna"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<NormalizedJobListing>, ToolError> {
        let mut params: Vec<(&str, String)> = vec![
            ("app_id", self.app_id.clone()),
            ("app_key", self.app_key.clone()),
            ("what", query.query.clone()),
            ("results_per_page", query.num_results.min(MAX_RESULTS).to_string()),
        ];
        if let Some(location) = &query.location {
            params.push(("where", location.clone()));
        }
        if let Some(min) = query.salary_min {
            params.push(("salary_min", min.to_string()));
        }
        if let Some(max) = query.salary_max {
            params.push(("salary_max", max.to_string()));
        }
        if let Some(days) = query.date_posted.as_deref().and_then(adzuna_max_days_old) {
            params.push(("max_days_old", days.to_string()));
        }
        match query.employment_type.as_deref() {
            Some("fulltime") => params.push(("full_time", "1".to_string())),
            Some("parttime") => params.push(("part_time", "1".to_string())),
            Some("contract") => params.push(("contract", "1".to_string())),
            _ => {}
        }
        if let Some(sort_by) = query.sort_by.as_deref().filter(|s| *s == "relevance" || *s == "date") {
            params.push(("sort_by", sort_by.to_string()));
        }

        let url = format!(
            "{}/v1/api/jobs/{}/search/1",
            self.base_url.trim_end_matches('/'),
            self.country
        );
        let body: Value = self
            .http
            .get(url)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(ToolError::transport)?
            .json()
            .await
            .map_err(ToolError::transport)?;

        let mut listings: Vec<NormalizedJobListing> = body
            .get("results")
            .and_then(Value::as_array)
            .map(|data| data.iter().filter_map(from_adzuna).collect())
            .unwrap_or_default();
        listings.truncate(query.num_results);
        Ok(listings)
    }
}

pub fn jsearch_employment_type(kind: &str) -> Option<&'static str> {
    match kind {
        "fulltime" => Some("FULLTIME"),
        "parttime" => Some("PARTTIME"),
        "contract" => Some("CONTRACTOR"),
        "temporary" => Some("INTERN"),
        _ => None,
    }
}

pub fn adzuna_max_days_old(date_posted: &str) -> Option<u32> {
    match date_posted {
        "today" => Some(1),
        "3days" => Some(3),
        "week" => Some(7),
        "month" => Some(30),
        _ => None,
    }
}

/// Picks the boards for one call. An explicit provider must be configured;
/// otherwise every configured board runs, jsearch first.
pub fn select_boards(provider: Option<&str>, ctx: &ToolContext) -> Result<Vec<Box<dyn JobBoard>>, ToolError> {
    let creds = &ctx.credentials;
    let (use_jsearch, use_adzuna) = match provider {
        Some("jsearch") => {
            if !creds.has_jsearch() {
                return Err(ToolError::Configuration(
                    "JSearch API key not configured. Set JSEARCH_API_KEY or configure it in Settings."
                        .to_string(),
                ));
            }
            (true, false)
        }
        Some("adzuna") => {
            if !creds.has_adzuna() {
                return Err(ToolError::Configuration(
                    "Adzuna API keys not configured. Set ADZUNA_APP_ID and ADZUNA_APP_KEY or configure them in Settings."
                        .to_string(),
                ));
            }
            (false, true)
        }
        _ => (creds.has_jsearch(), creds.has_adzuna()),
    };

    let mut boards: Vec<Box<dyn JobBoard>> = Vec::new();
    if use_jsearch {
        boards.push(Box::new(JSearchBoard {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.jsearch.clone(),
            api_key: creds.jsearch_api_key.clone().unwrap_or_default(),
            timeout: ctx.http_timeout,
        }));
    }
    if use_adzuna {
        boards.push(Box::new(AdzunaBoard {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.adzuna.clone(),
            app_id: creds.adzuna_app_id.clone().unwrap_or_default(),
            app_key: creds.adzuna_app_key.clone().unwrap_or_default(),
            country: creds
                .adzuna_country
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "us".to_string()),
            timeout: ctx.http_timeout,
        }));
    }
    if boards.is_empty() {
        return Err(ToolError::Configuration(
            "No job search API keys configured. Set up JSearch (JSEARCH_API_KEY) or Adzuna (ADZUNA_APP_ID + ADZUNA_APP_KEY) in Settings."
                .to_string(),
        ));
    }
    Ok(boards)
}

/// Queries the boards concurrently and merges their listings in board order.
///
/// A lone board that fails fails the call. With several boards, failures
/// become warnings as long as one board answered.
pub async fn run_search(
    boards: &[Box<dyn JobBoard>],
    query: &SearchQuery,
) -> Result<JobSearchOutcome, ToolError> {
    let outcomes = join_all(boards.iter().map(|board| board.search(query))).await;

    let mut listings = Vec::new();
    let mut used: Vec<&'static str> = Vec::new();
    let mut warnings = Vec::new();
    for (board, outcome) in boards.iter().zip(outcomes) {
        match outcome {
            Ok(found) => {
                listings.extend(found);
                used.push(board.name());
            }
            Err(err) => {
                warn!(provider = board.name(), error = %err, "job board search failed");
                if boards.len() == 1 {
                    return Err(ToolError::Upstream(format!("{} API error: {}", board.label(), err)));
                }
                warnings.push(format!("{} failed: {}", board.label(), err));
            }
        }
    }

    if used.is_empty() {
        return Err(ToolError::Upstream(format!(
            "All job search providers failed: {}",
            warnings.join("; ")
        )));
    }

    let mut results = dedupe(listings);
    results.truncate(query.num_results);
    let provider = if used.len() == 1 { used[0] } else { "both" };
    Ok(JobSearchOutcome {
        total: results.len(),
        results,
        provider: provider.to_string(),
        warnings,
    })
}

async fn job_search(args: JobSearchArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let boards = select_boards(args.provider.as_deref(), &ctx)?;
    let query = SearchQuery {
        query: args.query,
        location: args.location,
        remote_only: args.remote_only,
        salary_min: args.salary_min,
        salary_max: args.salary_max,
        num_results: args.num_results.clamp(0, MAX_RESULTS as i64) as usize,
        date_posted: args.date_posted,
        employment_type: args.employment_type,
        sort_by: args.sort_by,
    };
    let outcome = run_search(&boards, &query).await?;
    info!(
        query = %query.query,
        provider = %outcome.provider,
        total = outcome.total,
        "job_search completed"
    );
    serde_json::to_value(outcome).map_err(|err| ToolError::Internal(err.to_string()))
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![ToolDefinition::new(
        "job_search",
        "Search job board APIs (JSearch, Adzuna) for real job listings. Returns structured results with title, company, location, application URL, salary range, and more. Configure API keys in Settings to enable providers.",
        InputSchema::new()
            .field(FieldSpec::string("query", "Job search keywords").required())
            .field(FieldSpec::string("location", "Location filter (city, state, country)"))
            .field(FieldSpec::boolean("remote_only", "Remote jobs only").default_value(json!(false)))
            .field(FieldSpec::integer("salary_min", "Minimum salary"))
            .field(FieldSpec::integer("salary_max", "Maximum salary"))
            .field(FieldSpec::integer("num_results", "Number of results (max 20)").default_value(json!(10)))
            .field(
                FieldSpec::string("provider", "Provider: 'both' (default), 'jsearch', or 'adzuna'")
                    .one_of(&["both", "jsearch", "adzuna"]),
            )
            .field(FieldSpec::string("date_posted", "Recency filter: 'today', '3days', 'week', 'month'").one_of(&DATE_POSTED))
            .field(
                FieldSpec::string("employment_type", "'fulltime', 'parttime', 'contract', 'temporary'")
                    .one_of(&EMPLOYMENT_TYPES),
            )
            .field(FieldSpec::string("sort_by", "'relevance' or 'date'").one_of(&["relevance", "date"])),
        handler(job_search),
    )]
}
