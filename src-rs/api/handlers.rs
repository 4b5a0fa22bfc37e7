use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::errors::ApiError;
use super::server::AppState;
use crate::agent::SessionEvent;
use crate::error::SessionError;
use crate::llm::Message;
use crate::store::{JobFilter, JobPatch, JobStatus, NewJob};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResultsQuery {
    pub min_fit: Option<i64>,
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tools": state.agent.dispatcher().catalog() }))
}

/// Starts a turn and streams its [`SessionEvent`]s as server-sent events.
/// The first event names the conversation; dropping the connection cancels
/// the turn.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let text = req.message.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("message required".to_string()));
    }

    let conversation = match req.conversation_id {
        Some(id) => state
            .conversations
            .get(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Conversation with id {} not found", id)))?,
        None => state.conversations.create(text)?,
    };
    let guard = state.conversations.begin_turn(conversation.id).ok_or_else(|| {
        ApiError::Conflict(format!(
            "Conversation {} already has a turn in progress",
            conversation.id
        ))
    })?;

    let user = Message::user(text);
    let mut history = conversation.messages;
    history.push(user.clone());

    let conversation_id = conversation.id;
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let ctx = state.tool_context(Some(conversation_id));
    let agent = state.agent.clone();
    let conversations = state.conversations.clone();
    let turn_cancel = cancel.clone();

    info!(conversation_id, chars = text.len(), "chat turn started");
    tokio::spawn(async move {
        let _guard = guard;
        let appended = match agent.run_turn(history, ctx, tx, turn_cancel).await {
            Ok(result) => {
                info!(conversation_id, tool_rounds = result.tool_rounds, "chat turn finished");
                let mut appended = vec![user];
                appended.extend(result.messages);
                appended
            }
            Err(SessionError::Cancelled) => {
                info!(conversation_id, "chat turn cancelled");
                vec![user]
            }
            Err(err) => {
                warn!(conversation_id, error = %err, "chat turn failed");
                vec![user]
            }
        };
        if let Err(err) = conversations.append(conversation_id, appended) {
            warn!(conversation_id, error = %err, "failed to save conversation");
        }
    });

    let opening = stream::once(async move {
        Event::default()
            .event("conversation")
            .json_data(json!({ "conversation_id": conversation_id }))
            .map_err(axum::Error::new)
    });
    let cancel_on_drop = cancel.drop_guard();
    let events = UnboundedReceiverStream::new(rx).map(move |event: SessionEvent| {
        let _ = &cancel_on_drop;
        Event::default().json_data(event).map_err(axum::Error::new)
    });

    Ok(Sse::new(opening.chain(events)).keep_alive(KeepAlive::default()))
}

pub async fn handle_list_conversations(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({ "conversations": state.conversations.list()? })))
}

pub async fn handle_get_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let conversation = state
        .conversations
        .get(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Conversation with id {} not found", id)))?;
    Ok(Json(json!({ "conversation": conversation })))
}

pub async fn handle_search_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<SearchResultsQuery>,
) -> Result<Json<Value>, ApiError> {
    let results = state.store.list_search_results(id, query.min_fit).await?;
    Ok(Json(json!({ "search_results": results, "count": results.len() })))
}

pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(raw.parse::<JobStatus>().map_err(ApiError::Validation)?),
        None => None,
    };
    let jobs = state
        .store
        .list_jobs(JobFilter {
            status,
            company: query.company,
            title: query.title,
            url: query.url,
            limit: query.limit,
        })
        .await?;
    Ok(Json(json!({ "jobs": jobs, "count": jobs.len() })))
}

pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(job): Json<NewJob>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if job.company.trim().is_empty() || job.title.trim().is_empty() {
        return Err(ApiError::Validation("company and title are required".to_string()));
    }
    check_fit(job.job_fit)?;
    let job = state.store.create_job(job).await?;
    info!(id = job.id, company = %job.company, title = %job.title, "job created over http");
    Ok((StatusCode::CREATED, Json(json!({ "job": job }))))
}

pub async fn handle_get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    let job = state
        .store
        .get_job(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job with id {} not found", id)))?;
    Ok(Json(json!({ "job": job })))
}

pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<Value>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::Validation(
            "no fields to update: provide at least one field to change".to_string(),
        ));
    }
    check_fit(patch.job_fit)?;
    let job = state.store.update_job(id, patch).await?;
    Ok(Json(json!({ "job": job })))
}

pub async fn handle_delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    match state.store.delete_job(id).await? {
        Some(job) => Ok(Json(json!({ "deleted": job.id }))),
        None => Err(ApiError::NotFound(format!("Job with id {} not found", id))),
    }
}

pub async fn handle_job_todos(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    if state.store.get_job(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Job with id {} not found", id)));
    }
    let todos = state.store.list_todos(id).await?;
    Ok(Json(json!({ "todos": todos, "count": todos.len() })))
}

fn check_fit(fit: Option<i64>) -> Result<(), ApiError> {
    match fit {
        Some(value) if !(0..=5).contains(&value) => Err(ApiError::Validation(format!(
            "job_fit must be between 0 and 5, got {}",
            value
        ))),
        _ => Ok(()),
    }
}
