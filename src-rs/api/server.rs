use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use super::conversations::ConversationStore;
use super::handlers::{
    handle_chat, handle_create_job, handle_delete_job, handle_get_conversation, handle_get_job, handle_health,
    handle_job_todos, handle_list_conversations, handle_list_jobs, handle_search_results, handle_tools,
    handle_update_job,
};
use crate::agent::Agent;
use crate::store::{JobStore, ProfileStore, ResumeSource};
use crate::tools::{Credentials, Endpoints, ToolContext};

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub conversations: Arc<ConversationStore>,
    pub store: Arc<dyn JobStore>,
    pub profile: Arc<dyn ProfileStore>,
    pub resume: Arc<dyn ResumeSource>,
    pub credentials: Arc<Credentials>,
    pub endpoints: Arc<Endpoints>,
    pub http: reqwest::Client,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new(
        agent: Arc<Agent>,
        store: Arc<dyn JobStore>,
        profile: Arc<dyn ProfileStore>,
        resume: Arc<dyn ResumeSource>,
    ) -> Self {
        let defaults = ToolContext::new(store.clone(), profile.clone(), resume.clone());
        Self {
            agent,
            conversations: Arc::new(ConversationStore::new()),
            store,
            profile,
            resume,
            credentials: defaults.credentials,
            endpoints: defaults.endpoints,
            http: defaults.http,
            poll_interval: defaults.poll_interval,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Arc::new(endpoints);
        self
    }

    /// Tool context for one turn; events are wired by the session.
    pub fn tool_context(&self, conversation_id: Option<i64>) -> ToolContext {
        let mut ctx = ToolContext::new(self.store.clone(), self.profile.clone(), self.resume.clone());
        ctx.conversation_id = conversation_id;
        ctx.credentials = self.credentials.clone();
        ctx.endpoints = self.endpoints.clone();
        ctx.http = self.http.clone();
        ctx.poll_interval = self.poll_interval;
        ctx
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/tools", get(handle_tools))
        .route("/api/chat", post(handle_chat))
        .route("/api/conversations", get(handle_list_conversations))
        .route("/api/conversations/:id", get(handle_get_conversation))
        .route("/api/conversations/:id/search-results", get(handle_search_results))
        .route("/api/jobs", get(handle_list_jobs).post(handle_create_job))
        .route(
            "/api/jobs/:id",
            get(handle_get_job).patch(handle_update_job).delete(handle_delete_job),
        )
        .route("/api/jobs/:id/todos", get(handle_job_todos))
        .with_state(state)
}

pub struct AgentServer {
    pub port: u16,
    pub state: AppState,
}

impl AgentServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    /// Serves until ctrl-c.
    pub async fn start(self) -> Result<(), String> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!(%addr, "job agent listening");
        axum::Server::bind(&addr)
            .serve(router(self.state).into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| err.to_string())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
