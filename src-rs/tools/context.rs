use std::sync::Arc;
use std::time::Duration;

use super::events::EventEmitter;
use crate::store::{JobStore, MemoryProfileStore, MemoryStore, ProfileStore, ResumeSource, StaticResume};

/// Keys for every third-party integration a tool may call.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub jsearch_api_key: Option<String>,
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
    pub adzuna_country: Option<String>,
    pub search_api_key: Option<String>,
}

impl Credentials {
    pub fn has_jsearch(&self) -> bool {
        present(&self.jsearch_api_key)
    }

    pub fn has_adzuna(&self) -> bool {
        present(&self.adzuna_app_id) && present(&self.adzuna_app_key)
    }

    pub fn has_search(&self) -> bool {
        present(&self.search_api_key)
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

#[derive(Clone, Debug)]
pub struct Endpoints {
    pub jsearch: String,
    pub adzuna: String,
    pub tavily: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            jsearch: "https://jsearch.p.rapidapi.com".to_string(),
            adzuna: "https://api.adzuna.com".to_string(),
            tavily: "https://api.tavily.com".to_string(),
        }
    }
}

/// Request-scoped collaborators handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub conversation_id: Option<i64>,
    pub credentials: Arc<Credentials>,
    pub endpoints: Arc<Endpoints>,
    pub events: EventEmitter,
    pub store: Arc<dyn JobStore>,
    pub profile: Arc<dyn ProfileStore>,
    pub resume: Arc<dyn ResumeSource>,
    pub http: reqwest::Client,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
}

impl ToolContext {
    pub fn new(
        store: Arc<dyn JobStore>,
        profile: Arc<dyn ProfileStore>,
        resume: Arc<dyn ResumeSource>,
    ) -> Self {
        Self {
            conversation_id: None,
            credentials: Arc::new(Credentials::default()),
            endpoints: Arc::new(Endpoints::default()),
            events: EventEmitter::disabled(),
            store,
            profile,
            resume,
            http: reqwest::Client::new(),
            http_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_conversation(mut self, conversation_id: i64) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Arc::new(endpoints);
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Context over empty in-memory collaborators, for tests and dry runs.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryProfileStore::default()),
            Arc::new(StaticResume(None)),
        )
    }
}
