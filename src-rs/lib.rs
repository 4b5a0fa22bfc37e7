pub mod agent;
pub mod config;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod prompts;
pub mod result;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "tools/lib.rs"]
pub mod tools;
#[path = "store/lib.rs"]
pub mod store;
#[path = "api/lib.rs"]
pub mod api;

pub use agent::{Agent, SessionEvent, SessionState};
pub use config::{AgentConfig, AppConfig, LogFormat};
pub use error::{ConfigError, SessionError, StoreError, ToolError};
pub use result::TurnResult;
