pub mod conversations;
pub mod errors;
pub mod handlers;
pub mod server;

pub use conversations::{Conversation, ConversationStore, ConversationSummary};
pub use errors::ApiError;
pub use server::{router, AgentServer, AppState};
