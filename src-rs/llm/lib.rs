pub mod anthropic_adapter;
pub mod mock;
pub mod rotation;
pub mod router;
pub mod types;

pub use anthropic_adapter::{AnthropicAdapter, AnthropicConfig};
pub use mock::MockProvider;
pub use rotation::Rotator;
pub use router::LLMRouter;
pub use types::{
    ChunkStream, CompletionRequest, LlmProvider, Message, ProviderError, Role, StreamChunk, ToolCall,
};
