pub mod catalog;
pub mod context;
pub mod dispatch;
pub mod events;
pub mod job_search;
pub mod jobs;
pub mod normalize;
pub mod profile;
pub mod registry;
pub mod resume;
pub mod schema;
pub mod search_results;
pub mod types;
pub mod validation;
pub mod web;

pub use catalog::build_registry;
pub use context::{Credentials, Endpoints, ToolContext};
pub use dispatch::Dispatcher;
pub use events::{ChannelSink, EventEmitter, EventSink, UiEvent};
pub use job_search::{JobBoard, JobSearchOutcome, SearchQuery};
pub use normalize::NormalizedJobListing;
pub use registry::ToolRegistry;
pub use schema::{FieldSpec, FieldType, InputSchema};
pub use types::{handler, NoArgs, ToolDefinition, ToolHandler, ToolResult, ToolSchema};
