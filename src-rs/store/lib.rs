pub mod memory;
pub mod profile;
pub mod resume;
pub mod types;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use profile::{FileProfileStore, MemoryProfileStore, ProfileStore, PROFILE_SECTIONS};
pub use resume::{FileResumeSource, ResumeDocument, ResumeSource, StaticResume};
pub use types::{
    ApplicationTodo, Job, JobFilter, JobPatch, JobStatus, NewJob, NewSearchResult, NewTodo,
    RemoteType, SearchResult, TodoCategory, TodoPatch,
};

/// Data-access surface for job tracking records. Implementations own
/// isolation between concurrent callers.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: NewJob) -> Result<Job, StoreError>;
    async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError>;
    /// Newest first.
    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;
    async fn update_job(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError>;
    /// Deletes the job and its todos; returns the removed job.
    async fn delete_job(&self, id: i64) -> Result<Option<Job>, StoreError>;

    /// Assigns `sort_order = max(existing) + 1` for the job.
    async fn add_todo(&self, job_id: i64, todo: NewTodo) -> Result<ApplicationTodo, StoreError>;
    async fn get_todo(&self, todo_id: i64) -> Result<Option<ApplicationTodo>, StoreError>;
    async fn update_todo(&self, todo_id: i64, patch: TodoPatch) -> Result<ApplicationTodo, StoreError>;
    async fn delete_todo(&self, todo_id: i64) -> Result<Option<ApplicationTodo>, StoreError>;
    /// Ordered by `(sort_order, id)`.
    async fn list_todos(&self, job_id: i64) -> Result<Vec<ApplicationTodo>, StoreError>;

    async fn add_search_result(
        &self,
        conversation_id: i64,
        result: NewSearchResult,
    ) -> Result<SearchResult, StoreError>;
    /// Newest first, optionally limited to `job_fit >= min_fit`.
    async fn list_search_results(
        &self,
        conversation_id: i64,
        min_fit: Option<i64>,
    ) -> Result<Vec<SearchResult>, StoreError>;
}
