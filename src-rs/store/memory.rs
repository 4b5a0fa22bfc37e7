use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::{
    ApplicationTodo, Job, JobFilter, JobPatch, NewJob, NewSearchResult, NewTodo, SearchResult,
    TodoPatch,
};
use super::JobStore;
use crate::error::StoreError;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: i64,
    jobs: BTreeMap<i64, Job>,
    todos: BTreeMap<i64, ApplicationTodo>,
    search_results: BTreeMap<i64, SearchResult>,
}

impl Snapshot {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store. When a path is given, every mutation rewrites a JSON
/// snapshot there and `open` reloads it.
///
/// The snapshot is serialized under the data lock and written after it is
/// released. `writer` orders mutations so an older snapshot never lands on
/// disk after a newer one.
pub struct MemoryStore {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            path: None,
            data: RwLock::new(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<Snapshot>(&raw)?
        } else {
            Snapshot::default()
        };
        debug!(path = %path.display(), jobs = data.jobs.len(), "job store opened");
        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
            writer: Mutex::new(()),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Snapshot>, StoreError> {
        self.data.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Snapshot>, StoreError> {
        self.data.write().map_err(|_| StoreError::Poisoned)
    }

    /// Serializes the snapshot when the store is file backed. Call with the
    /// write guard held.
    fn pending_snapshot(&self, data: &Snapshot) -> Result<Option<String>, StoreError> {
        match self.path {
            Some(_) => Ok(Some(serde_json::to_string_pretty(data)?)),
            None => Ok(None),
        }
    }

    /// Writes a serialized snapshot to a sibling temp file and renames it
    /// over the real one.
    async fn persist(&self, pending: Option<String>) -> Result<(), StoreError> {
        let (path, serialized) = match (&self.path, pending) {
            (Some(path), Some(serialized)) => (path, serialized),
            _ => return Ok(()),
        };
        let tmp = path.with_extension("json.tmp");
        let result = async {
            tokio::fs::write(&tmp, serialized).await?;
            tokio::fs::rename(&tmp, path).await
        }
        .await;
        if let Err(err) = &result {
            warn!(path = %path.display(), error = %err, "failed to persist job store snapshot");
        }
        result.map_err(StoreError::from)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, new: NewJob) -> Result<Job, StoreError> {
        let _writer = self.writer.lock().await;
        let (job, pending) = {
            let mut data = self.write()?;
            let now = Utc::now();
            let job = Job {
                id: data.next_id(),
                company: new.company,
                title: new.title,
                url: new.url,
                status: new.status.unwrap_or_default(),
                notes: new.notes,
                salary_min: new.salary_min,
                salary_max: new.salary_max,
                location: new.location,
                remote_type: new.remote_type,
                tags: new.tags,
                contact_name: new.contact_name,
                contact_email: new.contact_email,
                source: new.source,
                job_fit: new.job_fit,
                requirements: new.requirements,
                nice_to_haves: new.nice_to_haves,
                applied_date: new.applied_date,
                created_at: now,
                updated_at: now,
            };
            data.jobs.insert(job.id, job.clone());
            (job, self.pending_snapshot(&data)?)
        };
        self.persist(pending).await?;
        Ok(job)
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let data = self.read()?;
        let mut items: Vec<Job> = data
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn update_job(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError> {
        let _writer = self.writer.lock().await;
        let (updated, pending) = {
            let mut data = self.write()?;
            let job = data
                .jobs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("Job with id {} not found", id)))?;
            patch.apply(job);
            job.updated_at = Utc::now();
            let updated = job.clone();
            (updated, self.pending_snapshot(&data)?)
        };
        self.persist(pending).await?;
        Ok(updated)
    }

    async fn delete_job(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let _writer = self.writer.lock().await;
        let (removed, pending) = {
            let mut data = self.write()?;
            let removed = data.jobs.remove(&id);
            let pending = match removed {
                Some(_) => {
                    data.todos.retain(|_, todo| todo.job_id != id);
                    self.pending_snapshot(&data)?
                }
                None => None,
            };
            (removed, pending)
        };
        self.persist(pending).await?;
        Ok(removed)
    }

    async fn add_todo(&self, job_id: i64, new: NewTodo) -> Result<ApplicationTodo, StoreError> {
        let _writer = self.writer.lock().await;
        let (todo, pending) = {
            let mut data = self.write()?;
            if !data.jobs.contains_key(&job_id) {
                return Err(StoreError::NotFound(format!("Job with id {} not found", job_id)));
            }
            let max_order = data
                .todos
                .values()
                .filter(|todo| todo.job_id == job_id)
                .map(|todo| todo.sort_order)
                .max()
                .unwrap_or(0);
            let todo = ApplicationTodo {
                id: data.next_id(),
                job_id,
                category: new.category.unwrap_or_default(),
                title: new.title,
                description: new.description.unwrap_or_default(),
                completed: new.completed.unwrap_or(false),
                sort_order: max_order + 1,
                created_at: Utc::now(),
            };
            data.todos.insert(todo.id, todo.clone());
            (todo, self.pending_snapshot(&data)?)
        };
        self.persist(pending).await?;
        Ok(todo)
    }

    async fn get_todo(&self, todo_id: i64) -> Result<Option<ApplicationTodo>, StoreError> {
        Ok(self.read()?.todos.get(&todo_id).cloned())
    }

    async fn update_todo(&self, todo_id: i64, patch: TodoPatch) -> Result<ApplicationTodo, StoreError> {
        let _writer = self.writer.lock().await;
        let (updated, pending) = {
            let mut data = self.write()?;
            let todo = data
                .todos
                .get_mut(&todo_id)
                .ok_or_else(|| StoreError::NotFound(format!("Todo with id {} not found", todo_id)))?;
            patch.apply(todo);
            let updated = todo.clone();
            (updated, self.pending_snapshot(&data)?)
        };
        self.persist(pending).await?;
        Ok(updated)
    }

    async fn delete_todo(&self, todo_id: i64) -> Result<Option<ApplicationTodo>, StoreError> {
        let _writer = self.writer.lock().await;
        let (removed, pending) = {
            let mut data = self.write()?;
            let removed = data.todos.remove(&todo_id);
            let pending = match removed {
                Some(_) => self.pending_snapshot(&data)?,
                None => None,
            };
            (removed, pending)
        };
        self.persist(pending).await?;
        Ok(removed)
    }

    async fn list_todos(&self, job_id: i64) -> Result<Vec<ApplicationTodo>, StoreError> {
        let data = self.read()?;
        let mut items: Vec<ApplicationTodo> = data
            .todos
            .values()
            .filter(|todo| todo.job_id == job_id)
            .cloned()
            .collect();
        items.sort_by_key(|todo| (todo.sort_order, todo.id));
        Ok(items)
    }

    async fn add_search_result(
        &self,
        conversation_id: i64,
        new: NewSearchResult,
    ) -> Result<SearchResult, StoreError> {
        let _writer = self.writer.lock().await;
        let (result, pending) = {
            let mut data = self.write()?;
            let result = SearchResult {
                id: data.next_id(),
                conversation_id,
                company: new.company,
                title: new.title,
                url: new.url,
                salary_min: new.salary_min,
                salary_max: new.salary_max,
                location: new.location,
                remote_type: new.remote_type,
                source: new.source,
                description: new.description,
                requirements: new.requirements,
                nice_to_haves: new.nice_to_haves,
                job_fit: new.job_fit,
                fit_reason: new.fit_reason,
                created_at: Utc::now(),
            };
            data.search_results.insert(result.id, result.clone());
            (result, self.pending_snapshot(&data)?)
        };
        self.persist(pending).await?;
        Ok(result)
    }

    async fn list_search_results(
        &self,
        conversation_id: i64,
        min_fit: Option<i64>,
    ) -> Result<Vec<SearchResult>, StoreError> {
        let data = self.read()?;
        let mut items: Vec<SearchResult> = data
            .search_results
            .values()
            .filter(|r| r.conversation_id == conversation_id)
            .filter(|r| min_fit.map_or(true, |min| r.job_fit >= min))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::JobStatus;

    fn new_job(company: &str, title: &str) -> NewJob {
        NewJob {
            company: company.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn new_todo(title: &str) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn todos_get_increasing_sort_order() {
        let store = MemoryStore::new();
        let job = store.create_job(new_job("Acme", "Engineer")).await.unwrap();

        let a = store.add_todo(job.id, new_todo("resume")).await.unwrap();
        let b = store.add_todo(job.id, new_todo("cover letter")).await.unwrap();
        let c = store.add_todo(job.id, new_todo("references")).await.unwrap();
        assert_eq!((a.sort_order, b.sort_order, c.sort_order), (1, 2, 3));

        store.delete_todo(a.id).await.unwrap();
        let d = store.add_todo(job.id, new_todo("portfolio")).await.unwrap();
        assert_eq!(d.sort_order, 4);

        let titles: Vec<String> = store
            .list_todos(job.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["cover letter", "references", "portfolio"]);
    }

    #[tokio::test]
    async fn delete_job_cascades_todos() {
        let store = MemoryStore::new();
        let job = store.create_job(new_job("Acme", "Engineer")).await.unwrap();
        let todo = store.add_todo(job.id, new_todo("resume")).await.unwrap();

        let removed = store.delete_job(job.id).await.unwrap();
        assert_eq!(removed.map(|j| j.id), Some(job.id));
        assert!(store.get_todo(todo.id).await.unwrap().is_none());
        assert!(store.delete_job(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_jobs_newest_first_with_filters() {
        let store = MemoryStore::new();
        store.create_job(new_job("Acme", "Engineer")).await.unwrap();
        let mut applied = new_job("Globex", "Designer");
        applied.status = Some(JobStatus::Applied);
        store.create_job(applied).await.unwrap();
        store.create_job(new_job("Initech", "Engineer II")).await.unwrap();

        let all = store.list_jobs(JobFilter::default()).await.unwrap();
        let companies: Vec<&str> = all.iter().map(|j| j.company.as_str()).collect();
        assert_eq!(companies, vec!["Initech", "Globex", "Acme"]);

        let engineers = store
            .list_jobs(JobFilter {
                title: Some("ENGINEER".to_string()),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(engineers.len(), 1);
        assert_eq!(engineers[0].company, "Initech");

        let applied = store
            .list_jobs(JobFilter {
                status: Some(JobStatus::Applied),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        {
            let store = MemoryStore::open(path.clone()).unwrap();
            let job = store.create_job(new_job("Acme", "Engineer")).await.unwrap();
            store.add_todo(job.id, new_todo("resume")).await.unwrap();
        }
        let store = MemoryStore::open(path).unwrap();
        let jobs = store.list_jobs(JobFilter::default()).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(store.list_todos(jobs[0].id).await.unwrap().len(), 1);

        let next = store.create_job(new_job("Globex", "Designer")).await.unwrap();
        assert!(next.id > jobs[0].id);
    }

    #[tokio::test]
    async fn failed_snapshot_write_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::open(dir.path().join("missing").join("jobs.json")).unwrap();

        let err = store.create_job(new_job("Acme", "Engineer")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[tokio::test]
    async fn snapshot_is_replaced_without_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = MemoryStore::open(path.clone()).unwrap();
        let job = store.create_job(new_job("Acme", "Engineer")).await.unwrap();
        store
            .update_job(
                job.id,
                JobPatch {
                    notes: Some("referral".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("referral"));
    }

    #[tokio::test]
    async fn concurrent_writes_all_reach_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let store = std::sync::Arc::new(MemoryStore::open(path.clone()).unwrap());
        let writes = (0..8).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create_job(new_job(&format!("Co{}", i), "Engineer")).await })
        });
        for handle in futures::future::join_all(writes).await {
            handle.unwrap().unwrap();
        }

        let reopened = MemoryStore::open(path).unwrap();
        assert_eq!(reopened.list_jobs(JobFilter::default()).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn search_results_scoped_by_conversation_and_fit() {
        let store = MemoryStore::new();
        for (conversation, fit) in [(1, 2), (1, 4), (2, 5)] {
            store
                .add_search_result(
                    conversation,
                    NewSearchResult {
                        company: "Acme".to_string(),
                        title: "Engineer".to_string(),
                        job_fit: fit,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        assert_eq!(store.list_search_results(1, None).await.unwrap().len(), 2);
        let strong = store.list_search_results(1, Some(3)).await.unwrap();
        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].job_fit, 4);
    }
}
