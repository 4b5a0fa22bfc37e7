use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::context::ToolContext;
use super::schema::{FieldSpec, InputSchema};
use super::types::{handler, ToolDefinition};
use crate::error::ToolError;
use crate::store::{
    ApplicationTodo, Job, JobFilter, JobPatch, JobStatus, NewJob, NewTodo, RemoteType, TodoCategory,
    TodoPatch,
};

const NO_FIELDS: &str = "no fields to update: provide at least one field to change";

#[derive(Debug, Deserialize)]
struct CreateJobArgs {
    company: String,
    title: String,
    url: Option<String>,
    status: Option<JobStatus>,
    notes: Option<String>,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    location: Option<String>,
    remote_type: Option<RemoteType>,
    tags: Option<String>,
    contact_name: Option<String>,
    contact_email: Option<String>,
    source: Option<String>,
    requirements: Option<String>,
    nice_to_haves: Option<String>,
    job_fit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListJobsArgs {
    status: Option<JobStatus>,
    company: Option<String>,
    title: Option<String>,
    url: Option<String>,
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct EditJobArgs {
    job_id: i64,
    #[serde(flatten)]
    patch: JobPatch,
}

#[derive(Debug, Deserialize)]
struct JobIdArgs {
    job_id: i64,
}

#[derive(Debug, Deserialize)]
struct AddTodoArgs {
    job_id: i64,
    title: String,
    category: Option<TodoCategory>,
    description: Option<String>,
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EditTodoArgs {
    job_id: i64,
    todo_id: i64,
    title: Option<String>,
    category: Option<TodoCategory>,
    description: Option<String>,
    completed: Option<bool>,
    sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TodoIdArgs {
    job_id: i64,
    todo_id: i64,
}

async fn require_job(ctx: &ToolContext, job_id: i64) -> Result<Job, ToolError> {
    ctx.store
        .get_job(job_id)
        .await?
        .ok_or_else(|| ToolError::NotFound(format!("Job with id {} not found", job_id)))
}

async fn require_todo(ctx: &ToolContext, job_id: i64, todo_id: i64) -> Result<ApplicationTodo, ToolError> {
    match ctx.store.get_todo(todo_id).await? {
        Some(todo) if todo.job_id == job_id => Ok(todo),
        _ => Err(ToolError::NotFound(format!(
            "Todo with id {} not found for job {}",
            todo_id, job_id
        ))),
    }
}

async fn create_job(args: CreateJobArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let job = ctx
        .store
        .create_job(NewJob {
            company: args.company,
            title: args.title,
            url: args.url,
            status: args.status,
            notes: args.notes,
            salary_min: args.salary_min,
            salary_max: args.salary_max,
            location: args.location,
            remote_type: args.remote_type,
            tags: args.tags,
            contact_name: args.contact_name,
            contact_email: args.contact_email,
            source: args.source,
            job_fit: args.job_fit,
            requirements: args.requirements,
            nice_to_haves: args.nice_to_haves,
            applied_date: None,
        })
        .await?;
    info!("create_job: id={} company={} title={}", job.id, job.company, job.title);
    Ok(json!({ "job": job }))
}

async fn list_jobs(args: ListJobsArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let jobs = ctx
        .store
        .list_jobs(JobFilter {
            status: args.status,
            company: args.company,
            title: args.title,
            url: args.url,
            limit: Some(args.limit.max(0) as usize),
        })
        .await?;
    Ok(json!({ "count": jobs.len(), "jobs": jobs }))
}

async fn edit_job(args: EditJobArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    require_job(&ctx, args.job_id).await?;
    if args.patch.is_empty() {
        return Err(ToolError::Validation(NO_FIELDS.to_string()));
    }
    let updated_fields = args.patch.updated_fields();
    let job = ctx.store.update_job(args.job_id, args.patch).await?;
    info!("edit_job: id={} updated_fields={:?}", job.id, updated_fields);
    Ok(json!({ "job": job, "updated_fields": updated_fields }))
}

async fn remove_job(args: JobIdArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    let job = ctx
        .store
        .delete_job(args.job_id)
        .await?
        .ok_or_else(|| ToolError::NotFound(format!("Job with id {} not found", args.job_id)))?;
    info!("remove_job: id={} company={} title={}", job.id, job.company, job.title);
    Ok(json!({
        "deleted": { "id": job.id, "company": job.company, "title": job.title }
    }))
}

async fn list_job_todos(args: JobIdArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    require_job(&ctx, args.job_id).await?;
    let todos = ctx.store.list_todos(args.job_id).await?;
    Ok(json!({ "job_id": args.job_id, "count": todos.len(), "todos": todos }))
}

async fn add_job_todo(args: AddTodoArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    require_job(&ctx, args.job_id).await?;
    let todo = ctx
        .store
        .add_todo(
            args.job_id,
            NewTodo {
                category: args.category,
                title: args.title,
                description: args.description,
                completed: args.completed,
            },
        )
        .await?;
    info!("add_job_todo: job_id={} todo_id={} title={}", todo.job_id, todo.id, todo.title);
    Ok(json!({ "todo": todo }))
}

async fn edit_job_todo(args: EditTodoArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    require_job(&ctx, args.job_id).await?;
    require_todo(&ctx, args.job_id, args.todo_id).await?;

    let patch = TodoPatch {
        title: args.title,
        category: args.category,
        description: args.description,
        completed: args.completed,
        sort_order: args.sort_order,
    };
    let updated_fields = patch.updated_fields();
    if updated_fields.is_empty() {
        return Err(ToolError::Validation(NO_FIELDS.to_string()));
    }
    let todo = ctx.store.update_todo(args.todo_id, patch).await?;
    info!(
        "edit_job_todo: job_id={} todo_id={} updated={:?}",
        args.job_id, args.todo_id, updated_fields
    );
    Ok(json!({ "todo": todo, "updated_fields": updated_fields }))
}

async fn remove_job_todo(args: TodoIdArgs, ctx: ToolContext) -> Result<Value, ToolError> {
    require_job(&ctx, args.job_id).await?;
    let todo = require_todo(&ctx, args.job_id, args.todo_id).await?;
    ctx.store.delete_todo(todo.id).await?;
    info!("remove_job_todo: job_id={} todo_id={} title={}", args.job_id, todo.id, todo.title);
    Ok(json!({
        "deleted": { "id": todo.id, "job_id": args.job_id, "title": todo.title }
    }))
}

fn job_fields(schema: InputSchema, prefix: &str) -> InputSchema {
    let describe = |text: &str| {
        if prefix.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", prefix, lowercase_first(text))
        }
    };
    schema
        .field(FieldSpec::string("url", &describe("Job posting URL")))
        .field(FieldSpec::string("status", &describe("Application status")).one_of(JobStatus::ALL))
        .field(FieldSpec::string("notes", &describe("Notes")))
        .field(FieldSpec::integer("salary_min", &describe("Minimum salary")))
        .field(FieldSpec::integer("salary_max", &describe("Maximum salary")))
        .field(FieldSpec::string("location", &describe("Job location")))
        .field(FieldSpec::string("remote_type", &describe("Remote type")).one_of(RemoteType::ALL))
        .field(FieldSpec::string("tags", &describe("Comma-separated tags")))
        .field(FieldSpec::string("contact_name", &describe("Contact name")))
        .field(FieldSpec::string("contact_email", &describe("Contact email")))
        .field(FieldSpec::string("source", &describe("Job source")))
        .field(FieldSpec::string("requirements", &describe("Requirements (newline-separated)")))
        .field(FieldSpec::string("nice_to_haves", &describe("Nice-to-haves (newline-separated)")))
        .field(FieldSpec::integer("job_fit", &describe("Job fit rating 0-5")).range(0, 5))
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn todo_id_fields(schema: InputSchema) -> InputSchema {
    schema
        .field(FieldSpec::integer("job_id", "ID of the job the todo belongs to").required())
        .field(FieldSpec::integer("todo_id", "ID of the todo").required())
}

pub fn tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "create_job",
            "Add a new job application to the tracker.",
            job_fields(
                InputSchema::new()
                    .field(FieldSpec::string("company", "Company name").required())
                    .field(FieldSpec::string("title", "Job title").required()),
                "",
            ),
            handler(create_job),
        ),
        ToolDefinition::new(
            "list_jobs",
            "List and search jobs in the tracker database. Returns jobs sorted by newest first.",
            InputSchema::new()
                .field(FieldSpec::string("status", "Filter by status").one_of(JobStatus::ALL))
                .field(FieldSpec::string("company", "Filter by company (case-insensitive substring match)"))
                .field(FieldSpec::string("title", "Filter by title (case-insensitive substring match)"))
                .field(FieldSpec::string("url", "Filter by URL (case-insensitive substring match)"))
                .field(FieldSpec::integer("limit", "Max results").default_value(json!(20))),
            handler(list_jobs),
        ),
        ToolDefinition::new(
            "edit_job",
            "Edit an existing job application in the tracker. Only the fields you provide will be updated; omitted fields remain unchanged.",
            job_fields(
                InputSchema::new()
                    .field(FieldSpec::integer("job_id", "ID of the job to edit").required())
                    .field(FieldSpec::string("company", "Updated company name"))
                    .field(FieldSpec::string("title", "Updated job title")),
                "Updated",
            ),
            handler(edit_job),
        ),
        ToolDefinition::new(
            "remove_job",
            "Remove a job application from the tracker. This permanently deletes the job and its associated application todos.",
            InputSchema::new().field(FieldSpec::integer("job_id", "ID of the job to remove").required()),
            handler(remove_job),
        ),
        ToolDefinition::new(
            "add_job_todo",
            "Add an application todo item to a job (e.g. documents to prepare, questions to research, assessments to complete).",
            InputSchema::new()
                .field(FieldSpec::integer("job_id", "ID of the job to add a todo to").required())
                .field(FieldSpec::string("title", "Title of the todo item").required())
                .field(FieldSpec::string("category", "Category").one_of(TodoCategory::ALL))
                .field(FieldSpec::string("description", "Detailed description of the todo item"))
                .field(FieldSpec::boolean("completed", "Whether the todo is already completed")),
            handler(add_job_todo),
        ),
        ToolDefinition::new(
            "edit_job_todo",
            "Edit an existing application todo item. Only provided fields are updated.",
            todo_id_fields(InputSchema::new())
                .field(FieldSpec::string("title", "Updated title"))
                .field(FieldSpec::string("category", "Updated category").one_of(TodoCategory::ALL))
                .field(FieldSpec::string("description", "Updated description"))
                .field(FieldSpec::boolean("completed", "Updated completion status"))
                .field(FieldSpec::integer("sort_order", "Updated sort order")),
            handler(edit_job_todo),
        ),
        ToolDefinition::new(
            "remove_job_todo",
            "Remove an application todo item from a job.",
            todo_id_fields(InputSchema::new()),
            handler(remove_job_todo),
        ),
        ToolDefinition::new(
            "list_job_todos",
            "List application todo items for a job, ordered by sort_order.",
            InputSchema::new().field(FieldSpec::integer("job_id", "ID of the job to list todos for").required()),
            handler(list_job_todos),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::dispatch::Dispatcher;
    use crate::tools::registry::ToolRegistry;
    use std::sync::Arc;

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register_all(tools()).unwrap();
        Dispatcher::new(Arc::new(registry))
    }

    async fn create(d: &Dispatcher, ctx: &ToolContext, company: &str) -> i64 {
        let result = d
            .dispatch("create_job", &json!({"company": company, "title": "Engineer"}), ctx)
            .await;
        result.to_value()["job"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_applies_defaults_and_coerces_fit() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let result = d
            .dispatch(
                "create_job",
                &json!({"company": "Acme", "title": "SRE", "job_fit": 4.0, "remote_type": "hybrid"}),
                &ctx,
            )
            .await;
        let job = &result.to_value()["job"];
        assert_eq!(job["status"], json!("saved"));
        assert_eq!(job["job_fit"], json!(4));
        assert_eq!(job["remote_type"], json!("hybrid"));
    }

    #[tokio::test]
    async fn invalid_status_is_rejected_before_store() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let result = d
            .dispatch("create_job", &json!({"company": "Acme", "title": "SRE", "status": "ghosted"}), &ctx)
            .await;
        assert!(result.error_message().unwrap().contains("status"));
        let listed = d.dispatch("list_jobs", &json!({}), &ctx).await;
        assert_eq!(listed.to_value()["count"], json!(0));
    }

    #[tokio::test]
    async fn edit_without_fields_leaves_job_unchanged() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let id = create(&d, &ctx, "Acme").await;
        let before = ctx.store.get_job(id).await.unwrap().unwrap();

        let result = d.dispatch("edit_job", &json!({"job_id": id}), &ctx).await;
        assert!(result.error_message().unwrap().starts_with("no fields to update"));
        assert_eq!(ctx.store.get_job(id).await.unwrap().unwrap(), before);

        let missing = d.dispatch("edit_job", &json!({"job_id": 999, "notes": "x"}), &ctx).await;
        assert_eq!(missing.error_message(), Some("Job with id 999 not found"));
    }

    #[tokio::test]
    async fn edit_reports_updated_fields() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let id = create(&d, &ctx, "Acme").await;
        let result = d
            .dispatch("edit_job", &json!({"job_id": id, "status": "applied", "notes": "sent CV"}), &ctx)
            .await;
        let value = result.to_value();
        assert_eq!(value["updated_fields"], json!(["status", "notes"]));
        assert_eq!(value["job"]["status"], json!("applied"));
    }

    #[tokio::test]
    async fn todos_are_ordered_and_scoped_to_their_job() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let job = create(&d, &ctx, "Acme").await;
        let other = create(&d, &ctx, "Globex").await;

        for title in ["CV", "Cover letter", "Portfolio"] {
            d.dispatch("add_job_todo", &json!({"job_id": job, "title": title}), &ctx).await;
        }
        let listed = d.dispatch("list_job_todos", &json!({"job_id": job}), &ctx).await.to_value();
        let orders: Vec<i64> = listed["todos"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["sort_order"].as_i64().unwrap())
            .collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(listed["todos"][0]["category"], json!("other"));

        let todo_id = listed["todos"][0]["id"].as_i64().unwrap();
        let wrong_job = d
            .dispatch("remove_job_todo", &json!({"job_id": other, "todo_id": todo_id}), &ctx)
            .await;
        assert_eq!(
            wrong_job.error_message().map(str::to_string),
            Some(format!("Todo with id {} not found for job {}", todo_id, other))
        );

        let empty_edit = d
            .dispatch("edit_job_todo", &json!({"job_id": job, "todo_id": todo_id}), &ctx)
            .await;
        assert!(empty_edit.is_error());

        let done = d
            .dispatch(
                "edit_job_todo",
                &json!({"job_id": job, "todo_id": todo_id, "completed": true}),
                &ctx,
            )
            .await
            .to_value();
        assert_eq!(done["todo"]["completed"], json!(true));
        assert_eq!(done["updated_fields"], json!(["completed"]));
    }

    #[tokio::test]
    async fn remove_job_cascades_todos() {
        let d = dispatcher();
        let ctx = ToolContext::in_memory();
        let job = create(&d, &ctx, "Acme").await;
        d.dispatch("add_job_todo", &json!({"job_id": job, "title": "CV"}), &ctx).await;

        let removed = d.dispatch("remove_job", &json!({"job_id": job}), &ctx).await.to_value();
        assert_eq!(removed["deleted"]["company"], json!("Acme"));
        assert!(ctx.store.list_todos(job).await.unwrap().is_empty());

        let again = d.dispatch("remove_job", &json!({"job_id": job}), &ctx).await;
        assert!(again.is_error());
    }
}
