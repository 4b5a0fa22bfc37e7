use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "Invalid value '{}'. Must be one of: {}",
                        other,
                        Self::ALL.join(", ")
                    )),
                }
            }
        }
    };
}

string_enum!(JobStatus {
    Saved => "saved",
    Applied => "applied",
    Interviewing => "interviewing",
    Offer => "offer",
    Rejected => "rejected",
});

string_enum!(RemoteType {
    Onsite => "onsite",
    Hybrid => "hybrid",
    Remote => "remote",
});

string_enum!(TodoCategory {
    Document => "document",
    Question => "question",
    Assessment => "assessment",
    Reference => "reference",
    Other => "other",
});

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Saved
    }
}

impl Default for TodoCategory {
    fn default() -> Self {
        TodoCategory::Other
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: i64,
    pub company: String,
    pub title: String,
    pub url: Option<String>,
    pub status: JobStatus,
    pub notes: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub tags: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub source: Option<String>,
    pub job_fit: Option<i64>,
    pub requirements: Option<String>,
    pub nice_to_haves: Option<String>,
    pub applied_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub company: String,
    pub title: String,
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub tags: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub source: Option<String>,
    pub job_fit: Option<i64>,
    pub requirements: Option<String>,
    pub nice_to_haves: Option<String>,
    pub applied_date: Option<NaiveDate>,
}

/// Partial update: `None` leaves the field untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub company: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub status: Option<JobStatus>,
    pub notes: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub tags: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub source: Option<String>,
    pub job_fit: Option<i64>,
    pub requirements: Option<String>,
    pub nice_to_haves: Option<String>,
    pub applied_date: Option<NaiveDate>,
}

impl JobPatch {
    /// Names of the fields this patch sets, in declaration order.
    pub fn updated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! track {
            ($($field:ident),+) => {
                $(if self.$field.is_some() { fields.push(stringify!($field)); })+
            };
        }
        track!(
            company, title, url, status, notes, salary_min, salary_max, location, remote_type,
            tags, contact_name, contact_email, source, job_fit, requirements, nice_to_haves,
            applied_date
        );
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.updated_fields().is_empty()
    }

    pub fn apply(self, job: &mut Job) {
        macro_rules! set_plain {
            ($($field:ident),+) => {
                $(if let Some(value) = self.$field { job.$field = value; })+
            };
        }
        macro_rules! set_optional {
            ($($field:ident),+) => {
                $(if let Some(value) = self.$field { job.$field = Some(value); })+
            };
        }
        set_plain!(company, title, status);
        set_optional!(
            url, notes, salary_min, salary_max, location, remote_type, tags, contact_name,
            contact_email, source, job_fit, requirements, nice_to_haves, applied_date
        );
    }
}

#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        contains_ci(Some(&job.company), self.company.as_deref())
            && contains_ci(Some(&job.title), self.title.as_deref())
            && contains_ci(job.url.as_ref(), self.url.as_deref())
    }
}

fn contains_ci(haystack: Option<&String>, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack
            .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApplicationTodo {
    pub id: i64,
    pub job_id: i64,
    pub category: TodoCategory,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct NewTodo {
    pub category: Option<TodoCategory>,
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub category: Option<TodoCategory>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub sort_order: Option<i64>,
}

impl TodoPatch {
    pub fn updated_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.category.is_some() {
            fields.push("category");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.completed.is_some() {
            fields.push("completed");
        }
        if self.sort_order.is_some() {
            fields.push("sort_order");
        }
        fields
    }

    pub fn apply(self, todo: &mut ApplicationTodo) {
        if let Some(title) = self.title {
            todo.title = title;
        }
        if let Some(category) = self.category {
            todo.category = category;
        }
        if let Some(description) = self.description {
            todo.description = description;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(sort_order) = self.sort_order {
            todo.sort_order = sort_order;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: i64,
    pub conversation_id: i64,
    pub company: String,
    pub title: String,
    pub url: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub nice_to_haves: Option<String>,
    pub job_fit: i64,
    pub fit_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewSearchResult {
    pub company: String,
    pub title: String,
    pub job_fit: i64,
    pub url: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub location: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub source: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub nice_to_haves: Option<String>,
    pub fit_reason: Option<String>,
}
