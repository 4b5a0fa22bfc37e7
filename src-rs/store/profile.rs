use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StoreError;

pub const PROFILE_SECTIONS: [&str; 10] = [
    "Summary",
    "Education",
    "Work Experience",
    "Skills & Expertise",
    "Fields of Interest",
    "Salary Preferences",
    "Location Preferences",
    "Remote Work Preferences",
    "Job Search Goals",
    "Other Notes",
];

const PROFILE_TITLE: &str = "# Job Search Profile";

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn read(&self) -> Result<String, StoreError>;
    async fn write(&self, content: &str) -> Result<(), StoreError>;
    async fn write_section(&self, section: &str, content: &str) -> Result<(), StoreError>;
}

/// Markdown profile kept as `user_profile.md` in the data directory.
pub struct FileProfileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_or_seed(&self) -> Result<String, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let template = default_profile();
                fs::write(&self.path, &template).await?;
                info!(path = %self.path.display(), "seeded user profile");
                Ok(template)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn read(&self) -> Result<String, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_or_seed().await
    }

    async fn write(&self, content: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn write_section(&self, section: &str, content: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let current = self.read_or_seed().await?;
        let updated = replace_section(&current, section, content);
        fs::write(&self.path, updated).await?;
        Ok(())
    }
}

/// Profile held in memory only.
#[derive(Default)]
pub struct MemoryProfileStore {
    content: Mutex<Option<String>>,
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn read(&self) -> Result<String, StoreError> {
        let mut guard = self.content.lock().await;
        Ok(guard.get_or_insert_with(default_profile).clone())
    }

    async fn write(&self, content: &str) -> Result<(), StoreError> {
        *self.content.lock().await = Some(content.to_string());
        Ok(())
    }

    async fn write_section(&self, section: &str, content: &str) -> Result<(), StoreError> {
        let mut guard = self.content.lock().await;
        let current = guard.get_or_insert_with(default_profile).clone();
        *guard = Some(replace_section(&current, section, content));
        Ok(())
    }
}

pub fn default_profile() -> String {
    let mut out = String::from(PROFILE_TITLE);
    out.push_str("\n\n");
    for section in PROFILE_SECTIONS {
        out.push_str("## ");
        out.push_str(section);
        out.push_str("\n\n");
    }
    out
}

/// Replaces the body under `## <section>` up to the next `## ` heading,
/// appending the section when the document lacks it.
pub fn replace_section(document: &str, section: &str, body: &str) -> String {
    let heading = format!("## {}", section);
    let lines: Vec<&str> = document.lines().collect();
    let start = lines.iter().position(|line| line.trim_end() == heading);

    let body = body.trim();
    let mut block = vec![heading.clone(), String::new()];
    if !body.is_empty() {
        block.push(body.to_string());
        block.push(String::new());
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + block.len());
    match start {
        Some(start) => {
            let end = lines[start + 1..]
                .iter()
                .position(|line| line.starts_with("## "))
                .map(|offset| start + 1 + offset)
                .unwrap_or(lines.len());
            out.extend(lines[..start].iter().map(|l| l.to_string()));
            out.extend(block);
            out.extend(lines[end..].iter().map(|l| l.to_string()));
        }
        None => {
            out.extend(lines.iter().map(|l| l.to_string()));
            if out.last().map_or(false, |l| !l.is_empty()) {
                out.push(String::new());
            }
            out.extend(block);
        }
    }

    let mut joined = out.join("\n");
    if !joined.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_all_sections() {
        let profile = default_profile();
        for section in PROFILE_SECTIONS {
            assert!(profile.contains(&format!("## {}\n", section)));
        }
    }

    #[test]
    fn replace_section_keeps_neighbours() {
        let doc = "# Job Search Profile\n\n## Summary\n\nold summary\n\n## Education\n\nBSc\n";
        let out = replace_section(doc, "Summary", "Backend engineer, 8 years.");
        assert_eq!(
            out,
            "# Job Search Profile\n\n## Summary\n\nBackend engineer, 8 years.\n\n## Education\n\nBSc\n"
        );
    }

    #[test]
    fn replace_last_section_runs_to_end() {
        let doc = "## Summary\n\nhi\n\n## Other Notes\n\nold\nnotes\n";
        let out = replace_section(doc, "Other Notes", "new");
        assert_eq!(out, "## Summary\n\nhi\n\n## Other Notes\n\nnew\n");
    }

    #[test]
    fn missing_section_is_appended() {
        let doc = "## Summary\n\nhi";
        let out = replace_section(doc, "Salary Preferences", "150k+");
        assert_eq!(out, "## Summary\n\nhi\n\n## Salary Preferences\n\n150k+\n");
    }

    #[tokio::test]
    async fn file_store_seeds_then_updates_section() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(dir.path().join("user_profile.md"));

        let seeded = store.read().await.unwrap();
        assert!(seeded.starts_with(PROFILE_TITLE));

        store.write_section("Skills & Expertise", "Rust, Postgres").await.unwrap();
        let updated = store.read().await.unwrap();
        assert!(updated.contains("## Skills & Expertise\n\nRust, Postgres\n\n## Fields of Interest"));

        store.write("# Mine\n").await.unwrap();
        assert_eq!(store.read().await.unwrap(), "# Mine\n");
    }
}
