use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::StoreError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResumeDocument {
    pub filename: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub parsed: Option<Value>,
}

#[async_trait]
pub trait ResumeSource: Send + Sync {
    /// `None` when no resume has been uploaded.
    async fn load(&self) -> Result<Option<ResumeDocument>, StoreError>;
}

/// Reads the `resume.json` written by the upload flow.
pub struct FileResumeSource {
    path: PathBuf,
}

impl FileResumeSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ResumeSource for FileResumeSource {
    async fn load(&self) -> Result<Option<ResumeDocument>, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// A fixed resume, or none at all.
pub struct StaticResume(pub Option<ResumeDocument>);

#[async_trait]
impl ResumeSource for StaticResume {
    async fn load(&self) -> Result<Option<ResumeDocument>, StoreError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_means_not_uploaded() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileResumeSource::new(dir.path().join("resume.json"));
        assert!(source.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn loads_text_only_resume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.json");
        std::fs::write(&path, r#"{"filename": "cv.pdf", "text": "Jane Doe"}"#).unwrap();
        let doc = FileResumeSource::new(path).load().await.unwrap().unwrap();
        assert_eq!(doc.filename, "cv.pdf");
        assert_eq!(doc.text.as_deref(), Some("Jane Doe"));
        assert!(doc.parsed.is_none());
    }
}
