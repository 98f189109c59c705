use crate::error::SourceResult;
use crate::models::{CategoryRef, NomineeRef, UserRef, VoteRecord};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

/// Read side of the voting platform. Every method is an idempotent read with
/// no side effects; the scheduler calls all four once per cycle.
#[async_trait]
pub trait VoteSource: Send + Sync {
    async fn fetch_votes(&self) -> SourceResult<Vec<VoteRecord>>;
    async fn fetch_categories(&self) -> SourceResult<Vec<CategoryRef>>;
    async fn fetch_nominees(&self) -> SourceResult<Vec<NomineeRef>>;
    async fn fetch_users(&self) -> SourceResult<Vec<UserRef>>;
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    votes: Vec<VoteRecord>,
    #[serde(default)]
    categories: Vec<CategoryRef>,
    #[serde(default)]
    nominees: Vec<NomineeRef>,
    #[serde(default)]
    users: Vec<UserRef>,
}

/// Reads a JSON export of the platform (`{"votes": [...], "categories": [...],
/// "nominees": [...], "users": [...]}`). The file is re-read on every fetch so
/// edits show up on the next cycle.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> SourceResult<SnapshotDocument> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let document: SnapshotDocument = serde_json::from_str(&raw)?;
        debug!("Read snapshot document from {}", self.path.display());
        Ok(document)
    }
}

#[async_trait]
impl VoteSource for JsonFileSource {
    async fn fetch_votes(&self) -> SourceResult<Vec<VoteRecord>> {
        Ok(self.read().await?.votes)
    }

    async fn fetch_categories(&self) -> SourceResult<Vec<CategoryRef>> {
        Ok(self.read().await?.categories)
    }

    async fn fetch_nominees(&self) -> SourceResult<Vec<NomineeRef>> {
        Ok(self.read().await?.nominees)
    }

    async fn fetch_users(&self) -> SourceResult<Vec<UserRef>> {
        Ok(self.read().await?.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("award-tally-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn reads_every_collection_from_one_document() {
        let path = temp_path("full");
        let document = r#"{
            "votes": [
                {"vote_id": "v1", "user_id": "u1", "category_id": "c1", "nominee_id": "n1",
                 "cast_at": "2024-05-20T08:00:00Z"}
            ],
            "categories": [{"category_id": "c1", "name": "Song of the Year"}],
            "nominees": [{"nominee_id": "n1", "name": "Winky D", "category_ids": ["c1"]}],
            "users": [{"user_id": "u1", "location": "Mutare"}, {"user_id": "u2"}]
        }"#;
        tokio::fs::write(&path, document).await.unwrap();

        let source = JsonFileSource::new(&path);
        let votes = source.fetch_votes().await.unwrap();
        let categories = source.fetch_categories().await.unwrap();
        let nominees = source.fetch_nominees().await.unwrap();
        let users = source.fetch_users().await.unwrap();
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].cast_at.to_rfc3339(), "2024-05-20T08:00:00+00:00");
        assert_eq!(categories[0].name, "Song of the Year");
        assert!(nominees[0].is_eligible_in("c1"));
        assert_eq!(nominees[0].image_url, None);
        assert_eq!(users[1].location, None);
    }

    #[tokio::test]
    async fn missing_sections_are_empty() {
        let path = temp_path("partial");
        tokio::fs::write(&path, r#"{"categories": []}"#).await.unwrap();
        let source = JsonFileSource::new(&path);
        assert!(source.fetch_votes().await.unwrap().is_empty());
        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn unreadable_file_is_a_source_error() {
        let source = JsonFileSource::new(temp_path("missing"));
        assert!(matches!(source.fetch_users().await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn malformed_file_is_a_source_error() {
        let path = temp_path("bad");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let source = JsonFileSource::new(&path);
        let result = source.fetch_categories().await;
        tokio::fs::remove_file(&path).await.ok();
        assert!(matches!(result, Err(SourceError::Json(_))));
    }
}
