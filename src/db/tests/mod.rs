//! Database layer tests, organized by domain.


use super::Database;
use tempfile::NamedTempFile;

/// Open a fresh migrated database backed by a temp file.
/// Returns the handle and the temp file (which must be kept alive).
pub(crate) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

pub(crate) fn sample_book(source: &str, identifier: &str) -> super::NewBook {
    super::NewBook {
        title: "Pride and Prejudice".to_string(),
        author: "Jane Austen".to_string(),
        year: Some(1813),
        language: Some("en".to_string()),
        description: Some("A novel of manners".to_string()),
        source: source.to_string(),
        source_identifier: identifier.to_string(),
        asset_url: format!("http://assets.test/{}/{}.pdf", source, identifier),
        asset_sha256: "ab".repeat(32),
        cover_url: None,
        genres: vec!["Fiction".to_string()],
        sub_genre: Some("Romance".to_string()),
        category: "Fiction".to_string(),
    }
}
