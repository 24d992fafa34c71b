//! Document object store
//!
//! Attachments live on disk under a configured root, namespaced by owner,
//! submission, and checklist key, with a millisecond timestamp so repeated
//! uploads of the same key never collide. The metadata row in
//! `submission_files` is the source of truth; the store itself is only
//! consulted through the paths recorded there.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative storage path for a new upload
    pub fn build_storage_path(
        owner_id: Uuid,
        submission_id: Uuid,
        doc_key: &str,
        file_name: &str,
    ) -> String {
        format!(
            "{}/{}/{}/{}-{}",
            owner_id,
            submission_id,
            sanitize_component(doc_key),
            chrono::Utc::now().timestamp_millis(),
            sanitize_filename(file_name)
        )
    }

    /// Resolve a stored relative path, refusing anything that would escape
    /// the upload root
    fn resolve(&self, storage_path: &str) -> io::Result<PathBuf> {
        if storage_path.split(['/', '\\']).any(|c| c == "..") || storage_path.starts_with('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "storage path escapes upload root",
            ));
        }
        let full = self.root.join(storage_path);
        if !full.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "storage path escapes upload root",
            ));
        }
        Ok(full)
    }

    /// Store an object, creating parent directories as needed
    pub async fn put(&self, storage_path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(storage_path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await
    }

    /// Read an object back
    pub async fn get(&self, storage_path: &str) -> io::Result<Vec<u8>> {
        let full = self.resolve(storage_path)?;
        fs::read(&full).await
    }

    /// Remove an object
    pub async fn remove(&self, storage_path: &str) -> io::Result<()> {
        let full = self.resolve(storage_path)?;
        fs::remove_file(&full).await
    }

    /// Remove every object owned by one account (account deletion)
    pub async fn remove_owner_dir(&self, owner_id: Uuid) -> io::Result<()> {
        let dir = self.root.join(owner_id.to_string());
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Remove every stored object (full reset)
    pub async fn clear_all(&self) -> io::Result<()> {
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

/// Keep only filesystem-safe characters in a path component
fn sanitize_component(component: &str) -> String {
    let cleaned: String = component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "doc".to_string()
    } else {
        cleaned
    }
}

/// Sanitize an uploaded filename: strip directories, keep alphanumerics,
/// dashes, underscores, and dots, and never let it start with a dot
pub fn sanitize_filename(filename: &str) -> String {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_start_matches('.').trim_matches('_');

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_specials() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("my w2 (final).pdf"), "my_w2__final_.pdf");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn storage_path_shape() {
        let owner = Uuid::new_v4();
        let sub = Uuid::new_v4();
        let path = DocumentStore::build_storage_path(owner, sub, "w2", "form.pdf");
        assert!(path.starts_with(&format!("{}/{}/w2/", owner, sub)));
        assert!(path.ends_with("-form.pdf"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let store = DocumentStore::new("/data/documents");
        assert!(store.resolve("../outside.pdf").is_err());
        assert!(store.resolve("a/../../outside.pdf").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("owner/sub/w2/1-ok.pdf").is_ok());
    }

    #[tokio::test]
    async fn put_get_remove_roundtrip() {
        let root = std::env::temp_dir().join(format!("docstore-test-{}", Uuid::new_v4()));
        let store = DocumentStore::new(&root);

        store.put("o/s/w2/1-a.pdf", b"hello").await.unwrap();
        assert_eq!(store.get("o/s/w2/1-a.pdf").await.unwrap(), b"hello");

        store.remove("o/s/w2/1-a.pdf").await.unwrap();
        assert!(store.get("o/s/w2/1-a.pdf").await.is_err());

        tokio::fs::remove_dir_all(&root).await.ok();
    }
}
