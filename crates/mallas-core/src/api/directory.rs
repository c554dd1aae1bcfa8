//! Local directory document source, for a checked-out `public/` folder.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::fs;
use tracing::debug;

use super::{DocumentSource, FetchError};

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_json(&self, path: &str) -> Result<Value, FetchError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FetchError::AccessDenied(format!("{} leaves the data root", path)));
        }
        let full = self.root.join(relative);
        debug!(path = %full.display(), "Reading document");

        let contents = fs::read_to_string(&full).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotFound(path.to_string()),
            _ => FetchError::Io {
                path: path.to_string(),
                source: e,
            },
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| FetchError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

impl DocumentSource for DirectorySource {
    fn fetch_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        self.read_json(path).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mallas")).unwrap();
        std::fs::write(dir.path().join("mallas/index.json"), r#"{"files":["a.json"]}"#).unwrap();

        let source = DirectorySource::new(dir.path());
        let value = source.fetch_json("/mallas/index.json").await.unwrap();
        assert_eq!(value, serde_json::json!({ "files": ["a.json"] }));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
        let source = DirectorySource::new(dir.path());

        let missing = source.fetch_json("absent.json").await.unwrap_err();
        assert!(missing.is_not_found());

        let broken = source.fetch_json("broken.json").await.unwrap_err();
        assert!(matches!(broken, FetchError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("public");
        std::fs::create_dir_all(root.join("mallas")).unwrap();
        std::fs::write(dir.path().join("secret.json"), r#"{"token":"x"}"#).unwrap();

        let source = DirectorySource::new(&root);
        let err = source.fetch_json("mallas/../../secret.json").await.unwrap_err();
        assert!(matches!(err, FetchError::AccessDenied(_)));
    }
}
