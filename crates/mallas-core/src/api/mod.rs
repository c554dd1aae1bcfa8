//! Document sources for published curricula.
//!
//! This module provides the `DocumentSource` trait through which the
//! catalog loader fetches `mallas/index.json` and individual curriculum
//! documents, along with two implementations:
//!
//! - `HttpSource`: static files served over HTTP(S)
//! - `DirectorySource`: the same layout read from a local directory

pub mod client;
pub mod directory;
pub mod error;

pub use client::HttpSource;
pub use directory::DirectorySource;
pub use error::FetchError;

use futures::future::BoxFuture;
use serde_json::Value;

/// Fetches JSON documents by path relative to the source root.
pub trait DocumentSource: Send + Sync {
    fn fetch_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, FetchError>>;
}

/// Join a base URL and a path with exactly one `/` between them.
pub fn build_url(base_url: &str, path: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
