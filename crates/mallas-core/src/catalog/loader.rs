use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{Catalog, CatalogIssue};
use crate::api::DocumentSource;
use crate::cache::CachedData;
use crate::custom::CustomCurriculum;
use crate::models::{CatalogEntry, CatalogIndex, CurriculumDocument, CurriculumId, CurriculumInfo};
use crate::utils::cmp_locale;

/// Path of the index listing curriculum files, relative to the source root.
pub const INDEX_PATH: &str = "mallas/index.json";

/// A loaded catalog and when it was loaded. Cheap to clone.
pub type CatalogSnapshot = Arc<CachedData<Catalog>>;

type InFlight = Shared<BoxFuture<'static, CatalogSnapshot>>;

fn document_path(file: &str) -> String {
    format!("mallas/{}", file)
}

/// Discovers published curricula and fetches their bodies.
///
/// Concurrent `load_catalog` calls share one in-flight load. Readers of the
/// snapshot see either the previous catalog or the complete new one.
pub struct CatalogLoader {
    source: Arc<dyn DocumentSource>,
    custom: CustomCurriculum,
    snapshot: Arc<RwLock<Option<CatalogSnapshot>>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn DocumentSource>, custom: CustomCurriculum) -> Self {
        Self {
            source,
            custom,
            snapshot: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Load the catalog, joining the load already in flight if there is one.
    /// Never fails: problems end up in `Catalog::issues`.
    pub async fn load_catalog(&self) -> CatalogSnapshot {
        let load = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(load) => {
                    debug!("Catalog load already in flight, joining it");
                    load.clone()
                }
                None => {
                    let load = Self::discover(
                        self.source.clone(),
                        self.snapshot.clone(),
                        self.in_flight.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// The current snapshot, loading one first if there is none or it is stale.
    pub async fn catalog_or_load(&self) -> CatalogSnapshot {
        match self.catalog() {
            Some(snapshot) if !snapshot.is_stale() => snapshot,
            _ => self.load_catalog().await,
        }
    }

    /// The last loaded snapshot, if any load has finished.
    pub fn catalog(&self) -> Option<CatalogSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Fetch the body of one curriculum. The custom curriculum comes from
    /// local storage; others from the source. Returns `None` on any failure.
    pub async fn load_curriculum_body(&self, id: &str) -> Option<Value> {
        let id = CurriculumId::parse(id).ok()?;
        match id {
            CurriculumId::Custom => Some(self.custom.load()),
            CurriculumId::Standard(name) => {
                let path = document_path(&format!("{}.json", name));
                match self.source.fetch_json(&path).await {
                    Ok(raw) => Some(CurriculumDocument::from_value(raw).into_body()),
                    Err(e) => {
                        error!(curriculum = %name, error = %e, "Failed to load curriculum");
                        None
                    }
                }
            }
        }
    }

    /// Display name of a catalogued curriculum, or an empty string.
    pub fn get_title(&self, id: &str) -> String {
        self.with_entry(id, |e| e.display_name.clone())
            .unwrap_or_default()
    }

    pub fn get_info(&self, id: &str) -> Option<CurriculumInfo> {
        self.with_entry(id, CatalogEntry::info)
    }

    fn with_entry<T>(&self, id: &str, f: impl FnOnce(&CatalogEntry) -> T) -> Option<T> {
        let snapshot = self.catalog()?;
        snapshot.data.find(id).map(f)
    }

    async fn discover(
        source: Arc<dyn DocumentSource>,
        snapshot: Arc<RwLock<Option<CatalogSnapshot>>>,
        in_flight: Arc<Mutex<Option<InFlight>>>,
    ) -> CatalogSnapshot {
        info!("Loading curriculum catalog");

        let catalog = match AssertUnwindSafe(build_catalog(source.as_ref()))
            .catch_unwind()
            .await
        {
            Ok(catalog) => catalog,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(error = %reason, "Catalog load aborted, resetting to empty");
                Catalog::aborted(reason)
            }
        };

        info!(
            count = catalog.len(),
            issues = catalog.issues().len(),
            "Curriculum catalog loaded"
        );

        let loaded = Arc::new(CachedData::new(catalog));
        *snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        lock(&in_flight).take();
        loaded
    }
}

async fn build_catalog(source: &dyn DocumentSource) -> Catalog {
    let mut issues = Vec::new();

    let files = match source.fetch_json(INDEX_PATH).await {
        Ok(raw) => match serde_json::from_value::<CatalogIndex>(raw) {
            Ok(index) => index.files,
            Err(e) => {
                warn!(error = %e, "Curriculum index is malformed, no curricula listed");
                issues.push(CatalogIssue::IndexUnavailable(format!("malformed index: {}", e)));
                Vec::new()
            }
        },
        Err(e) => {
            warn!(error = %e, "Curriculum index unavailable, no curricula listed");
            issues.push(CatalogIssue::IndexUnavailable(e.to_string()));
            Vec::new()
        }
    };
    debug!(files = files.len(), "Curriculum index read");

    let mut entries: Vec<CatalogEntry> = Vec::with_capacity(files.len());
    for file in &files {
        let skipped = match load_entry(source, file).await {
            Ok(entry) if entries.iter().any(|e| e.id == entry.id) => {
                Some(format!("duplicate id {}", entry.id))
            }
            Ok(entry) => {
                debug!(file = %file, code = %entry.code, "Curriculum added");
                entries.push(entry);
                None
            }
            Err(reason) => Some(reason),
        };
        if let Some(reason) = skipped {
            warn!(file = %file, reason = %reason, "Skipping curriculum");
            issues.push(CatalogIssue::ItemSkipped {
                file: file.clone(),
                reason,
            });
        }
    }

    entries.sort_by(|a, b| cmp_locale(&a.code, &b.code));
    Catalog::new(entries, issues)
}

async fn load_entry(source: &dyn DocumentSource, file: &str) -> Result<CatalogEntry, String> {
    let raw = source
        .fetch_json(&document_path(file))
        .await
        .map_err(|e| e.to_string())?;
    CatalogEntry::from_document(file, &CurriculumDocument::from_value(raw))
        .ok_or_else(|| "missing info.codigo or info.nombre".to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// The guarded value is a plain Option, valid even if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::api::{DirectorySource, FetchError};
    use crate::custom::CUSTOM_CURRICULUM_KEY;
    use crate::storage::{KeyValueStore, MemoryStore};

    /// Serves documents from a map, yielding once per fetch so concurrent
    /// callers interleave.
    #[derive(Default)]
    struct MockSource {
        documents: HashMap<String, Value>,
        index_fetches: AtomicUsize,
        fetches: AtomicUsize,
        panic_on: Option<String>,
    }

    impl MockSource {
        fn with(mut self, path: &str, value: Value) -> Self {
            self.documents.insert(path.to_string(), value);
            self
        }

        fn with_index(self, files: &[&str]) -> Self {
            self.with(INDEX_PATH, json!({ "files": files }))
        }

        fn with_curriculum(self, file: &str, code: &str, name: &str) -> Self {
            self.with(
                &document_path(file),
                json!({
                    "info": { "codigo": code, "nombre": name },
                    "malla": { "n1": [[name, code, []]] }
                }),
            )
        }
    }

    impl DocumentSource for MockSource {
        fn fetch_json<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
            async move {
                tokio::task::yield_now().await;
                self.fetches.fetch_add(1, Ordering::SeqCst);
                if path == INDEX_PATH {
                    self.index_fetches.fetch_add(1, Ordering::SeqCst);
                }
                if self.panic_on.as_deref() == Some(path) {
                    panic!("source exploded on {}", path);
                }
                self.documents
                    .get(path)
                    .cloned()
                    .ok_or_else(|| FetchError::NotFound(path.to_string()))
            }
            .boxed()
        }
    }

    fn loader_for(source: Arc<MockSource>) -> (CatalogLoader, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let loader = CatalogLoader::new(source, CustomCurriculum::new(store.clone()));
        (loader, store)
    }

    fn codes(snapshot: &CatalogSnapshot) -> Vec<&str> {
        snapshot.data.entries().iter().map(|e| e.code.as_str()).collect()
    }

    // -------------------------------------------------------------------------
    // Discovery
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_catalog_sorted_by_code() {
        let source = MockSource::default()
            .with_index(&["quimica.json", "civil.json", "ejecucion.json"])
            .with_curriculum("quimica.json", "QCA101", "Química")
            .with_curriculum("civil.json", "ICT100", "Civil Informática")
            .with_curriculum("ejecucion.json", "ICT050", "Ejecución Informática");
        let (loader, _) = loader_for(Arc::new(source));

        let snapshot = loader.load_catalog().await;
        assert_eq!(codes(&snapshot), vec!["ICT050", "ICT100", "QCA101"]);
        assert!(snapshot.data.issues().is_empty());

        let first = &snapshot.data.entries()[0];
        assert_eq!(first.id, "ejecucion");
        assert_eq!(first.source_ref, "ejecucion.json");
        assert_eq!(first.department, "N/A");
    }

    #[tokio::test]
    async fn test_malformed_and_missing_items_are_skipped() {
        let source = MockSource::default()
            .with_index(&["ok.json", "no-name.json", "gone.json"])
            .with_curriculum("ok.json", "ICT100", "Civil")
            .with(&document_path("no-name.json"), json!({ "info": { "codigo": "X1" } }));
        let (loader, _) = loader_for(Arc::new(source));

        let snapshot = loader.load_catalog().await;
        assert_eq!(codes(&snapshot), vec!["ICT100"]);

        let skipped: Vec<&str> = snapshot
            .data
            .issues()
            .iter()
            .filter_map(|issue| match issue {
                CatalogIssue::ItemSkipped { file, .. } => Some(file.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped, vec!["no-name.json", "gone.json"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let source = MockSource::default()
            .with_index(&["civil.json", "civil.json"])
            .with_curriculum("civil.json", "ICT100", "Civil");
        let (loader, _) = loader_for(Arc::new(source));

        let snapshot = loader.load_catalog().await;
        assert_eq!(snapshot.data.len(), 1);
        assert_eq!(snapshot.data.issues().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_index_degrades_to_empty() {
        let (loader, _) = loader_for(Arc::new(MockSource::default()));
        let snapshot = loader.load_catalog().await;
        assert!(snapshot.data.is_empty());
        assert!(matches!(
            snapshot.data.issues(),
            [CatalogIssue::IndexUnavailable(_)]
        ));
    }

    #[tokio::test]
    async fn test_malformed_index_degrades_to_empty() {
        let source = MockSource::default().with(INDEX_PATH, json!({ "files": "civil.json" }));
        let source = Arc::new(source);
        let (loader, _) = loader_for(source.clone());
        let snapshot = loader.load_catalog().await;
        assert!(snapshot.data.is_empty());
        // Only the index was fetched
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unexpected_failure_resets_catalog() {
        let source = MockSource::default()
            .with_index(&["civil.json"])
            .with_curriculum("civil.json", "ICT100", "Civil");
        let (loader, _) = loader_for(Arc::new(source));
        assert_eq!(loader.load_catalog().await.data.len(), 1);

        // Swap in a source that blows up mid-load
        let exploding = MockSource {
            panic_on: Some(document_path("civil.json")),
            ..MockSource::default()
        }
        .with_index(&["civil.json"]);
        let loader = CatalogLoader {
            source: Arc::new(exploding),
            ..loader
        };

        let snapshot = loader.load_catalog().await;
        assert!(snapshot.data.is_empty());
        match snapshot.data.issues() {
            [CatalogIssue::Aborted(reason)] => assert!(reason.contains("source exploded")),
            other => panic!("unexpected issues {other:?}"),
        }
        assert!(loader.catalog().unwrap().data.is_empty());
        // A later load starts fresh
        assert!(lock(&loader.in_flight).is_none());
    }

    // -------------------------------------------------------------------------
    // Single-flight
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_concurrent_loads_share_one_discovery() {
        let source = Arc::new(
            MockSource::default()
                .with_index(&["civil.json", "quimica.json"])
                .with_curriculum("civil.json", "ICT100", "Civil")
                .with_curriculum("quimica.json", "QCA101", "Química"),
        );
        let (loader, _) = loader_for(source.clone());

        let (a, b) = tokio::join!(loader.load_catalog(), loader.load_catalog());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);

        // Once finished, the next call loads again
        loader.load_catalog().await;
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_catalog_or_load_reuses_fresh_snapshot() {
        let source = Arc::new(MockSource::default().with_index(&[]));
        let (loader, _) = loader_for(source.clone());
        assert!(loader.catalog().is_none());

        let first = loader.catalog_or_load().await;
        let second = loader.catalog_or_load().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.index_fetches.load(Ordering::SeqCst), 1);
    }

    // -------------------------------------------------------------------------
    // Lookups and bodies
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_title_and_info_lookups() {
        let source = MockSource::default()
            .with_index(&["civil.json"])
            .with(
                &document_path("civil.json"),
                json!({ "info": { "codigo": "ICT100", "nombre": "Civil", "departamento": "DIINF" } }),
            );
        let (loader, _) = loader_for(Arc::new(source));

        // Nothing loaded yet
        assert_eq!(loader.get_title("civil"), "");
        assert_eq!(loader.get_info("civil"), None);

        loader.load_catalog().await;
        assert_eq!(loader.get_title("civil"), "Civil");
        assert_eq!(
            loader.get_info("civil"),
            Some(CurriculumInfo {
                code: "ICT100".to_string(),
                name: "Civil".to_string(),
                department: "DIINF".to_string(),
            })
        );
        assert_eq!(loader.get_title("unknown"), "");
        assert_eq!(loader.get_info("unknown"), None);
    }

    #[tokio::test]
    async fn test_load_body_both_shapes() {
        let source = MockSource::default()
            .with_curriculum("civil.json", "ICT100", "Civil")
            .with(&document_path("bare.json"), json!({ "n1": [["Física", "10102", []]] }));
        let (loader, _) = loader_for(Arc::new(source));

        assert_eq!(
            loader.load_curriculum_body("civil").await,
            Some(json!({ "n1": [["Civil", "ICT100", []]] }))
        );
        assert_eq!(
            loader.load_curriculum_body("bare").await,
            Some(json!({ "n1": [["Física", "10102", []]] }))
        );
        assert_eq!(loader.load_curriculum_body("missing").await, None);
        assert_eq!(loader.load_curriculum_body("").await, None);
    }

    #[tokio::test]
    async fn test_load_body_stays_inside_data_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("public");
        std::fs::create_dir_all(root.join("mallas")).unwrap();
        std::fs::write(dir.path().join("secret.json"), r#"{"token":"x"}"#).unwrap();
        std::fs::write(root.join("mallas/civil.json"), r#"{"n1":[]}"#).unwrap();

        let store = Arc::new(MemoryStore::new());
        let loader = CatalogLoader::new(
            Arc::new(DirectorySource::new(&root)),
            CustomCurriculum::new(store),
        );

        assert_eq!(loader.load_curriculum_body("civil").await, Some(json!({ "n1": [] })));
        assert_eq!(loader.load_curriculum_body("../../secret").await, None);
        assert_eq!(loader.load_curriculum_body("..\\..\\secret").await, None);
    }

    #[tokio::test]
    async fn test_custom_body_comes_from_store() {
        let source = Arc::new(MockSource::default());
        let (loader, store) = loader_for(source.clone());

        assert_eq!(
            loader.load_curriculum_body("personalizado").await,
            Some(CustomCurriculum::default_body())
        );

        store
            .set(CUSTOM_CURRICULUM_KEY, r#"{"n1":[["Mi ramo","M1",[]]]}"#)
            .unwrap();
        assert_eq!(
            loader.load_curriculum_body("personalizado").await,
            Some(json!({ "n1": [["Mi ramo", "M1", []]] }))
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }
}
