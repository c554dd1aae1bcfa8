//! mallas - browse published degree curricula and simulate approved courses
//! from the terminal.
//!
//! Simulation state is kept in a local file-backed store, shared with the
//! custom curriculum and the last selected curriculum.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mallas_core::api::{DirectorySource, DocumentSource, HttpSource};
use mallas_core::utils::format_size;
use mallas_core::{
    CatalogIssue, CatalogLoader, Config, CurriculumId, CustomCurriculum, FileStore,
    KeyValueStore, LastSelection, PersistOutcome, SimulationCache, SimulationUpdate,
    SourceLocation,
};

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "mallas.log";

const USAGE: &str = "\
Usage: mallas [--dir <path> | --url <base>] <command>

Commands:
  list                         List available curricula
  show <id>                    Print a curriculum body as JSON
  status <id>                  Show simulated approvals for a curriculum
  approve <id> <course>...     Mark courses as approved
  unapprove <id> <course>...   Unmark courses
  simulate <id> on|off         Toggle simulation mode
  clear [id]                   Forget simulation state (all if no id)
  select [id]                  Remember or show the selected curriculum
  custom set <file>            Save a custom curriculum body from a JSON file
  custom clear                 Remove the custom curriculum
  debug                        Dump cache and storage state";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Remove `--flag value` from `args`, returning the value.
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn build_source(config: &Config) -> Result<Arc<dyn DocumentSource>> {
    Ok(match config.source() {
        SourceLocation::Http(url) => {
            info!(base_url = %url, "Reading curricula over HTTP");
            Arc::new(HttpSource::new(url)?)
        }
        SourceLocation::Directory(dir) => {
            info!(dir = %dir.display(), "Reading curricula from directory");
            Arc::new(DirectorySource::new(dir))
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let dir = take_flag(&mut args, "--dir")?;
    let url = take_flag(&mut args, "--url")?;

    let config = Config::load()?.apply_env().with_overrides(url, dir);
    let cache_dir = config.cache_dir()?;
    let _guard = init_tracing(&cache_dir);
    info!("mallas starting");

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open_with_quota(config.store_path()?, config.quota())
            .context("Failed to open local storage")?,
    );
    let app = App {
        loader: CatalogLoader::new(build_source(&config)?, CustomCurriculum::new(store.clone())),
        cache: SimulationCache::new(store.clone()),
        selection: LastSelection::new(store.clone()),
        custom: CustomCurriculum::new(store),
    };

    let Some((command, rest)) = args.split_first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    app.run(command, rest).await
}

/// The composing layer: the loader, the cache and the small stored records.
struct App {
    loader: CatalogLoader,
    cache: SimulationCache,
    selection: LastSelection,
    custom: CustomCurriculum,
}

impl App {
    async fn run(mut self, command: &str, rest: &[String]) -> Result<()> {
        match (command, rest) {
            ("list", []) => self.list().await,
            ("show", [id]) => self.show(id).await,
            ("status", [id]) => self.status(id).await,
            ("approve", [id, courses @ ..]) if !courses.is_empty() => {
                self.set_approved(id, courses, true).await
            }
            ("unapprove", [id, courses @ ..]) if !courses.is_empty() => {
                self.set_approved(id, courses, false).await
            }
            ("simulate", [id, mode]) => {
                let on = match mode.as_str() {
                    "on" => true,
                    "off" => false,
                    other => bail!("expected on or off, got {}", other),
                };
                let outcome = self.cache_update(id, SimulationUpdate::new().simulating(on));
                report_outcome(&outcome);
                Ok(())
            }
            ("clear", []) => {
                let removed = self.cache.clear_state(None);
                println!("Cleared {} stored simulation states", removed);
                Ok(())
            }
            ("clear", [id]) => {
                self.cache.clear_state(Some(id.as_str()));
                println!("Cleared simulation state for {}", id);
                Ok(())
            }
            ("select", []) => {
                match self.selection.get() {
                    Some(id) => println!("{}", id),
                    None => println!("No curriculum selected"),
                }
                Ok(())
            }
            ("select", [id]) => {
                let id = CurriculumId::parse(id)?;
                self.selection.set(&id);
                println!("Selected {}", id);
                Ok(())
            }
            ("custom", [action, path]) if action == "set" => self.save_custom(Path::new(path)),
            ("custom", [action]) if action == "clear" => {
                self.custom.clear();
                println!("Custom curriculum removed");
                Ok(())
            }
            ("debug", []) => {
                if let Some(id) = self.selection.get() {
                    self.cache.hydrate_from_store(id.as_str());
                }
                let snapshot = self.cache.debug_snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                eprintln!("Storage used: {}", format_size(snapshot.used_size));
                Ok(())
            }
            _ => {
                eprintln!("{}", USAGE);
                bail!("unknown command: {}", command)
            }
        }
    }

    async fn list(&self) -> Result<()> {
        let snapshot = self.loader.load_catalog().await;
        let catalog = &snapshot.data;

        for entry in catalog.entries() {
            println!("{:<24} {:<50} {}", entry.id, entry.label(), entry.department);
        }
        for issue in catalog.issues() {
            match issue {
                CatalogIssue::IndexUnavailable(reason) => eprintln!("Index unavailable: {}", reason),
                CatalogIssue::ItemSkipped { file, reason } => eprintln!("Skipped {}: {}", file, reason),
                CatalogIssue::Aborted(reason) => eprintln!("Catalog load failed: {}", reason),
            }
        }
        eprintln!("{} curricula, loaded {}", catalog.len(), snapshot.age_display());
        Ok(())
    }

    async fn show(&self, id: &str) -> Result<()> {
        let Some(body) = self.loader.load_curriculum_body(id).await else {
            bail!("could not load curriculum {}", id);
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }

    async fn status(&mut self, id: &str) -> Result<()> {
        self.loader.catalog_or_load().await;
        let title = self.loader.get_title(id);
        let state = self.cache.hydrate_from_store(id);

        if title.is_empty() {
            println!("{}", id);
        } else {
            println!("{} ({})", title, id);
        }
        println!("Simulating: {}", if state.is_simulating { "yes" } else { "no" });
        println!("Approved courses: {}", state.approved_courses.len());
        for course in &state.approved_courses {
            println!("  {}", course);
        }
        Ok(())
    }

    async fn set_approved(&mut self, id: &str, courses: &[String], approve: bool) -> Result<()> {
        let mut approved = self.cache.hydrate_from_store(id).approved_courses;
        for course in courses {
            if approve {
                approved.insert(course.clone());
            } else {
                approved.remove(course);
            }
        }
        let count = approved.len();
        let outcome = self
            .cache
            .update_state(id, SimulationUpdate::new().approved_courses(approved));
        report_outcome(&outcome);
        println!("{} approved courses in {}", count, id);
        Ok(())
    }

    /// Hydrate first so a fresh process merges over what was saved before.
    fn cache_update(&mut self, id: &str, update: SimulationUpdate) -> PersistOutcome {
        self.cache.hydrate_from_store(id);
        self.cache.update_state(id, update)
    }

    fn save_custom(&self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let body: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        self.custom.save(&body)?;
        println!("Custom curriculum saved from {}", path.display());
        Ok(())
    }
}

fn report_outcome(outcome: &PersistOutcome) {
    match outcome {
        PersistOutcome::Persisted | PersistOutcome::Skipped => {}
        PersistOutcome::PersistedAfterEviction { evicted } => {
            eprintln!("Storage was full; removed {} older simulation states", evicted.len());
        }
        PersistOutcome::StoreUnavailable => {
            eprintln!("Storage unavailable; change kept for this session only");
        }
        PersistOutcome::Failed(e) | PersistOutcome::RetryFailed { error: e, .. } => {
            eprintln!("Could not save simulation state: {}", e);
        }
    }
}
