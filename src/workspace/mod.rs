//! The workspace coordinator (§4.4): owns the authoritative in-memory state,
//! mediates edits, and serialises them behind a single mutex (§5).

pub mod config;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use futures::future::join_all;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::blueprint_update::{BlueprintUpdater, DetailedChange, LocatedChange};
use crate::cache::{CacheKey, ParseCache, ParseResult};
use crate::elem_id::ElemId;
use crate::element::Element;
use crate::error::{MergeError, Severity, ValidationError, WorkspaceError, WorkspaceErrorCause, WorkspaceInitError, WorkspaceIoError};
use crate::file::FileSystem;
use crate::merge::merge_elements;
use crate::parser::BlueprintParser;
use crate::resolver::{resolve_references, ElementGraph};
use crate::source::{union_source_maps, ParseError, SourceMap};
use crate::validator::validate;

/// A single blueprint as parsed and held in memory (§4.4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedBlueprint {
    pub filename: String,
    pub buffer: String,
    pub elements: Vec<Element>,
    pub source_map: SourceMap,
    pub errors: Vec<ParseError>,
}

/// The error triad held alongside the merged elements (§4.4.1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkspaceErrors {
    pub parse: Vec<ParseError>,
    pub merge: Vec<MergeError>,
    pub validation: Vec<ValidationError>,
}

/// An immutable snapshot of the workspace's derived state; replaced
/// wholesale on every rebuild (§3.4).
#[derive(Clone, Debug, PartialEq)]
pub struct WorkspaceState {
    pub parsed_blueprints: BTreeMap<String, ParsedBlueprint>,
    pub source_map: SourceMap,
    pub elements: ElementGraph,
    pub errors: WorkspaceErrors,
}

/// Rebuild the derived state from scratch (§4.4.3). `parsed_blueprints` must
/// be an (already sorted) `BTreeMap` so parse-error order mirrors blueprint
/// iteration order deterministically (§5 "Ordering guarantees").
#[must_use]
pub fn create_workspace_state(parsed_blueprints: BTreeMap<String, ParsedBlueprint>) -> WorkspaceState {
    let mut source_map = SourceMap::new();
    let mut elements = Vec::new();
    let mut parse_errors = Vec::new();
    for blueprint in parsed_blueprints.values() {
        union_source_maps(&mut source_map, &blueprint.source_map);
        elements.extend(blueprint.elements.iter().cloned());
        parse_errors.extend(blueprint.errors.iter().cloned());
    }
    elements.push(config::salto_config_type());
    elements.push(config::salto_text_type());

    let outcome = merge_elements(elements);
    let resolved = resolve_references(outcome.merged);
    let validation_errors = validate(&resolved);

    tracing::info!(
        blueprints = parsed_blueprints.len(),
        merge_errors = outcome.errors.len(),
        validation_errors = validation_errors.len(),
        "rebuilt workspace state"
    );

    WorkspaceState {
        parsed_blueprints,
        source_map,
        elements: resolved,
        errors: WorkspaceErrors {
            parse: parse_errors,
            merge: outcome.errors,
            validation: validation_errors,
        },
    }
}

struct Inner {
    state: WorkspaceState,
    dirty_blueprints: BTreeSet<String>,
}

/// Owns the authoritative state for one workspace root. Operations are
/// serialised through an internal mutex; callers must not issue an
/// overlapping `set`/`remove`/`update`/`flush` before the previous one
/// returns (§5) — the mutex only prevents torn state, not undefined
/// interleaving semantics the contract disclaims.
pub struct Workspace {
    base_dir: Utf8PathBuf,
    local_storage_dir: Utf8PathBuf,
    fs: Arc<dyn FileSystem>,
    cache: Arc<dyn ParseCache>,
    parser: Arc<dyn BlueprintParser>,
    updater: Arc<dyn BlueprintUpdater>,
    inner: Mutex<Inner>,
}

fn config_path(base_dir: &Utf8Path) -> Utf8PathBuf {
    base_dir.join("salto.config.bp")
}

fn local_storage_path(base_dir: &Utf8Path) -> Utf8PathBuf {
    base_dir.join(".salto")
}

fn state_file_path(local_storage_dir: &Utf8Path) -> Utf8PathBuf {
    local_storage_dir.join("state.bpc")
}

fn credentials_dir(local_storage_dir: &Utf8Path) -> Utf8PathBuf {
    local_storage_dir.join("credentials")
}

async fn find_workspace_root(
    fs: &dyn FileSystem,
    base_dir: &Utf8Path,
) -> Result<Option<Utf8PathBuf>, WorkspaceIoError> {
    let mut current = Some(base_dir.to_path_buf());
    while let Some(dir) = current {
        if fs.exists(&config_path(&dir)).await? {
            return Ok(Some(dir));
        }
        current = dir.parent().map(Utf8Path::to_path_buf);
    }
    Ok(None)
}

/// A blueprint whose sole element is a single-instance config object of an
/// adapter is written to `credentials/<adapter>.bp` rather than `base_dir`
/// (§4.4.2 `flush`).
fn config_instance_adapter(elements: &[Element]) -> Option<String> {
    match elements {
        [Element::Instance(instance)] if instance.elem_id.is_config() => {
            Some(instance.elem_id.adapter().to_string())
        }
        _ => None,
    }
}

impl Workspace {
    /// Bootstrap a new workspace root (§4.4.2 `init`).
    ///
    /// # Errors
    ///
    /// Returns `ExistingWorkspace` if a workspace root is discoverable at or
    /// above `base_dir`, or `NotAnEmptyWorkspace` if the config path, local
    /// storage directory, or state file already exist.
    pub async fn init(
        fs: &dyn FileSystem,
        base_dir: &Utf8Path,
        name: Option<&str>,
    ) -> Result<(), WorkspaceInitError> {
        if find_workspace_root(fs, base_dir).await?.is_some() {
            return Err(WorkspaceInitError::ExistingWorkspace {
                base_dir: base_dir.to_path_buf(),
            });
        }

        let config = config_path(base_dir);
        let local_storage = local_storage_path(base_dir);
        let state_file = state_file_path(&local_storage);
        for (label, path) in [
            ("config", &config),
            ("local storage", &local_storage),
            ("state file", &state_file),
        ] {
            if fs.exists(path).await? {
                return Err(WorkspaceInitError::NotAnEmptyWorkspace {
                    base_dir: base_dir.to_path_buf(),
                    reason: format!("{label} already exists at '{path}'"),
                });
            }
        }

        fs.mkdirp(&credentials_dir(&local_storage)).await?;
        let workspace_name = name
            .map(str::to_owned)
            .unwrap_or_else(|| base_dir.file_name().unwrap_or("workspace").to_owned());
        let uid = Uuid::new_v4();
        fs.write_text_file(&config, &config::render(&workspace_name, &uid)).await?;
        tracing::info!(%base_dir, name = %workspace_name, "initialised workspace");
        Ok(())
    }

    /// Gather and parse blueprints from `base_dir`, the credentials
    /// sub-directory, and any explicit additional paths, then build the
    /// initial state (§4.4.2 `load`, §4.4.3).
    pub async fn load(
        fs: Arc<dyn FileSystem>,
        parser: Arc<dyn BlueprintParser>,
        cache: Arc<dyn ParseCache>,
        updater: Arc<dyn BlueprintUpdater>,
        base_dir: Utf8PathBuf,
        additional_paths: Vec<Utf8PathBuf>,
        use_cache: bool,
    ) -> Result<Self, WorkspaceIoError> {
        let local_storage_dir = local_storage_path(&base_dir);

        let mut paths: Vec<Utf8PathBuf> = fs
            .walk(&base_dir)
            .await?
            .into_iter()
            .map(|entry| entry.full_path)
            .filter(|path| path.extension() == Some("bp"))
            .collect();

        let credentials = credentials_dir(&local_storage_dir);
        if fs.exists(&credentials).await? {
            paths.extend(
                fs.walk(&credentials)
                    .await?
                    .into_iter()
                    .map(|entry| entry.full_path)
                    .filter(|path| path.extension() == Some("bp")),
            );
        }
        paths.extend(additional_paths);
        paths.sort();
        paths.dedup();

        let reads = join_all(paths.into_iter().map(|path| {
            let fs = Arc::clone(&fs);
            let parser = Arc::clone(&parser);
            let cache = Arc::clone(&cache);
            async move { read_and_parse(fs.as_ref(), parser.as_ref(), cache.as_ref(), &path, use_cache).await }
        }))
        .await;

        let mut parsed_blueprints = BTreeMap::new();
        for blueprint in reads {
            let blueprint = blueprint?;
            parsed_blueprints.insert(blueprint.filename.clone(), blueprint);
        }

        let state = create_workspace_state(parsed_blueprints);
        Ok(Self {
            base_dir,
            local_storage_dir,
            fs,
            cache,
            parser,
            updater,
            inner: Mutex::new(Inner { state, dirty_blueprints: BTreeSet::new() }),
        })
    }

    /// Parse and overwrite `parsed_blueprints` entries by filename, mark
    /// them dirty, and rebuild state (§4.4.2 `set_blueprints`).
    pub async fn set_blueprints(&self, blueprints: Vec<(String, String)>) {
        let mut inner = self.inner.lock().await;
        self.apply_blueprints(&mut inner, blueprints);
    }

    /// The body of `set_blueprints`, taking an already-locked `Inner` so
    /// callers that must perform further work under the same lock (e.g.
    /// `update_blueprints`) don't release and re-acquire the mutex between
    /// their read of `state` and this write, which would let a concurrent
    /// `flush`/`remove_blueprints`/`set_blueprints` interleave mid-operation
    /// (§5: an internal mutex "MUST NOT silently interleave").
    fn apply_blueprints(&self, inner: &mut Inner, blueprints: Vec<(String, String)>) {
        let mut parsed_blueprints = inner.state.parsed_blueprints.clone();
        for (filename, buffer) in blueprints {
            let result = self.parser.parse(&buffer, &filename);
            parsed_blueprints.insert(
                filename.clone(),
                ParsedBlueprint {
                    filename: filename.clone(),
                    buffer,
                    elements: result.elements,
                    source_map: result.source_map,
                    errors: result.errors,
                },
            );
            inner.dirty_blueprints.insert(filename);
        }
        inner.state = create_workspace_state(parsed_blueprints);
    }

    /// Drop the named blueprints, mark them dirty, and rebuild state
    /// (§4.4.2 `remove_blueprints`).
    pub async fn remove_blueprints(&self, names: &[String]) {
        let mut inner = self.inner.lock().await;
        let mut parsed_blueprints = inner.state.parsed_blueprints.clone();
        for name in names {
            parsed_blueprints.remove(name);
            inner.dirty_blueprints.insert(name.clone());
        }
        inner.state = create_workspace_state(parsed_blueprints);
    }

    /// Locate each change in the current source map, splice it into its
    /// owning buffer, and apply the results in place. Changes whose buffer
    /// update fails are logged and skipped (§4.4.2). Holds the mutex for
    /// the whole operation — reading the source map, splicing buffers, and
    /// rebuilding state never releases the lock in between, so a concurrent
    /// `flush`/`remove_blueprints`/`set_blueprints` cannot interleave with
    /// this one (§5).
    pub async fn update_blueprints(&self, changes: Vec<DetailedChange>) {
        let mut inner = self.inner.lock().await;
        let mut by_filename: BTreeMap<String, Vec<LocatedChange>> = BTreeMap::new();
        for change in &changes {
            for located in self.updater.change_locations(change, &inner.state.source_map) {
                by_filename.entry(located.location.filename.clone()).or_default().push(located);
            }
        }

        let mut new_buffers = Vec::new();
        for (filename, located_changes) in by_filename {
            let Some(blueprint) = inner.state.parsed_blueprints.get(&filename) else {
                continue;
            };
            match self.updater.update_blueprint_data(&blueprint.buffer, &located_changes) {
                Ok(buffer) => new_buffers.push((filename, buffer)),
                Err(error) => {
                    tracing::warn!(%filename, %error, "skipping change: buffer update failed");
                }
            }
        }
        self.apply_blueprints(&mut inner, new_buffers);
    }

    /// Write every dirty blueprint's buffer (or delete it, if removed),
    /// update the parse cache, and clear `dirty_blueprints` (§4.4.2 `flush`).
    ///
    /// # Errors
    ///
    /// Returns the first I/O failure encountered; blueprints already written
    /// before the failure stay written (§5 "Cancellation").
    pub async fn flush(&self) -> Result<(), WorkspaceIoError> {
        let mut inner = self.inner.lock().await;
        let dirty: Vec<String> = inner.dirty_blueprints.iter().cloned().collect();
        let credentials = credentials_dir(&self.local_storage_dir);

        let results = join_all(dirty.iter().map(|filename| {
            let blueprint = inner.state.parsed_blueprints.get(filename).cloned();
            let filename = filename.clone();
            let fs = Arc::clone(&self.fs);
            let cache = Arc::clone(&self.cache);
            let base_dir = self.base_dir.clone();
            let credentials = credentials.clone();
            async move {
                flush_one(fs.as_ref(), cache.as_ref(), &base_dir, &credentials, &filename, blueprint).await
            }
        }))
        .await;

        for result in results {
            result?;
        }
        inner.dirty_blueprints.clear();
        tracing::info!(flushed = dirty.len(), "flushed workspace state");
        Ok(())
    }

    /// Project every parse/merge/validation error to its unified shape,
    /// resolving source fragments from the owning buffers (§4.4.2, §7).
    pub async fn get_workspace_errors(&self) -> Vec<WorkspaceError> {
        let inner = self.inner.lock().await;
        let state = &inner.state;
        let mut out = Vec::new();

        for error in &state.errors.parse {
            let fragment = state
                .parsed_blueprints
                .get(&error.subject.filename)
                .and_then(|blueprint| error.subject.extract(&blueprint.buffer))
                .map(str::to_owned);
            out.push(WorkspaceError {
                source_fragments: fragment.into_iter().collect(),
                error: error.detail.clone(),
                severity: Severity::Error,
                cause: WorkspaceErrorCause::Parse(error.clone()),
            });
        }

        for error in &state.errors.merge {
            out.push(project_error(
                state,
                error.elem_id(),
                error.to_string(),
                Severity::Error,
                WorkspaceErrorCause::Merge(error.clone()),
            ));
        }

        for error in &state.errors.validation {
            out.push(project_error(
                state,
                error.elem_id(),
                error.to_string(),
                error.severity(),
                WorkspaceErrorCause::Validation(error.clone()),
            ));
        }

        out
    }

    #[must_use]
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }
}

fn project_error(
    state: &WorkspaceState,
    elem_id: &ElemId,
    message: String,
    severity: Severity,
    cause: WorkspaceErrorCause,
) -> WorkspaceError {
    let source_fragments = state
        .source_map
        .get(&elem_id.full_name())
        .map(|ranges| {
            ranges
                .iter()
                .filter_map(|range| {
                    state
                        .parsed_blueprints
                        .get(&range.filename)
                        .and_then(|blueprint| range.extract(&blueprint.buffer))
                        .map(str::to_owned)
                })
                .collect()
        })
        .unwrap_or_default();
    WorkspaceError { source_fragments, error: message, severity, cause }
}

async fn read_and_parse(
    fs: &dyn FileSystem,
    parser: &dyn BlueprintParser,
    cache: &dyn ParseCache,
    path: &Utf8Path,
    use_cache: bool,
) -> Result<ParsedBlueprint, WorkspaceIoError> {
    let buffer = fs.read_text_file(path).await?;
    let filename = path.to_string();
    let last_modified = fs.stat(path).await?.and_then(|stat| stat.modified);
    let key = CacheKey { filename: filename.clone(), last_modified };

    let result = if use_cache {
        match cache.get(&key).await {
            Some(cached) => cached,
            None => {
                let fresh = parser.parse(&buffer, &filename);
                cache.put(key, fresh.clone()).await;
                fresh
            }
        }
    } else {
        parser.parse(&buffer, &filename)
    };

    Ok(ParsedBlueprint {
        filename,
        buffer,
        elements: result.elements,
        source_map: result.source_map,
        errors: result.errors,
    })
}

async fn flush_one(
    fs: &dyn FileSystem,
    cache: &dyn ParseCache,
    base_dir: &Utf8Path,
    credentials_dir: &Utf8Path,
    filename: &str,
    blueprint: Option<ParsedBlueprint>,
) -> Result<(), WorkspaceIoError> {
    match blueprint {
        None => fs.rm(&base_dir.join(filename)).await,
        Some(blueprint) => {
            let target = config_instance_adapter(&blueprint.elements)
                .map(|adapter| credentials_dir.join(format!("{adapter}.bp")))
                .unwrap_or_else(|| base_dir.join(filename));
            if let Some(parent) = target.parent() {
                fs.mkdirp(parent).await?;
            }
            fs.write_text_file(&target, &blueprint.buffer).await?;
            let last_modified = fs.stat(&target).await?.and_then(|stat| stat.modified);
            cache
                .put(
                    CacheKey { filename: filename.to_string(), last_modified },
                    ParseResult {
                        elements: blueprint.elements,
                        source_map: blueprint.source_map,
                        errors: blueprint.errors,
                    },
                )
                .await;
            Ok(())
        }
    }
}
