//! Run orchestration: scan → parse (parallel) → build → analyze (parallel).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::analyzer::{AnalyzerBox, GraphAnalyzer};
use crate::cache::{
    CacheEntry, CacheError, CacheKey, CacheStore, CachedValue, DiskCache, Fingerprint,
};
use crate::config::{loader::resolve_against, Config};
use crate::context::AnalysisContext;
use crate::graph::{GraphBuilder, ParsedFile};
use crate::parser::{decode_source, ModuleParser, ParseError, ParseOutcome, ParserBox};
use crate::scanner::{PackageRoot, ScanError, Scanner, SourceFile};
use crate::types::{sort_diagnostics, AnalysisReport, Diagnostic, RunSummary};
use crate::utils::paths;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RunError {
    /// The workspace root does not exist or is not a directory.
    #[error("workspace root {} does not exist or is not a directory", .0.display())]
    #[diagnostic(code(archgraph::root_not_found), help("pass an existing directory"))]
    RootNotFound(PathBuf),

    /// Scanning failed.
    #[error(transparent)]
    #[diagnostic(
        code(archgraph::scan),
        help("check analyzer.packages; every package root needs a package.json")
    )]
    Scan(#[from] ScanError),

    /// The cache directory is unusable and `cache.strict` is set.
    #[error("cache directory is unusable: {0}")]
    #[diagnostic(
        code(archgraph::cache),
        help("fix the directory, set cache.strict = false, or run with --no-cache")
    )]
    Cache(#[source] CacheError),

    /// The worker pool could not start.
    #[error("failed to start worker pool: {0}")]
    #[diagnostic(code(archgraph::pool))]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The run was cancelled between phases.
    #[error("run cancelled before the {phase} phase")]
    #[diagnostic(code(archgraph::cancelled))]
    Cancelled {
        /// Phase that did not start.
        phase: &'static str,
    },
}

/// Cooperative cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builder for configuring a [`Scheduler`].
#[derive(Default)]
pub struct SchedulerBuilder {
    root: Option<PathBuf>,
    config: Option<Config>,
    parsers: Vec<ParserBox>,
    analyzers: Vec<AnalyzerBox>,
    cache: Option<Arc<dyn CacheStore>>,
    cancel: CancelToken,
}

impl SchedulerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workspace root. Defaults to the config's `analyzer.root`.
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers a module parser.
    #[must_use]
    pub fn parser<P: ModuleParser + 'static>(mut self, parser: P) -> Self {
        self.parsers.push(Box::new(parser));
        self
    }

    /// Registers a boxed module parser.
    #[must_use]
    pub fn parser_box(mut self, parser: ParserBox) -> Self {
        self.parsers.push(parser);
        self
    }

    /// Registers a graph analyzer.
    #[must_use]
    pub fn analyzer<A: GraphAnalyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    /// Registers several boxed analyzers.
    #[must_use]
    pub fn analyzers(mut self, analyzers: impl IntoIterator<Item = AnalyzerBox>) -> Self {
        self.analyzers.extend(analyzers);
        self
    }

    /// Uses this store instead of the on-disk cache.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Builds the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::RootNotFound`] if the root is not a directory.
    pub fn build(self) -> Result<Scheduler, RunError> {
        let config = self.config.unwrap_or_default();
        let root = self.root.unwrap_or_else(|| {
            let base = config
                .origin()
                .and_then(Path::parent)
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            resolve_against(&base, &config.analyzer.root)
        });
        let root = match std::fs::canonicalize(&root) {
            Ok(canonical) if canonical.is_dir() => canonical,
            _ => return Err(RunError::RootNotFound(root)),
        };

        let mut by_extension = HashMap::new();
        for (i, parser) in self.parsers.iter().enumerate() {
            for ext in parser.extensions() {
                by_extension.entry(*ext).or_insert(i);
            }
        }

        Ok(Scheduler {
            root,
            config,
            parsers: self.parsers,
            by_extension,
            analyzers: self.analyzers,
            cache: self.cache,
            cancel: self.cancel,
        })
    }
}

/// Runs the analysis pipeline over one workspace.
///
/// Use [`Scheduler::builder()`] to construct an instance.
pub struct Scheduler {
    root: PathBuf,
    config: Config,
    parsers: Vec<ParserBox>,
    by_extension: HashMap<&'static str, usize>,
    analyzers: Vec<AnalyzerBox>,
    cache: Option<Arc<dyn CacheStore>>,
    cancel: CancelToken,
}

struct ParseTask {
    file: ParsedFile,
    key: Option<CacheKey>,
    hit: bool,
}

impl Scheduler {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered analyzers.
    #[must_use]
    pub fn analyzers(&self) -> &[AnalyzerBox] {
        &self.analyzers
    }

    /// Cancellation token for this scheduler.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs the full pipeline.
    ///
    /// Per-file and per-package problems become diagnostics; only the
    /// conditions in [`RunError`] abort.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] on a fatal condition or cancellation.
    pub fn run(&self) -> Result<AnalysisReport, RunError> {
        let started = Instant::now();
        info!(root = %self.root.display(), "starting analysis");

        self.checkpoint("scan")?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.analyzer.concurrency)
            .thread_name(|i| format!("archgraph-worker-{i}"))
            .build()?;

        let config_label = self.config_label();
        let scan = Scanner::new(&self.root, &self.config.analyzer)
            .extensions(self.by_extension.keys().copied())
            .config_label(config_label.clone())
            .scan()?;
        info!(
            files = scan.files.len(),
            packages = scan.packages.len(),
            "scanned workspace"
        );
        let cache = self.open_cache(&scan.packages)?;
        let cache = cache.as_deref();

        self.checkpoint("parse")?;
        let tasks: Vec<ParseTask> =
            pool.install(|| scan.files.par_iter().map(|f| self.parse(f, cache)).collect());
        let cache_hits = tasks.iter().filter(|t| t.hit).count();
        let cache_misses = tasks.len() - cache_hits;
        let mut live: HashSet<CacheKey> = tasks.iter().filter_map(|t| t.key.clone()).collect();
        debug!(hits = cache_hits, misses = cache_misses, "parsed files");

        self.checkpoint("build")?;
        let files = tasks.into_iter().map(|t| t.file).collect();
        let (graph, mut diagnostics) = GraphBuilder::new(&scan.packages, &self.config).build(files);
        diagnostics.extend(scan.diagnostics);
        info!(
            modules = graph.module_count(),
            edges = graph.edge_count(),
            "built import graph"
        );

        self.checkpoint("analyze")?;
        let ctx = AnalysisContext::new(&graph, &self.config).with_config_label(&config_label);
        let results: Vec<(Vec<Diagnostic>, Option<CacheKey>)> = pool.install(|| {
            self.analyzers
                .par_iter()
                .map(|a| self.analyze(a.as_ref(), &ctx, cache))
                .collect()
        });
        for (found, key) in results {
            diagnostics.extend(found);
            live.extend(key);
        }

        self.checkpoint("aggregate")?;
        let diagnostics = self.finalize(diagnostics);
        if let Some(store) = cache {
            if let Err(e) = store.prune(&live) {
                warn!(error = %e, "failed to prune cache");
            }
        }

        let mut summary = RunSummary {
            files_scanned: scan.files.len(),
            packages: scan.packages.len(),
            edges: graph.edge_count(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            cache_hits,
            cache_misses,
            ..RunSummary::default()
        };
        summary.count(&diagnostics);
        info!(
            diagnostics = diagnostics.len(),
            elapsed_ms = summary.elapsed_ms,
            "analysis complete"
        );
        Ok(AnalysisReport {
            diagnostics,
            summary,
        })
    }

    /// Severity overrides (respecting floors), category filter,
    /// minimum-severity filter, then the report sort.
    fn finalize(&self, mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        for d in &mut diagnostics {
            if let Some(severity) = self.config.category(d.category).severity {
                d.override_severity(severity);
            }
        }
        diagnostics.retain(|d| {
            self.config.category(d.category).enabled
                && d.severity >= self.config.analyzer.min_severity
        });
        sort_diagnostics(&mut diagnostics);
        diagnostics
    }

    fn checkpoint(&self, phase: &'static str) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            warn!(phase, "run cancelled");
            return Err(RunError::Cancelled { phase });
        }
        Ok(())
    }

    fn open_cache(
        &self,
        packages: &[PackageRoot],
    ) -> Result<Option<Arc<dyn CacheStore>>, RunError> {
        if !self.config.cache.enabled {
            return Ok(None);
        }
        if let Some(store) = &self.cache {
            return Ok(Some(Arc::clone(store)));
        }
        let dir = resolve_against(&self.root, &self.config.cache.dir);
        let opened = match self.package_rooted_at(&dir, packages) {
            Some(package) => Err(CacheError::SharedDirectory {
                path: dir.clone(),
                package,
            }),
            None => DiskCache::open(&dir),
        };
        match opened {
            Ok(cache) => Ok(Some(Arc::new(cache))),
            Err(e) if self.config.cache.strict => Err(RunError::Cache(e)),
            Err(e) => {
                warn!(error = %e, "cache directory unusable, continuing without cache");
                Ok(None)
            }
        }
    }

    /// Name of the package whose root is `dir`, if any.
    fn package_rooted_at(&self, dir: &Path, packages: &[PackageRoot]) -> Option<String> {
        let relative = match dir.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => std::fs::canonicalize(dir)
                .ok()?
                .strip_prefix(&self.root)
                .ok()?
                .to_path_buf(),
        };
        let relative = paths::normalize("", &relative.to_string_lossy().replace('\\', "/"))?;
        packages
            .iter()
            .find(|p| p.root == relative)
            .map(|p| p.name.clone())
    }

    fn config_label(&self) -> String {
        match self.config.origin() {
            Some(origin) => origin.strip_prefix(&self.root).map_or_else(
                |_| origin.display().to_string(),
                paths::to_slash,
            ),
            None => "archgraph.toml".to_string(),
        }
    }

    fn parser_for(&self, path: &str) -> Option<&dyn ModuleParser> {
        let ext = paths::extension(path)?;
        let i = *self.by_extension.get(ext)?;
        self.parsers.get(i).map(Box::as_ref)
    }

    /// Parses one file, consulting the cache first.
    fn parse(&self, file: &SourceFile, cache: Option<&dyn CacheStore>) -> ParseTask {
        let parsed = |content_hash: String, outcome| ParsedFile {
            path: file.path.clone(),
            package: file.package,
            content_hash,
            outcome,
        };

        let bytes = match std::fs::read(&file.absolute) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file.path, error = %e, "cannot read file");
                let outcome = ParseOutcome::Failed(ParseError::Unreadable {
                    message: e.to_string(),
                });
                return ParseTask {
                    file: parsed(String::new(), outcome),
                    key: None,
                    hit: false,
                };
            }
        };
        let decoded = decode_source(&bytes);
        let content: &[u8] = match &decoded {
            Ok(text) => text.as_bytes(),
            Err(_) => &bytes,
        };
        let content_hash = Fingerprint::new("content").field(content).finish().into_hex();

        let Some(parser) = self.parser_for(&file.path) else {
            let outcome = ParseOutcome::Failed(ParseError::Internal {
                message: "no parser registered for this extension".to_string(),
            });
            return ParseTask {
                file: parsed(content_hash, outcome),
                key: None,
                hit: false,
            };
        };

        let key = Fingerprint::new("parse")
            .field(parser.id())
            .field(parser.version())
            .field(paths::extension(&file.path).unwrap_or_default())
            .field(content)
            .finish();

        if let Some(store) = cache {
            if let Some(CacheEntry {
                value: CachedValue::Parse(outcome),
                ..
            }) = store.get(&key)
            {
                debug!(file = %file.path, "parse cache hit");
                return ParseTask {
                    file: parsed(content_hash, outcome),
                    key: Some(key),
                    hit: true,
                };
            }
        }

        let outcome = match decoded {
            Ok(text) => match parser.parse(Path::new(&file.path), &text) {
                Ok(module) => ParseOutcome::Parsed(module),
                Err(e) => ParseOutcome::Failed(e),
            },
            Err(e) => ParseOutcome::Failed(e),
        };
        if let Some(store) = cache {
            let entry = CacheEntry::new(key.clone(), CachedValue::Parse(outcome.clone()));
            if let Err(e) = store.put(entry) {
                warn!(file = %file.path, error = %e, "failed to write cache entry");
            }
        }
        ParseTask {
            file: parsed(content_hash, outcome),
            key: cache.map(|_| key),
            hit: false,
        }
    }

    /// Runs one analyzer, consulting the cache first.
    fn analyze(
        &self,
        analyzer: &dyn GraphAnalyzer,
        ctx: &AnalysisContext<'_>,
        cache: Option<&dyn CacheStore>,
    ) -> (Vec<Diagnostic>, Option<CacheKey>) {
        if !self.config.category(analyzer.category()).enabled {
            debug!(analyzer = analyzer.name(), "category disabled, skipping");
            return (Vec::new(), None);
        }
        let Some(store) = cache else {
            return (analyzer.analyze(ctx), None);
        };

        let mut fp = Fingerprint::new("analysis");
        fp.push(analyzer.name());
        fp.push(analyzer.version());
        fp.push(analyzer.fingerprint());
        fp.push(ctx.config_label);
        fp.push(self.config.fingerprint());
        fp.push(ctx.graph.fingerprint());
        let mut parser_ids: Vec<String> = self
            .parsers
            .iter()
            .map(|p| format!("{}@{}", p.id(), p.version()))
            .collect();
        parser_ids.sort();
        for id in &parser_ids {
            fp.push(id);
        }
        let key = fp.finish();

        if let Some(CacheEntry {
            value: CachedValue::Analysis(found),
            ..
        }) = store.get(&key)
        {
            debug!(analyzer = analyzer.name(), "analysis cache hit");
            return (found, Some(key));
        }

        let found = analyzer.analyze(ctx);
        debug!(analyzer = analyzer.name(), diagnostics = found.len(), "analyzer finished");
        let entry = CacheEntry::new(key.clone(), CachedValue::Analysis(found.clone()));
        if let Err(e) = store.put(entry) {
            warn!(analyzer = analyzer.name(), error = %e, "failed to write cache entry");
        }
        (found, Some(key))
    }
}
