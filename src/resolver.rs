//! Resolver
//!
//! The orchestrator the surrounding analysis pipeline talks to. Owns the
//! loaded template index, the definition loader, and a per-project cache
//! of expansion results. The cache is single-flight: concurrent first
//! requests for the same project perform exactly one file parse, with the
//! other callers blocking on the in-flight computation. Cache entries are
//! immutable for the resolver's lifetime; a fresh `Resolver` is the unit
//! of freshness.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::definitions::ProjectDefinitionLoader;
use crate::error::{JobmapError, JobmapResult};
use crate::expand::{expand, Expansion};
use crate::models::{ExpandedJobSet, ProjectBlock, SourceProject};
use crate::templates::{TemplateLibrary, TemplateLoadStats};

/// Running tallies over everything this resolver has loaded and parsed.
///
/// Counts reflect only projects that have actually been parsed via
/// `parse_project_jobs`, unless `get_all_projects` has been called, which
/// raises the discovery counters to the full-tree totals. Each project
/// key contributes once, however it was first observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolverSummary {
    pub source_projects_discovered: usize,
    pub project_blocks_discovered: usize,
    pub total_jobs_parsed: usize,
    pub templates_loaded: usize,
    pub template_files_skipped: usize,
    pub duplicate_templates: usize,
    pub missing_templates: usize,
    pub definition_parse_errors: usize,
}

#[derive(Debug, Default)]
struct Counters {
    missing_templates: AtomicUsize,
    definition_parse_errors: AtomicUsize,
}

/// Per-project block/job counts, recorded the first time a project is
/// observed (lazily or through a full-tree scan) so the summary never
/// counts a project twice.
#[derive(Debug, Clone, Copy, Default)]
struct ProjectTally {
    blocks: usize,
    jobs: usize,
}

fn tally_of(blocks: &[ProjectBlock]) -> ProjectTally {
    ProjectTally {
        blocks: blocks.len(),
        jobs: blocks.iter().map(|block| block.jobs.len()).sum(),
    }
}

type CacheCell = Arc<OnceLock<Arc<ExpandedJobSet>>>;

/// Computes, caches, and serves per-project expanded job sets.
pub struct Resolver {
    definitions: ProjectDefinitionLoader,
    templates_root: PathBuf,
    library: RwLock<Option<Arc<TemplateLibrary>>>,
    template_stats: RwLock<TemplateLoadStats>,
    cache: Mutex<HashMap<SourceProject, CacheCell>>,
    discovered: Mutex<HashMap<SourceProject, ProjectTally>>,
    counters: Counters,
}

impl Resolver {
    /// Both paths come from the repository provider: local read-only
    /// checkouts of the definitions and templates repositories.
    pub fn new(definitions_root: impl Into<PathBuf>, templates_root: impl Into<PathBuf>) -> Self {
        Self {
            definitions: ProjectDefinitionLoader::new(definitions_root),
            templates_root: templates_root.into(),
            library: RwLock::new(None),
            template_stats: RwLock::new(TemplateLoadStats::default()),
            cache: Mutex::new(HashMap::new()),
            discovered: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Load (or reload) the template index. Must run before the first
    /// `parse_project_jobs`. A reload replaces the index atomically:
    /// concurrent readers observe either the old or the new complete
    /// index. Already-cached project results are not invalidated.
    pub fn load_templates(&self) -> TemplateLoadStats {
        let (library, stats) = TemplateLibrary::load(&self.templates_root);

        *self.library.write().expect("template index lock poisoned") = Some(Arc::new(library));
        *self
            .template_stats
            .write()
            .expect("template stats lock poisoned") = stats.clone();

        stats
    }

    /// See `ProjectDefinitionLoader::find_definition_file`.
    pub fn find_definition_file(&self, project: &SourceProject) -> Option<PathBuf> {
        self.definitions.find_definition_file(project)
    }

    /// The expanded job set for `project`, computed on first request and
    /// cached for the resolver's lifetime.
    ///
    /// An unknown or unparsable project yields a set with both partitions
    /// empty. The only error is the `load_templates` precondition.
    pub fn parse_project_jobs(
        &self,
        project: &SourceProject,
    ) -> JobmapResult<Arc<ExpandedJobSet>> {
        let library = self
            .library
            .read()
            .expect("template index lock poisoned")
            .clone()
            .ok_or(JobmapError::TemplatesNotLoaded)?;

        let cell: CacheCell = {
            let mut cache = self.cache.lock().expect("job cache lock poisoned");
            Arc::clone(cache.entry(project.clone()).or_default())
        };

        // Single flight: `get_or_init` runs the computation at most once
        // per cell; concurrent callers block until it completes and then
        // share the same result.
        let set = cell.get_or_init(|| Arc::new(self.compute(project, &library)));
        Ok(Arc::clone(set))
    }

    /// Every project declared anywhere in the definitions repository,
    /// with its blocks, in deterministic order.
    ///
    /// This scans and parses the whole tree but expands nothing; job
    /// expansion stays lazy and per-request.
    pub fn get_all_projects(&self) -> BTreeMap<SourceProject, Vec<ProjectBlock>> {
        let (projects, stats) = self.definitions.scan_all();

        {
            let mut discovered = self.discovered.lock().expect("discovery tally lock poisoned");
            for (project, blocks) in &projects {
                // First observation of a key wins; projects already seen
                // by a lazy parse are not counted again.
                discovered
                    .entry(project.clone())
                    .or_insert_with(|| tally_of(blocks));
            }
        }
        self.counters
            .definition_parse_errors
            .fetch_max(stats.parse_errors, Ordering::Relaxed);

        projects
    }

    /// Current summary counters. A running tally, not an eager global
    /// count: see `ResolverSummary`.
    pub fn summary(&self) -> ResolverSummary {
        let template_stats = self
            .template_stats
            .read()
            .expect("template stats lock poisoned")
            .clone();

        let discovered = self.discovered.lock().expect("discovery tally lock poisoned");

        ResolverSummary {
            source_projects_discovered: discovered.len(),
            project_blocks_discovered: discovered.values().map(|t| t.blocks).sum(),
            total_jobs_parsed: discovered.values().map(|t| t.jobs).sum(),
            templates_loaded: template_stats.templates_loaded,
            template_files_skipped: template_stats.files_skipped,
            duplicate_templates: template_stats.duplicates,
            missing_templates: self.counters.missing_templates.load(Ordering::Relaxed),
            definition_parse_errors: self
                .counters
                .definition_parse_errors
                .load(Ordering::Relaxed),
        }
    }

    /// Uncached expansion of one project. Runs at most once per project
    /// key thanks to the cache cell, so the counters it feeds count each
    /// project exactly once.
    fn compute(&self, project: &SourceProject, library: &TemplateLibrary) -> ExpandedJobSet {
        let Some(file) = self.definitions.find_definition_file(project) else {
            debug!(project = %project, "no definition file; project expands to zero jobs");
            return ExpandedJobSet::default();
        };

        let (blocks, stats) = self.definitions.parse_project_blocks(project, &file);

        self.discovered
            .lock()
            .expect("discovery tally lock poisoned")
            .entry(project.clone())
            .or_insert_with(|| tally_of(&blocks));
        self.counters
            .definition_parse_errors
            .fetch_add(stats.parse_errors, Ordering::Relaxed);

        let mut set = ExpandedJobSet::default();
        for block in &blocks {
            for entry in &block.jobs {
                match expand(entry, library) {
                    Expansion::Jobs(expanded) => set.merge(expanded),
                    Expansion::MissingTemplate { .. } => {
                        self.counters
                            .missing_templates
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        debug!(
            project = %project,
            resolved = set.resolved.len(),
            unresolved = set.unresolved.len(),
            "expanded project jobs"
        );
        set
    }
}
