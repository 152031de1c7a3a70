//! Project definition loader
//!
//! Locates and parses per-project CI job definitions. Lookup walks from
//! the most specific candidate path to the least specific one; a missing
//! file is an ordinary absent result, never an error. Parsing is forgiving
//! the same way template loading is: a file or stanza that does not match
//! the dialect is logged, counted, and dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{JobEntry, ProjectBlock, SourceProject};
use crate::templates::yaml_files_sorted;

/// One `- project:` stanza in a definitions file.
#[derive(Debug, Deserialize)]
struct DefinitionsStanza {
    project: RawProjectBlock,
}

#[derive(Debug, Deserialize)]
struct RawProjectBlock {
    name: String,

    /// The source project the block binds to. Optional: a block without it
    /// binds to the project on whose behalf the file was parsed (or, for a
    /// full-tree scan, to the project derived from the file's path).
    #[serde(rename = "source-project", default)]
    source_project: Option<String>,

    #[serde(default)]
    jobs: Vec<serde_yaml_ng::Value>,
}

/// Counters describing one parse run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DefinitionStats {
    /// Files or stanzas that failed to parse and were dropped whole.
    pub parse_errors: usize,
    /// Individual job entries dropped from otherwise valid blocks.
    pub entries_skipped: usize,
}

impl DefinitionStats {
    fn absorb(&mut self, other: DefinitionStats) {
        self.parse_errors += other.parse_errors;
        self.entries_skipped += other.entries_skipped;
    }
}

/// Locates and parses definition files under one repository root.
#[derive(Debug, Clone)]
pub struct ProjectDefinitionLoader {
    root: PathBuf,
}

impl ProjectDefinitionLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the definition file for `project`, trying the most specific
    /// candidate first: for `aai/babel` that is `<root>/aai/babel.yaml`
    /// (then `.yml`), falling back to `<root>/aai.yaml` (then `.yml`).
    ///
    /// Returns `None` when no candidate exists; callers treat that as "no
    /// jobs expected for this project".
    pub fn find_definition_file(&self, project: &SourceProject) -> Option<PathBuf> {
        let segments: Vec<&str> = project.segments().collect();

        for end in (1..=segments.len()).rev() {
            let mut base = self.root.clone();
            for segment in &segments[..end - 1] {
                base.push(segment);
            }
            // The extension is appended, not swapped in with
            // `with_extension`: a dot inside the last segment is part of
            // the project id, e.g. `tools/build.tools` -> `build.tools.yaml`.
            let last = segments[end - 1];
            for ext in ["yaml", "yml"] {
                let candidate = base.join(format!("{last}.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Parse `file` into project blocks on behalf of `project`.
    ///
    /// Every block in the file belongs to the request; a block that does
    /// not declare its own `source-project` binds to `project`. A file that
    /// fails to parse yields zero blocks plus a counted, logged error.
    pub fn parse_project_blocks(
        &self,
        project: &SourceProject,
        file: &Path,
    ) -> (Vec<ProjectBlock>, DefinitionStats) {
        let mut stats = DefinitionStats::default();
        let mut blocks = Vec::new();

        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "unreadable definitions file");
                stats.parse_errors += 1;
                return (blocks, stats);
            }
        };

        let stanzas: Vec<serde_yaml_ng::Value> = match serde_yaml_ng::from_str(&content) {
            Ok(stanzas) => stanzas,
            Err(err) => {
                warn!(file = %file.display(), error = %err, "malformed definitions file");
                stats.parse_errors += 1;
                return (blocks, stats);
            }
        };

        for stanza in stanzas {
            let raw = match serde_yaml_ng::from_value::<DefinitionsStanza>(stanza) {
                Ok(stanza) => stanza.project,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "malformed project stanza");
                    stats.parse_errors += 1;
                    continue;
                }
            };

            let source_project = raw
                .source_project
                .map(SourceProject::new)
                .unwrap_or_else(|| project.clone());

            let mut jobs = Vec::with_capacity(raw.jobs.len());
            for value in raw.jobs {
                match serde_yaml_ng::from_value::<JobEntry>(value) {
                    Ok(entry) => jobs.push(entry),
                    Err(err) => {
                        warn!(
                            file = %file.display(),
                            block = %raw.name,
                            error = %err,
                            "skipping malformed job entry"
                        );
                        stats.entries_skipped += 1;
                    }
                }
            }

            blocks.push(ProjectBlock {
                name: raw.name,
                source_project,
                jobs,
            });
        }

        (blocks, stats)
    }

    /// Parse every definition file under the repository root and group the
    /// blocks by source project.
    ///
    /// Blocks that do not declare `source-project` are attributed to the
    /// project derived from the file's path relative to the root (path
    /// without extension). Files are visited in sorted order, so the result
    /// is deterministic.
    pub fn scan_all(&self) -> (BTreeMap<SourceProject, Vec<ProjectBlock>>, DefinitionStats) {
        let mut stats = DefinitionStats::default();
        let mut projects: BTreeMap<SourceProject, Vec<ProjectBlock>> = BTreeMap::new();

        for file in yaml_files_sorted(&self.root) {
            let implied = self.project_from_path(&file);
            let (blocks, file_stats) = self.parse_project_blocks(&implied, &file);
            stats.absorb(file_stats);

            for block in blocks {
                projects
                    .entry(block.source_project.clone())
                    .or_default()
                    .push(block);
            }
        }

        (projects, stats)
    }

    /// Project id implied by a definition file's location, e.g.
    /// `<root>/aai/babel.yaml` -> `aai/babel`.
    fn project_from_path(&self, file: &Path) -> SourceProject {
        let rel = file.strip_prefix(&self.root).unwrap_or(file);
        let stem = rel.with_extension("");
        let id = stem
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        SourceProject::new(id)
    }
}
