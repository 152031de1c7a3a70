//! Template library
//!
//! Loads the templates repository into an immutable index from template
//! name to `TemplateSpec`. Loading is forgiving by contract: a malformed
//! file is logged and skipped, a duplicate template name is resolved
//! last-loaded-wins, and a missing or unreadable repository yields an
//! empty index. Every degraded outcome is visible in `TemplateLoadStats`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::TemplateSpec;

/// One `- template:` stanza in a template file.
#[derive(Debug, Deserialize)]
struct TemplateStanza {
    template: TemplateSpec,
}

/// Counters describing one `load` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateLoadStats {
    /// Template files found under the repository root.
    pub files_scanned: usize,
    /// Files dropped whole (unreadable, or not valid YAML for the dialect).
    pub files_skipped: usize,
    /// Stanzas dropped from otherwise loadable files.
    pub stanzas_skipped: usize,
    /// Templates in the final index.
    pub templates_loaded: usize,
    /// Names that were defined more than once (earlier definition shadowed).
    pub duplicates: usize,
}

/// Immutable index of job templates, keyed by template name.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: HashMap<String, TemplateSpec>,
}

impl TemplateLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a library directly from specs (test fixtures, embedded use).
    /// Same duplicate policy as `load`: last one wins.
    pub fn from_specs(specs: impl IntoIterator<Item = TemplateSpec>) -> Self {
        let mut templates = HashMap::new();
        for spec in specs {
            templates.insert(spec.name.clone(), spec);
        }
        Self { templates }
    }

    /// Scan every `*.yaml`/`*.yml` file under `root` and build the index.
    ///
    /// Files are visited in lexicographic path order, which makes the
    /// last-loaded-wins duplicate policy deterministic: the winner is the
    /// definition from the last file in sorted order. A missing root is
    /// not an error; it produces an empty library.
    pub fn load(root: &Path) -> (Self, TemplateLoadStats) {
        let mut stats = TemplateLoadStats::default();
        let mut templates: HashMap<String, TemplateSpec> = HashMap::new();
        let mut origins: HashMap<String, PathBuf> = HashMap::new();

        if !root.is_dir() {
            warn!(root = %root.display(), "templates repository root not found; loading empty index");
            return (Self::empty(), stats);
        }

        for path in yaml_files_sorted(root) {
            stats.files_scanned += 1;

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping unreadable template file");
                    stats.files_skipped += 1;
                    continue;
                }
            };

            let stanzas: Vec<serde_yaml_ng::Value> = match serde_yaml_ng::from_str(&content) {
                Ok(stanzas) => stanzas,
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping malformed template file");
                    stats.files_skipped += 1;
                    continue;
                }
            };

            for stanza in stanzas {
                let spec = match serde_yaml_ng::from_value::<TemplateStanza>(stanza) {
                    Ok(stanza) => stanza.template,
                    Err(err) => {
                        warn!(file = %path.display(), error = %err, "skipping malformed template stanza");
                        stats.stanzas_skipped += 1;
                        continue;
                    }
                };

                let name = spec.name.clone();
                if let Some(shadowed) = origins.insert(name.clone(), path.clone()) {
                    warn!(
                        template = %name,
                        winner = %path.display(),
                        shadowed = %shadowed.display(),
                        "duplicate template name; last-loaded definition wins"
                    );
                    stats.duplicates += 1;
                }
                templates.insert(name, spec);
            }
        }

        stats.templates_loaded = templates.len();
        debug!(
            templates = stats.templates_loaded,
            files = stats.files_scanned,
            skipped = stats.files_skipped,
            "template index loaded"
        );

        (Self { templates }, stats)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateSpec> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// All YAML files under `root`, sorted by path for a deterministic scan.
pub(crate) fn yaml_files_sorted(root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for entry in WalkBuilder::new(root).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };

        let path = entry.path();
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_yaml(path) {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    paths
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}
