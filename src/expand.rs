//! Parameter expansion
//!
//! Turns one job entry plus its template into concrete job names. Merging
//! is per parameter name with entry overrides beating template defaults
//! (an override replaces the whole value, never merges into it). List
//! valued parameters are matrix axes: the Cartesian product of all axes
//! is generated iteratively, in declaration order, with the last declared
//! axis varying fastest. Names still containing `{` afterwards had a
//! placeholder with no value from either side; they are reported in the
//! `unresolved` partition rather than dropped.

use tracing::warn;

use crate::models::{ExpandedJobSet, JobEntry, ParamMap, ParamValue};
use crate::templates::TemplateLibrary;

/// Outcome of expanding a single job entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// The entry expanded into zero or more job names.
    Jobs(ExpandedJobSet),
    /// The referenced template is not in the library. Not fatal: the entry
    /// contributes nothing and the condition is the caller's to count.
    MissingTemplate { template: String },
}

/// Expand `entry` against the loaded template library.
pub fn expand(entry: &JobEntry, library: &TemplateLibrary) -> Expansion {
    let Some(spec) = library.get(entry.template()) else {
        warn!(template = entry.template(), "job entry references unknown template");
        return Expansion::MissingTemplate {
            template: entry.template().to_string(),
        };
    };

    let params = effective_params(&spec.defaults, entry.overrides());

    let mut scalars: Vec<(&str, String)> = Vec::new();
    let mut axes: Vec<(&str, Vec<String>)> = Vec::new();
    for (name, value) in params.iter() {
        match value {
            ParamValue::Single(v) => scalars.push((name, v.to_string())),
            ParamValue::Many(vs) => {
                axes.push((name, vs.iter().map(ToString::to_string).collect()))
            }
        }
    }

    // Scalars hold for every combination, so they are substituted once.
    let mut base = spec.name_pattern.clone();
    for (name, value) in &scalars {
        base = substitute(&base, name, value);
    }

    // Iterative Cartesian accumulation over the axes. With no axes there
    // is exactly one (empty) combination; an axis with an empty value
    // sequence collapses the product to zero combinations.
    let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
    for (_, values) in &axes {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.push(value.as_str());
                next.push(extended);
            }
        }
        combos = next;
    }

    let mut set = ExpandedJobSet::default();
    for combo in combos {
        let mut job_name = base.clone();
        for ((name, _), value) in axes.iter().zip(combo) {
            job_name = substitute(&job_name, name, value);
        }
        if job_name.contains('{') {
            set.unresolved.push(job_name);
        } else {
            set.resolved.push(job_name);
        }
    }

    Expansion::Jobs(set)
}

/// Merge overrides over defaults, per name. Overriding an existing name
/// keeps the default's declared position; names only the override declares
/// are appended in override order.
fn effective_params(defaults: &ParamMap, overrides: Option<&ParamMap>) -> ParamMap {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        for (name, value) in overrides.iter() {
            merged.set(name, value.clone());
        }
    }
    merged
}

fn substitute(pattern: &str, name: &str, value: &str) -> String {
    pattern.replace(&format!("{{{}}}", name), value)
}
