//! Property tests for parameter expansion.

use proptest::prelude::*;

use jobmap::{expand, Expansion, JobEntry, ParamValue, TemplateLibrary, TemplateSpec};

fn value_token() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-z0-9]{1,6}").unwrap()
}

/// Up to four matrix axes, each with zero to three values.
fn axes() -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(proptest::collection::vec(value_token(), 0..=3), 0..=4)
}

/// Build a template whose pattern references one placeholder per axis.
fn template_for(axes: &[Vec<String>]) -> TemplateSpec {
    let mut pattern = String::from("job");
    let mut spec = TemplateSpec::new("generated", "");
    for (i, values) in axes.iter().enumerate() {
        let name = format!("axis{}", i);
        pattern.push_str("-{");
        pattern.push_str(&name);
        pattern.push('}');
        spec = spec.with_default(name, ParamValue::list(values.iter().map(String::as_str)));
    }
    spec.name_pattern = pattern;
    spec
}

fn expand_generated(axes: &[Vec<String>]) -> jobmap::ExpandedJobSet {
    let library = TemplateLibrary::from_specs([template_for(axes)]);
    let entry = JobEntry::Reference {
        template: "generated".to_string(),
    };
    match expand(&entry, &library) {
        Expansion::Jobs(set) => set,
        Expansion::MissingTemplate { template } => {
            panic!("template '{}' should be in the library", template)
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: one entry with list axes of sizes n1..nk produces exactly
    /// n1*n2*...*nk job names.
    #[test]
    fn property_cartesian_cardinality(axes in axes()) {
        let expected: usize = axes.iter().map(Vec::len).product();
        let set = expand_generated(&axes);
        prop_assert_eq!(set.len(), expected);
    }

    /// PROPERTY: every produced name is in exactly one partition, decided
    /// solely by whether a `{` survived substitution. All axis values here
    /// are brace-free, so everything must resolve.
    #[test]
    fn property_partition_totality(axes in axes()) {
        let set = expand_generated(&axes);
        prop_assert!(
            set.resolved.iter().all(|name| !name.contains('{')),
            "resolved names must be brace-free"
        );
        prop_assert!(set.unresolved.is_empty());
    }

    /// PROPERTY: a placeholder with no value from any side moves every
    /// combination to the unresolved partition.
    #[test]
    fn property_unset_placeholder_unresolves_all(axes in axes()) {
        let mut spec = template_for(&axes);
        spec.name_pattern.push_str("-{never-set}");
        let library = TemplateLibrary::from_specs([spec]);
        let entry = JobEntry::Reference {
            template: "generated".to_string(),
        };

        let set = match expand(&entry, &library) {
            Expansion::Jobs(set) => set,
            Expansion::MissingTemplate { .. } => unreachable!(),
        };

        let expected: usize = axes.iter().map(Vec::len).product();
        prop_assert!(set.resolved.is_empty());
        prop_assert_eq!(set.unresolved.len(), expected);
        prop_assert!(
            set.unresolved.iter().all(|name| name.contains("{never-set}")),
            "every name must keep the unset placeholder"
        );
    }

    /// PROPERTY: expansion is deterministic - repeated runs over the same
    /// inputs produce identical sequences in identical order.
    #[test]
    fn property_expansion_is_deterministic(axes in axes()) {
        let first = expand_generated(&axes);
        let second = expand_generated(&axes);
        prop_assert_eq!(first, second);
    }

    /// PROPERTY: `expand` never panics, whatever the pattern looks like.
    #[test]
    fn property_expand_never_panics_on_arbitrary_patterns(
        pattern in "(?s).{0,64}"
    ) {
        let library = TemplateLibrary::from_specs([
            TemplateSpec::new("odd", pattern)
                .with_default("stream", ParamValue::list(["master", "release"])),
        ]);
        let entry = JobEntry::Reference {
            template: "odd".to_string(),
        };
        let _ = expand(&entry, &library);
    }
}
