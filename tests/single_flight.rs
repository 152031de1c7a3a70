//! Concurrency contract of the per-project cache: concurrent first-time
//! requests for the same project perform exactly one underlying parse,
//! and every caller observes the same completed result.

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::tempdir;

use jobmap::{ExpandedJobSet, Resolver, SourceProject};

const WORKERS: usize = 8;

fn fixture(dir: &std::path::Path) -> Resolver {
    let defs = dir.join("defs");
    let templates = dir.join("templates");
    fs::create_dir_all(defs.join("aai")).unwrap();
    fs::create_dir_all(&templates).unwrap();

    fs::write(
        templates.join("maven.yaml"),
        r#"
- template:
    name: maven-verify
    name-pattern: "{project-name}-maven-verify-{stream}"
    defaults:
      project-name: aai-babel
      stream: [master, release]
"#,
    )
    .unwrap();
    fs::write(
        defs.join("aai/babel.yaml"),
        "- project:\n    name: babel\n    jobs: [maven-verify]\n",
    )
    .unwrap();

    Resolver::new(defs, templates)
}

#[test]
fn concurrent_first_requests_compute_once_and_agree() {
    let dir = tempdir().unwrap();
    let resolver = Arc::new(fixture(dir.path()));
    resolver.load_templates();

    let barrier = Arc::new(Barrier::new(WORKERS));
    let mut handles = Vec::with_capacity(WORKERS);

    for _ in 0..WORKERS {
        let resolver = Arc::clone(&resolver);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            resolver
                .parse_project_jobs(&SourceProject::new("aai/babel"))
                .unwrap()
        }));
    }

    let results: Vec<Arc<ExpandedJobSet>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in &results[1..] {
        assert!(
            Arc::ptr_eq(&results[0], result),
            "all callers must share the single computed result"
        );
    }
    assert_eq!(
        results[0].resolved,
        vec![
            "aai-babel-maven-verify-master",
            "aai-babel-maven-verify-release"
        ]
    );

    // The computation (and its counter update) ran exactly once.
    assert_eq!(resolver.summary().source_projects_discovered, 1);
    assert_eq!(resolver.summary().total_jobs_parsed, 1);
}

#[test]
fn concurrent_requests_for_different_projects_do_not_serialize_results() {
    let dir = tempdir().unwrap();
    let defs = dir.path().join("defs");
    let templates = dir.path().join("templates");
    fs::create_dir_all(&defs).unwrap();
    fs::create_dir_all(&templates).unwrap();

    fs::write(
        templates.join("t.yaml"),
        "- template:\n    name: lint\n    name-pattern: \"{p}-lint\"\n",
    )
    .unwrap();
    for name in ["alpha", "beta", "gamma", "delta"] {
        fs::write(
            defs.join(format!("{name}.yaml")),
            format!(
                "- project:\n    name: {name}\n    jobs:\n      - lint:\n          p: {name}\n"
            ),
        )
        .unwrap();
    }

    let resolver = Arc::new(Resolver::new(defs, templates));
    resolver.load_templates();

    let mut handles = Vec::new();
    for name in ["alpha", "beta", "gamma", "delta"] {
        let resolver = Arc::clone(&resolver);
        handles.push(thread::spawn(move || {
            let set = resolver
                .parse_project_jobs(&SourceProject::new(name))
                .unwrap();
            (name, set)
        }));
    }

    for handle in handles {
        let (name, set) = handle.join().unwrap();
        assert_eq!(set.resolved, vec![format!("{name}-lint")]);
    }
    assert_eq!(resolver.summary().source_projects_discovered, 4);
}
