//! Whole-graph walks: ordering, de-duplication, error policy, mocks,
//! polyfills and async bundles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Fixture, relative_paths};
use crate::{DependencyOptions, GraphError, ModuleKind};

#[tokio::test]
async fn test_diamond_is_deduplicated_in_pre_order() {
    let fixture = Fixture::with_files(&[
        ("A.js", "require('./B'); require('./C');"),
        ("B.js", "require('./D');"),
        ("C.js", "require('./D');"),
        ("D.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("A.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["A.js", "B.js", "D.js", "C.js"]
    );

    let c = &response.dependencies()[3];
    let pairs = response.resolved_dependency_pairs(c);
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].module.as_ref().unwrap().path(), fixture.path("D.js"));
}

#[tokio::test]
async fn test_cycle_terminates() {
    let fixture = Fixture::with_files(&[("A.js", "require('./B');"), ("B.js", "require('./A');")]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("A.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, response.paths()), vec!["A.js", "B.js"]);
}

#[tokio::test]
async fn test_missing_dependency_is_omitted() {
    let fixture = Fixture::with_files(&[
        ("A.js", "require('./B');\nrequire('missing');"),
        ("B.js", ""),
    ]);
    let graph = fixture.graph();

    let errors = Arc::new(AtomicUsize::new(0));
    let counter = errors.clone();
    let response = graph
        .get_dependencies(
            fixture.path("A.js"),
            DependencyOptions::default().on_error(move |e| {
                assert!(e.is_unable_to_resolve());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

    assert_eq!(relative_paths(&fixture.root, response.paths()), vec!["A.js", "B.js"]);
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    let a = &response.dependencies()[0];
    let pairs = response.resolved_dependency_pairs(a);
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[1].name, "missing");
    assert!(pairs[1].module.is_none());
}

#[tokio::test]
async fn test_should_throw_escalates() {
    let fixture = Fixture::with_files(&[("A.js", "require('missing');")]);
    let graph = fixture.graph();

    let err = graph
        .get_dependencies(
            "A.js",
            DependencyOptions::default().should_throw(|entry, platform| {
                entry.ends_with("A.js") && platform.is_none()
            }),
        )
        .await
        .unwrap_err();
    match err {
        GraphError::UnableToResolve { name, from, .. } => {
            assert_eq!(name, "missing");
            assert_eq!(from, fixture.path("A.js"));
        }
        other => panic!("expected resolution error, got {other}"),
    }
}

#[tokio::test]
async fn test_shallow_walk() {
    let fixture = Fixture::with_files(&[
        ("A.js", "require('./B');"),
        ("B.js", "require('./C');"),
        ("C.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("A.js", DependencyOptions::default().shallow())
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, response.paths()), vec!["A.js", "B.js"]);

    let names = graph.get_shallow_dependencies("B.js").await.unwrap();
    assert_eq!(names, vec!["./C"]);
}

#[tokio::test]
async fn test_import_syntax_and_json() {
    let fixture = Fixture::with_files(&[
        ("index.js", "import config from './config.json';\nexport { x } from './x';"),
        ("config.json", r#"{"debug": true}"#),
        ("x.js", "export const x = 1;"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "config.json", "x.js"]
    );
    assert!(response.dependencies()[1].is_json());
}

#[tokio::test]
async fn test_async_bundles_are_paths() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./eager');\nimport('./lazy');"),
        ("eager.js", ""),
        ("lazy.js", "require('./eager');"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, response.paths()), vec!["index.js", "eager.js"]);
    assert_eq!(response.async_dependencies(), &[vec![fixture.path("lazy.js")]]);

    let bundles = graph.get_async_dependencies("index.js", None).await.unwrap();
    assert_eq!(bundles, vec![vec![fixture.path("lazy.js")]]);
}

#[tokio::test]
async fn test_polyfills_are_prepended() {
    let fixture = Fixture::with_files(&[
        ("polyfills/console.js", ""),
        ("polyfills/error-guard.js", ""),
        ("index.js", "require('./app');"),
        ("app.js", ""),
    ]);
    let mut config = fixture.config();
    config.polyfills = vec![
        fixture.path("polyfills/console.js"),
        fixture.path("polyfills/error-guard.js"),
    ];
    let graph = fixture.graph_with(config);

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();

    assert_eq!(response.num_prepended(), 2);
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["polyfills/console.js", "polyfills/error-guard.js", "index.js", "app.js"]
    );
    assert_eq!(response.entry().unwrap().path(), fixture.path("index.js"));

    match response.dependencies()[1].kind() {
        ModuleKind::Polyfill { dependencies, .. } => {
            assert_eq!(
                dependencies,
                &vec![fixture.path("polyfills/console.js").to_string_lossy().into_owned()]
            );
        }
        other => panic!("expected polyfill, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mock_substitutes_unresolved_name() {
    let fixture = Fixture::with_files(&[
        ("A.js", "require('NativeBridge');"),
        ("__mocks__/NativeBridge.js", ""),
    ]);
    let mut config = fixture.config();
    config.mocks_pattern = Some("__mocks__/".to_string());
    let graph = fixture.graph_with(config);

    let response = graph
        .get_dependencies("A.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["A.js", "__mocks__/NativeBridge.js"]
    );
    assert_eq!(
        response.mocks().get("NativeBridge"),
        Some(&fixture.path("__mocks__/NativeBridge.js"))
    );
}

#[tokio::test]
async fn test_mock_of_global_module_is_appended() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('Store');"),
        ("lib/Store.js", "/** @providesModule Store */"),
        ("__mocks__/Store.js", ""),
    ]);
    let mut config = fixture.config();
    config.mocks_pattern = Some("__mocks__/".to_string());
    let graph = fixture.graph_with(config);

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "lib/Store.js", "__mocks__/Store.js"]
    );
}

#[tokio::test]
async fn test_debug_info_lists_edges() {
    let fixture = Fixture::with_files(&[("A.js", "require('./B');"), ("B.js", "")]);
    let graph = fixture.graph();
    graph
        .get_dependencies("A.js", DependencyOptions::default())
        .await
        .unwrap();

    let info = graph.get_debug_info();
    assert!(info.contains("./B [*] ->"), "{info}");
    assert!(info.contains(&format!("{} (./B)", fixture.path("A.js").display())), "{info}");
}

#[tokio::test]
async fn test_match_files_by_pattern() {
    let fixture = Fixture::with_files(&[
        ("a.test.js", ""),
        ("b.js", ""),
        ("nested/c.test.js", ""),
    ]);
    let graph = fixture.graph();

    let pattern = regex::Regex::new(r"\.test\.js$").unwrap();
    let files = graph.match_files_by_pattern(&pattern).await.unwrap();
    assert_eq!(files, vec![fixture.path("a.test.js"), fixture.path("nested/c.test.js")]);
}
