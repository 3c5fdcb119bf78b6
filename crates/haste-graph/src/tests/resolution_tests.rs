//! Resolution of single names: packages, platforms, global names,
//! redirects, node_modules and assets.

use std::path::Path;
use std::sync::Arc;

use super::{Fixture, relative_paths};
use crate::asset::{AssetResolver, AssetServer};
use crate::context::ignore_predicate;
use crate::fs::{FileTree, Root};
use crate::platform::Blacklist;
use crate::runtime::test_utils::TestRuntime;
use crate::{DependencyOptions, GraphError, ModuleKind, RedirectTarget};

fn swallow() -> DependencyOptions {
    DependencyOptions::default().on_error(|_| {})
}

#[tokio::test]
async fn test_package_main_from_sibling() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('pkg');"),
        ("pkg/package.json", r#"{"main": "lib/index.js"}"#),
        ("pkg/lib/index.js", "module.exports = 1;"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies(fixture.path("index.js"), DependencyOptions::default())
        .await
        .unwrap();

    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "pkg/lib/index.js"]
    );
}

#[tokio::test]
async fn test_directory_resolves_to_index() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./components');"),
        ("components/index.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();

    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "components/index.js"]
    );
}

#[tokio::test]
async fn test_platform_variant_preferred() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./Foo');"),
        ("Foo.ios.js", ""),
        ("Foo.js", ""),
    ]);
    let graph = fixture.graph();

    let ios = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("ios"))
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, ios.paths()), vec!["index.js", "Foo.ios.js"]);

    let android = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("android"))
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, android.paths()), vec!["index.js", "Foo.js"]);
}

#[tokio::test]
async fn test_other_platform_variant_excluded() {
    let fixture = Fixture::with_files(&[("index.js", "require('./Foo.ios');"), ("Foo.ios.js", "")]);
    let graph = fixture.graph();

    let err = graph
        .get_dependencies(
            "index.js",
            DependencyOptions::default()
                .platform("android")
                .should_throw(|_, _| true),
        )
        .await
        .unwrap_err();
    assert!(err.is_unable_to_resolve(), "{err}");

    let ios = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("ios"))
        .await
        .unwrap();
    assert_eq!(ios.dependencies().len(), 2);
}

#[tokio::test]
async fn test_native_variant_when_preferred() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./View');"),
        ("View.native.js", ""),
        ("View.js", ""),
    ]);

    let graph = fixture.graph();
    let response = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("ios"))
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "View.native.js"]
    );

    let mut config = fixture.config();
    config.prefer_native_platform = false;
    let graph = fixture.graph_with(config);
    let response = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("ios"))
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, response.paths()), vec!["index.js", "View.js"]);
}

#[tokio::test]
async fn test_platform_inferred_from_entry() {
    let fixture = Fixture::with_files(&[
        ("index.ios.js", "require('./Foo');"),
        ("Foo.ios.js", ""),
        ("Foo.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.ios.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(response.platform(), Some("ios"));
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.ios.js", "Foo.ios.js"]
    );
}

#[tokio::test]
async fn test_unrecognized_platform() {
    let fixture = Fixture::with_files(&[("index.js", "")]);
    let graph = fixture.graph();

    let err = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("tvos"))
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::UnrecognizedPlatform { .. }));
}

#[tokio::test]
async fn test_missing_entry() {
    let fixture = Fixture::with_files(&[("index.js", "")]);
    let graph = fixture.graph();

    let err = graph
        .get_dependencies("nope.js", DependencyOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::EntryNotFound(_)));
}

#[tokio::test]
async fn test_global_module_name() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('Button');"),
        ("lib/ui/Button.js", "/**\n * @providesModule Button\n */\nmodule.exports = {};"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["index.js", "lib/ui/Button.js"]
    );

    let button = &response.dependencies()[1];
    assert_eq!(button.name(graph.context()).await.unwrap(), "Button");
    assert!(button.is_haste(graph.context()).await.unwrap());
}

#[tokio::test]
async fn test_global_name_per_platform() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('Button');"),
        ("Button.ios.js", "/** @providesModule Button */"),
        ("Button.android.js", "/** @providesModule Button */"),
    ]);
    let graph = fixture.graph();

    let ios = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("ios"))
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, ios.paths())[1], "Button.ios.js");

    let android = graph
        .get_dependencies("index.js", DependencyOptions::default().platform("android"))
        .await
        .unwrap();
    assert_eq!(relative_paths(&fixture.root, android.paths())[1], "Button.android.js");

    let names = graph.global_names();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|(name, _, _)| name == "Button"));
}

#[tokio::test]
async fn test_global_name_collision_fails_load() {
    let fixture = Fixture::with_files(&[
        ("a/Thing.js", "/** @providesModule Thing */"),
        ("b/Thing.js", "/** @providesModule Thing */"),
    ]);
    let graph = fixture.graph();

    let err = graph.load().await.unwrap_err();
    match err {
        GraphError::SymbolCollision { name, platform, .. } => {
            assert_eq!(name, "Thing");
            assert_eq!(platform, "generic");
        }
        other => panic!("expected collision, got {other}"),
    }
}

#[tokio::test]
async fn test_file_inside_named_package() {
    let fixture = Fixture::with_files(&[
        ("app/index.js", "require('fbjs/lib/warning');"),
        ("packages/fbjs/package.json", r#"{"name": "fbjs"}"#),
        ("packages/fbjs/lib/warning.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("app/index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["app/index.js", "packages/fbjs/lib/warning.js"]
    );
}

#[tokio::test]
async fn test_named_package_main() {
    let fixture = Fixture::with_files(&[
        ("app/index.js", "require('left');"),
        ("packages/left/package.json", r#"{"name": "left", "main": "./src/main"}"#),
        ("packages/left/src/main.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("app/index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["app/index.js", "packages/left/src/main.js"]
    );

    let main = &response.dependencies()[1];
    assert_eq!(main.name(graph.context()).await.unwrap(), "left");
}

#[tokio::test]
async fn test_node_modules_lookup() {
    let fixture = Fixture::with_files(&[
        ("src/a.js", "require('left-pad');"),
        ("node_modules/left-pad/package.json", r#"{"name": "left-pad", "main": "index.js"}"#),
        ("node_modules/left-pad/index.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("src/a.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec!["src/a.js", "node_modules/left-pad/index.js"]
    );

    // Packages under node_modules do not enter the global map
    assert!(graph.global_names().is_empty());
}

#[tokio::test]
async fn test_nearest_node_modules_wins() {
    let fixture = Fixture::with_files(&[
        ("node_modules/dep/index.js", "require('inner');"),
        ("node_modules/dep/node_modules/inner/index.js", ""),
        ("node_modules/inner/index.js", ""),
        ("index.js", "require('dep');"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    assert_eq!(
        relative_paths(&fixture.root, response.paths()),
        vec![
            "index.js",
            "node_modules/dep/index.js",
            "node_modules/dep/node_modules/inner/index.js"
        ]
    );
}

#[tokio::test]
async fn test_node_builtin_becomes_null_module() {
    let fixture = Fixture::with_files(&[("index.js", "require('path');")]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    let null = &response.dependencies()[1];
    assert!(null.is_null());
    assert_eq!(null.path(), Path::new("path_NULL"));
    assert_eq!(
        null.code(graph.context(), &Default::default()).await.unwrap(),
        "module.exports = null;"
    );
}

#[tokio::test]
async fn test_package_redirects() {
    let fixture = Fixture::with_files(&[
        (
            "package.json",
            r#"{"name": "app", "browser": {"./lib/server.js": "./lib/client.js", "fs": false}}"#,
        ),
        ("index.js", "require('./lib/server'); require('fs');"),
        ("lib/server.js", ""),
        ("lib/client.js", ""),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    let index = &response.dependencies()[0];
    let pairs = response.resolved_dependency_pairs(index);

    assert_eq!(pairs[0].name, "./lib/server");
    assert_eq!(
        pairs[0].module.as_ref().map(|m| m.path().to_path_buf()),
        Some(fixture.path("lib/client.js"))
    );
    assert_eq!(pairs[1].name, "fs");
    assert!(pairs[1].module.as_ref().is_some_and(|m| m.is_null()));
}

#[tokio::test]
async fn test_global_redirect_map() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('old-name'); require('analytics');"),
        ("new-name.js", ""),
    ]);
    let mut config = fixture.config();
    config
        .redirect
        .insert("old-name".into(), RedirectTarget::Module("./new-name".into()));
    config
        .redirect
        .insert("analytics".into(), RedirectTarget::Disabled(false));
    let graph = fixture.graph_with(config);

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    let paths = relative_paths(&fixture.root, response.paths());
    assert_eq!(paths[1], "new-name.js");
    assert!(response.dependencies()[2].is_null());
}

#[tokio::test]
async fn test_blacklisted_file_is_unresolved() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./generated/schema');"),
        ("generated/schema.js", ""),
    ]);
    let mut config = fixture.config();
    config.blacklist = vec!["**/generated/**".to_string()];
    let graph = fixture.graph_with(config);

    let errors = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen = errors.clone();
    let response = graph
        .get_dependencies(
            "index.js",
            DependencyOptions::default().on_error(move |e| seen.lock().push(e.to_string())),
        )
        .await
        .unwrap();

    assert_eq!(response.dependencies().len(), 1);
    assert_eq!(errors.lock().len(), 1);
}

#[tokio::test]
async fn test_detached_root_lookup() {
    let fixture = Fixture::with_files(&[("index.js", "require('shared-lib');")]);
    let shared = fixture.outside("shared");
    std::fs::create_dir_all(shared.join("shared-lib")).unwrap();
    std::fs::write(shared.join("shared-lib/index.js"), "").unwrap();

    let mut config = fixture.config();
    config.detached_roots = vec![shared.clone()];
    let graph = fixture.graph_with(config);

    let response = graph
        .get_dependencies("index.js", swallow())
        .await
        .unwrap();
    assert_eq!(
        response.dependencies()[1].path(),
        shared.join("shared-lib/index.js")
    );
}

#[tokio::test]
async fn test_asset_require() {
    let fixture = Fixture::with_files(&[
        ("index.js", "require('./img/icon.png');"),
        ("img/icon.png", "png"),
        ("img/icon@2x.png", "png"),
    ]);
    let graph = fixture.graph();

    let response = graph
        .get_dependencies("index.js", DependencyOptions::default())
        .await
        .unwrap();
    let asset = &response.dependencies()[1];
    assert!(asset.is_asset());
    match asset.kind() {
        ModuleKind::Asset(name) => assert_eq!(name.asset_name, "icon.png"),
        other => panic!("expected asset, got {other:?}"),
    }
    assert_eq!(asset.name(graph.context()).await.unwrap(), "img/icon.png");
}

#[tokio::test]
async fn test_asset_scale_rounds_up() {
    let fixture = Fixture::with_files(&[("img/icon.png", "1x"), ("img/icon@2x.png", "2x")]);
    let blacklist = Arc::new(Blacklist::platforms_only(&["ios", "android"]).unwrap());
    let tree = FileTree::new(
        Arc::new(TestRuntime::new(fixture.root.clone())),
        vec![Root::watched(&fixture.root)],
        ignore_predicate(&blacklist),
    );
    tree.build([fixture.path("img/icon.png"), fixture.path("img/icon@2x.png")]);

    let server = AssetServer::new(vec!["png".into()], vec!["ios".into(), "android".into()]);
    server.build(&tree);

    let selected = server
        .select(&fixture.path("img/icon@1.5x.png"), None)
        .unwrap();
    assert_eq!(selected, fixture.path("img/icon@2x.png"));
}
