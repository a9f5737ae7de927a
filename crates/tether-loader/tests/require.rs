// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! End-to-end loading through the script engine.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tether_engine::{Engine, Value};
use tether_loader::{Loader, LoaderConfig, LoaderError};

struct Project {
    dir: TempDir,
    engine: Engine,
}

impl Project {
    fn new() -> Self {
        let engine = Engine::new();
        engine.define_global("stats", Value::object());
        Self {
            dir: tempfile::tempdir().unwrap(),
            engine,
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, source: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        path
    }

    fn loader(&self, cwd: &str) -> Arc<Loader> {
        let cwd = self.path(cwd);
        fs::create_dir_all(&cwd).unwrap();
        Loader::with_engine(LoaderConfig::with_cwd(cwd), self.engine.clone())
    }

    fn runs(&self, key: &str) -> Value {
        self.engine.eval(&format!("stats['{}'];", key)).unwrap()
    }
}

fn get(value: &Value, key: &str) -> Value {
    value.as_object().expect("exports should be an object").get(key)
}

const COUNTING: &str = "stats[module.id] = (stats[module.id] || 0) + 1;\n";

#[test]
fn same_exports_instance_and_single_execution() {
    let project = Project::new();
    project.write("app/counter.js", &format!("{}exports.value = 42;", COUNTING));
    let loader = project.loader("app");

    let first = loader.require("./counter").unwrap();
    let second = loader.require("./counter").unwrap();
    let third = loader.require("./counter.js").unwrap();

    assert_eq!(get(&first, "value"), Value::Number(42.0));
    assert_eq!(first, second);
    assert_eq!(first, third);
    assert_eq!(project.runs("./counter"), Value::Number(1.0));
}

#[test]
fn relative_identifiers_follow_the_requiring_module() {
    let project = Project::new();
    project.write("a/b/m.js", "module.exports = require('./x');");
    project.write("a/b/x.js", "exports.where = 'a/b';");
    project.write("x.js", "exports.where = 'root';");
    let loader = project.loader(".");

    let exports = loader.require("./a/b/m").unwrap();
    assert_eq!(get(&exports, "where"), Value::from("a/b"));
    assert_eq!(loader.cache().context_depth(), 0);
}

#[test]
fn nested_relative_chain() {
    let project = Project::new();
    project.write("src/main.js", "exports.util = require('./lib/util').name;");
    project.write("src/lib/util.js", "exports.name = require('../shared/name').value;");
    project.write("src/shared/name.js", "exports.value = 'util';");
    let loader = project.loader("src");

    let exports = loader.require("./main").unwrap();
    assert_eq!(get(&exports, "util"), Value::from("util"));
    assert_eq!(loader.cache().len(), 3);
}

#[test]
fn file_beats_directory_index() {
    let project = Project::new();
    project.write("r/foo.js", "exports.kind = 'file';");
    project.write("r/foo/index.js", "exports.kind = 'index';");
    let loader = project.loader("r");

    assert_eq!(get(&loader.require("./foo").unwrap(), "kind"), Value::from("file"));
}

#[test]
fn manifest_main_entry() {
    let project = Project::new();
    project.write("r/pkg/package.json", r#"{"name": "pkg", "main": "lib/entry"}"#);
    project.write("r/pkg/lib/entry.js", "exports.kind = 'entry';");
    project.write("r/pkg/index.js", "exports.kind = 'index';");
    let loader = project.loader("r");

    assert_eq!(get(&loader.require("./pkg").unwrap(), "kind"), Value::from("entry"));
}

#[test]
fn ancestor_dependency_directory() {
    let project = Project::new();
    let foo = project.write("a/node_modules/foo.js", "exports.found = true;");
    let loader = project.loader("a/b/c");

    assert_eq!(get(&loader.require("foo").unwrap(), "found"), Value::Boolean(true));
    assert_eq!(loader.resolve("foo").unwrap(), foo);
}

#[test]
fn dependency_requires_its_own_files() {
    let project = Project::new();
    project.write(
        "app/node_modules/greet/package.json",
        r#"{"main": "./src/greet.js"}"#,
    );
    project.write(
        "app/node_modules/greet/src/greet.js",
        "var punctuation = require('./punctuation');\n\
         module.exports = function (name) { return 'hello ' + name + punctuation.mark; };",
    );
    project.write("app/node_modules/greet/src/punctuation.js", "exports.mark = '!';");
    project.write("app/main.js", "var greet = require('greet');\nexports.message = greet('world');");
    let loader = project.loader("app");

    let exports = loader.require("./main").unwrap();
    assert_eq!(get(&exports, "message"), Value::from("hello world!"));
}

#[test]
fn circular_requires_see_partial_exports() {
    let project = Project::new();
    project.write(
        "app/a.js",
        "exports.name = 'a';\n\
         var b = require('./b');\n\
         exports.bName = b.name;\n\
         exports.done = true;",
    );
    project.write(
        "app/b.js",
        "var a = require('./a');\n\
         exports.name = 'b';\n\
         exports.aNameAtLoad = a.name;\n\
         exports.aDoneAtLoad = a.done === true;\n\
         exports.a = a;",
    );
    let loader = project.loader("app");

    let a = loader.require("./a").unwrap();
    assert_eq!(get(&a, "bName"), Value::from("b"));
    assert_eq!(get(&a, "done"), Value::Boolean(true));

    let b = loader.require("./b").unwrap();
    assert_eq!(get(&b, "aNameAtLoad"), Value::from("a"));
    assert_eq!(get(&b, "aDoneAtLoad"), Value::Boolean(false));
    // b kept the placeholder, which is the object a finished filling in
    assert_eq!(get(&b, "a"), a);
    assert_eq!(get(&get(&b, "a"), "done"), Value::Boolean(true));
}

#[test]
fn circular_require_snapshot_then_replacement() {
    let project = Project::new();
    project.write(
        "app/a.js",
        "var b = require('./b');\n\
         module.exports = { value: 1 };",
    );
    project.write("app/b.js", "exports.snapshot = require('./a');");
    project.write("app/c.js", "module.exports = require('./a');");
    let loader = project.loader("app");

    let a = loader.require("./a").unwrap();
    assert_eq!(a.to_string(), "{ value: 1 }");

    let b = loader.require("./b").unwrap();
    let snapshot = get(&b, "snapshot");
    assert_eq!(snapshot.to_string(), "{}");
    assert_ne!(snapshot, a);

    let c = loader.require("./c").unwrap();
    assert_eq!(c, a);
    assert_eq!(get(&c, "value"), Value::Number(1.0));
}

#[test]
fn failure_is_not_cached() {
    let project = Project::new();
    project.write(
        "app/flaky.js",
        &format!(
            "{}if (stats['./flaky'] === 1) {{ throw 'not yet'; }}\nexports.ok = true;",
            COUNTING
        ),
    );
    let loader = project.loader("app");

    match loader.require("./flaky") {
        Err(LoaderError::Load { path, source }) => {
            assert_eq!(path, project.path("app/flaky.js"));
            assert!(source.to_string().contains("not yet"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!loader.cache().contains(&project.path("app/flaky.js")));

    let exports = loader.require("./flaky").unwrap();
    assert_eq!(get(&exports, "ok"), Value::Boolean(true));
    assert_eq!(project.runs("./flaky"), Value::Number(2.0));
}

#[test]
fn nested_failure_unwinds_every_level() {
    let project = Project::new();
    project.write("app/top.js", "exports.before = true;\nrequire('./middle');");
    project.write("app/middle.js", "require('./missing-module');");
    let loader = project.loader("app");

    let err = loader.require("./top").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        LoaderError::NotFound { identifier, .. } if identifier == "./missing-module"
    ));
    assert!(loader.cache().is_empty());
    assert_eq!(loader.cache().context_depth(), 0);
}

#[test]
fn syntax_error_is_a_load_error() {
    let project = Project::new();
    project.write("app/broken.js", "exports.x = ;");
    let loader = project.loader("app");

    assert!(matches!(
        loader.require("./broken"),
        Err(LoaderError::Load {
            source: tether_engine::Error::SyntaxError(_),
            ..
        })
    ));
}

#[test]
fn module_exports_replacement() {
    let project = Project::new();
    project.write(
        "app/fn.js",
        "module.exports = function double(n) { return n * 2; };",
    );
    project.write("app/use.js", "exports.result = require('./fn')(21);");
    let loader = project.loader("app");

    let exports = loader.require("./use").unwrap();
    assert_eq!(get(&exports, "result"), Value::Number(42.0));
    assert!(loader.require("./fn").unwrap().is_function());
}

#[test]
fn module_descriptor_fields() {
    let project = Project::new();
    let path = project.write(
        "app/lib/self.js",
        "exports.id = module.id;\nexports.path = module.path;\nexports.same = module.exports === exports;",
    );
    let loader = project.loader("app");

    let exports = loader.require("./lib/self").unwrap();
    assert_eq!(get(&exports, "id"), Value::from("./lib/self"));
    assert_eq!(get(&exports, "path"), Value::from(path.display().to_string()));
    assert_eq!(get(&exports, "same"), Value::Boolean(true));
}

#[test]
fn script_side_resolve() {
    let project = Project::new();
    let target = project.write("app/lib/target.js", "");
    project.write("app/lib/probe.js", "exports.resolved = require.resolve('./target');");
    let loader = project.loader("app");

    let exports = loader.require("./lib/probe").unwrap();
    assert_eq!(get(&exports, "resolved"), Value::from(target.display().to_string()));
    assert!(loader.cache().get(&target).is_none());
}

#[test]
fn require_paths_before_ancestors() {
    let project = Project::new();
    project.write("shared/config.js", "exports.from = 'shared';");
    project.write("app/node_modules/config.js", "exports.from = 'node_modules';");
    let loader = project.loader("app/sub");
    loader.add_path(project.path("shared"));

    assert_eq!(
        get(&loader.require("config").unwrap(), "from"),
        Value::from("shared")
    );
}

#[test]
fn native_addons_are_rejected() {
    let project = Project::new();
    project.write("app/addon.node", "\0binary");
    project.write("app/main.js", "require('./addon');");
    let loader = project.loader("app");

    assert!(matches!(
        loader.require("./addon.node"),
        Err(LoaderError::UnsupportedFormat { .. })
    ));
    assert!(matches!(
        loader.require("./main").unwrap_err().root_cause(),
        LoaderError::UnsupportedFormat { .. }
    ));
}

#[test]
fn manifest_main_cannot_name_a_native_addon() {
    let project = Project::new();
    project.write("app/pkg/package.json", r#"{"main": "addon.node"}"#);
    project.write("app/pkg/addon.node", "exports.ran = true;");
    let loader = project.loader("app");

    assert!(matches!(
        loader.require("./pkg"),
        Err(LoaderError::UnsupportedFormat { .. })
    ));
    assert!(loader.cache().is_empty());
}

#[test]
fn cache_delete_and_clear_force_reexecution() {
    let project = Project::new();
    let path = project.write("app/mod.js", COUNTING);
    let loader = project.loader("app");

    loader.require("./mod").unwrap();
    loader.cache().delete(&path);
    loader.require("./mod").unwrap();
    loader.cache().clear();
    loader.require("./mod").unwrap();

    assert_eq!(project.runs("./mod"), Value::Number(3.0));
}

#[test]
fn top_level_require_from_eval() {
    let project = Project::new();
    project.write("app/math.js", "exports.square = function (n) { return n * n; };");
    let loader = project.loader("app");
    project.engine.define_global("require", loader.require_function());

    let result = project.engine.eval("require('./math').square(9);").unwrap();
    assert_eq!(result, Value::Number(81.0));
}

#[test]
fn config_file_drives_resolution() {
    let project = Project::new();
    project.write(
        "app/tether.toml",
        "[loader]\ndependencies_dir = \"vendor\"\n",
    );
    project.write("app/vendor/dep.js", "exports.vendored = true;");
    let config = LoaderConfig::load(&project.path("app")).unwrap();
    let loader = Loader::with_engine(config, project.engine.clone());

    assert_eq!(get(&loader.require("dep").unwrap(), "vendored"), Value::Boolean(true));
    assert_eq!(loader.cwd(), project.path("app").as_path());
}

#[test]
fn loader_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Loader>();
}
