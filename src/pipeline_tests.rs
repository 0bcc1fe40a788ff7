//! End-to-end compile tests
//!
//! Projects are laid out in a temp dir the way a host app keeps them:
//! `package.json` at the root and components under `app/components`.

#[cfg(test)]
mod tests {
    use crate::error::{
        Result, ERR_CONFIGURATION_MISSING, ERR_MODULE_NOT_FOUND, ERR_NAMING_COLLISION,
    };
    use crate::manifest::{Manifest, MANIFEST_TYPE};
    use crate::options::{BundleMode, BundlerOptions, ServerAddress};
    use crate::package::ProjectMetadata;
    use crate::pipeline::{compile, write_compilation, BundlePlugin, Compilation};
    use crate::writer::{FsAssetWriter, MemoryAssetWriter};
    use std::fs;
    use tempfile::TempDir;

    const BASE_URL: &str = "http://localhost:4205";

    const BUTTON: &str = "import Component from '@glimmer/component';\n\nexport default class Button extends Component {\n  <template><button>{{@label}}</button></template>\n}\n";
    const WIDGET: &str = "import Button from 'ember-app-suite/components/button';\n\n<template>\n  <Button @label=\"Go\" />\n</template>\n";
    const PACKAGE_JSON: &str = r#"{ "name": "ember-app-suite", "version": "2.0.0", "peek-extensions": { "entry-point": "widget" } }"#;

    fn project(files: &[(&str, &str)], package_json: Option<&str>) -> (TempDir, BundlerOptions) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app/components");
        fs::create_dir_all(&root).unwrap();
        for (relative, source) in files {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, source).unwrap();
        }
        if let Some(package_json) = package_json {
            fs::write(dir.path().join("package.json"), package_json).unwrap();
        }
        let options = BundlerOptions {
            project_root: dir.path().to_path_buf(),
            ..BundlerOptions::default()
        };
        (dir, options)
    }

    fn widget_project() -> (TempDir, BundlerOptions) {
        project(&[("button.gjs", BUTTON), ("widget.gjs", WIDGET)], Some(PACKAGE_JSON))
    }

    fn compile_project(options: &BundlerOptions) -> Result<Compilation> {
        let metadata = ProjectMetadata::read(&options.package_json_path());
        compile(options, &metadata, BASE_URL)
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // SINGLE BUNDLE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_bundle() {
        let (_dir, options) = widget_project();
        let compilation = compile_project(&options).unwrap();

        let main = &compilation.manifest.main_dependency;
        assert_eq!(main.name, "ember-app-suite/components/widget");
        assert!(main.name.ends_with("widget"));
        assert_eq!(main.url, "http://localhost:4205/assets/extension-files/widget.gjs");
        assert_eq!(main.version, "2.0.0");
        assert_eq!(main.kind, MANIFEST_TYPE);
        assert!(compilation.manifest.dependencies.is_none());

        assert_eq!(compilation.modules, vec!["button.gjs", "widget.gjs"]);
        assert_eq!(compilation.assets.len(), 1);
        let bundle = &compilation.assets[0];
        assert_eq!(bundle.path, "widget.gjs");
        let button_at = bundle.contents.find("const Button = ").unwrap();
        let widget_at = bundle.contents.find("const Widget = ").unwrap();
        assert!(button_at < widget_at);
        assert_eq!(bundle.contents.matches("export default").count(), 1);
        assert!(bundle.contents.ends_with("export default Widget;\n"));
        assert!(compilation.warnings.is_empty());
    }

    #[test]
    fn test_single_bundle_shrunk() {
        let (_dir, mut options) = widget_project();
        options.shrink = true;
        let compilation = compile_project(&options).unwrap();
        assert_eq!(
            compilation.assets[0].contents,
            concat!(
                "import Component from '@glimmer/component'; ",
                "const Button=class extends Component{<template><button>{{@label}}</button></template>}; ",
                "const Widget=<template>\n  <Button @label=\"Go\" />\n</template>; ",
                "export default Widget;",
            )
        );
    }

    #[test]
    fn test_bundle_file_name() {
        let (_dir, mut options) = widget_project();
        options.bundle_file_name = Some("extension.js".to_string());
        let compilation = compile_project(&options).unwrap();
        assert_eq!(compilation.assets[0].path, "extension.js");
        assert_eq!(
            compilation.manifest.main_dependency.name,
            "ember-app-suite/components/widget"
        );
        assert!(compilation.manifest.main_dependency.url.ends_with("/extension.js"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PROJECT METADATA
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_missing_package_json_uses_defaults() {
        let (_dir, mut options) = project(&[("widget.gjs", "<template>hi</template>\n")], None);
        options.entry_point = Some("widget".to_string());
        let compilation = compile_project(&options).unwrap();
        assert_eq!(compilation.manifest.main_dependency.version, "0.0.0");
        assert_eq!(compilation.manifest.main_dependency.name, "app/components/widget");
    }

    #[test]
    fn test_malformed_package_json_does_not_fail() {
        let (_dir, mut options) =
            project(&[("widget.gjs", "<template>hi</template>\n")], Some("{ not json"));
        options.entry_point = Some("widget".to_string());
        let compilation = compile_project(&options).unwrap();
        assert_eq!(compilation.manifest.main_dependency.version, "0.0.0");
    }

    #[test]
    fn test_missing_entry_point_is_configuration_missing() {
        let (_dir, options) = project(
            &[("widget.gjs", "<template>hi</template>\n")],
            Some(r#"{ "name": "ember-app-suite" }"#),
        );
        let err = compile_project(&options).unwrap_err();
        assert_eq!(err.code, ERR_CONFIGURATION_MISSING);
        assert!(!err.hints.is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FAILURES AND WARNINGS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unresolvable_entry_halts() {
        let (_dir, mut options) = widget_project();
        options.entry_point = Some("nope".to_string());
        assert!(compile_project(&options).unwrap_err().is(ERR_MODULE_NOT_FOUND));
    }

    #[test]
    fn test_unresolved_dependency_only_warns() {
        let (_dir, options) = project(
            &[(
                "widget.gjs",
                "import Gone from 'ember-app-suite/components/gone';\n<template>hi</template>\n",
            )],
            Some(PACKAGE_JSON),
        );
        let compilation = compile_project(&options).unwrap();
        assert_eq!(compilation.modules, vec!["widget.gjs"]);
        assert_eq!(compilation.warnings.len(), 1);
        assert!(!compilation.assets[0].contents.contains("components/gone"));
    }

    #[test]
    fn test_naming_collision_halts() {
        let (_dir, options) = project(
            &[
                ("a-b.gjs", "<template>1</template>\n"),
                ("a/b.gjs", "<template>2</template>\n"),
                (
                    "widget.gjs",
                    "import X from 'ember-app-suite/components/a-b';\nimport Y from 'ember-app-suite/components/a/b';\n<template><X /><Y /></template>\n",
                ),
            ],
            Some(PACKAGE_JSON),
        );
        let err = compile_project(&options).unwrap_err();
        assert_eq!(err.code, ERR_NAMING_COLLISION);
        assert_eq!(err.paths, vec!["a-b.gjs".to_string(), "a/b.gjs".to_string()]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // OTHER MODES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_multi_mode_copies_reachable_modules() {
        let (_dir, mut options) = widget_project();
        options.mode = BundleMode::Multi;
        let compilation = compile_project(&options).unwrap();

        let deps = compilation.manifest.dependencies.clone().unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "ember-app-suite/components/button");
        assert_eq!(
            deps[0].url,
            "http://localhost:4205/assets/extension-files/button.gjs"
        );

        let assets: Vec<(&str, &str)> = compilation
            .assets
            .iter()
            .map(|a| (a.path.as_str(), a.contents.as_str()))
            .collect();
        assert_eq!(assets, vec![("button.gjs", BUTTON), ("widget.gjs", WIDGET)]);
    }

    #[test]
    fn test_mirror_mode_copies_every_component() {
        let (_dir, mut options) = project(
            &[
                ("button.gjs", BUTTON),
                ("widget.gjs", WIDGET),
                ("extra.gjs", "<template>unused</template>\n"),
            ],
            Some(PACKAGE_JSON),
        );
        options.mode = BundleMode::Mirror;
        let compilation = compile_project(&options).unwrap();

        let names: Vec<String> = compilation
            .manifest
            .dependencies
            .clone()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["./Button", "./Extra"]);
        assert_eq!(compilation.manifest.main_dependency.name, "./Widget");
        assert_eq!(compilation.assets.len(), 3);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // WRITING AND HOST LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_write_compilation_to_disk() {
        let (_dir, options) = widget_project();
        let compilation = compile_project(&options).unwrap();
        let mut writer = FsAssetWriter::new(options.output_dir_path());
        write_compilation(&mut writer, &compilation).unwrap();

        let out = options.output_dir_path();
        let manifest = fs::read_to_string(out.join("manifest.json")).unwrap();
        assert!(manifest.starts_with("{\n  \"mainDependency\": {\n    \"name\": "));
        let parsed: Manifest = serde_json::from_str(&manifest).unwrap();
        assert_eq!(parsed, compilation.manifest);
        assert_eq!(
            fs::read_to_string(out.join("widget.gjs")).unwrap(),
            compilation.assets[0].contents
        );
    }

    #[test]
    fn test_repeated_triggers_write_identical_output() {
        let (_dir, options) = widget_project();
        let mut plugin = BundlePlugin::new(options, MemoryAssetWriter::default());
        plugin.build_start().unwrap();
        plugin.build_start().unwrap();

        let assets = &plugin.writer().assets;
        assert_eq!(assets.len(), 4);
        assert_eq!(assets[0..2], assets[2..4]);
        assert_eq!(assets[1].0, "manifest.json");
    }

    #[test]
    fn test_server_listening_sets_base_url() {
        let (_dir, options) = widget_project();
        let mut plugin = BundlePlugin::new(options, MemoryAssetWriter::default());
        assert_eq!(plugin.base_url(), BASE_URL);

        let address = ServerAddress {
            https: false,
            host: Some("::1".to_string()),
            port: Some(5173),
        };
        let compilation = plugin.server_listening(&address).unwrap();
        assert_eq!(
            compilation.manifest.main_dependency.url,
            "http://localhost:5173/assets/extension-files/widget.gjs"
        );
        assert_eq!(plugin.base_url(), "http://localhost:5173");
    }

    #[test]
    fn test_file_changed_only_under_module_root() {
        let (dir, options) = widget_project();
        let root = options.modules_root_path();
        let mut plugin = BundlePlugin::new(options, MemoryAssetWriter::default());

        assert!(plugin
            .file_changed(&dir.path().join("package.json"))
            .unwrap()
            .is_none());
        assert!(plugin.writer().assets.is_empty());

        assert!(plugin.file_changed(&root.join("button.gjs")).unwrap().is_some());
        assert_eq!(plugin.writer().assets.len(), 2);
        assert!(plugin.last_compilation().is_some());
    }

    #[test]
    fn test_failed_compile_writes_nothing() {
        let (_dir, mut options) = widget_project();
        options.entry_point = Some("nope".to_string());
        let out = options.output_dir_path();
        let mut plugin = BundlePlugin::new(options, FsAssetWriter::new(&out));

        assert!(plugin.build_start().is_err());
        assert!(!out.exists());
        assert!(plugin.last_compilation().is_none());
    }
}
