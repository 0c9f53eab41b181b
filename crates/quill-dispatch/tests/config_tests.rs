//! Loading `quill.toml` from disk

use std::fs;

use quill_dispatch::{ConfigError, DispatchBuilder, QuillConfig};
use quill_hierarchy::{ClassEntity, ClassKind, ClassRegistry};
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quill.toml");
    fs::write(
        &path,
        r#"
[analysis]
all_volatile = true
dynamic_classes = ["Plugin"]

[dispatch]
enable_eval = true
id_prefix = "__"

[dispatch.naming]
class = "k_"
"#,
    )
    .unwrap();

    let config = QuillConfig::load(&path).unwrap();
    assert!(config.analysis.all_volatile);
    assert!(config.analysis.is_dynamic_class("plugin"));
    assert!(config.dispatch.enable_eval);
    assert_eq!(config.dispatch.id_prefix, "__");
    assert_eq!(config.dispatch.naming.class, "k_");
    assert_eq!(config.dispatch.naming.object, "o_");
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = QuillConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_invalid_rounds_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quill.toml");
    fs::write(&path, "[analysis]\nmax_resolution_rounds = 0\n").unwrap();
    assert!(matches!(QuillConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_loaded_config_drives_generation() {
    let config = QuillConfig::from_toml_str("[dispatch.naming]\nclass = \"k_\"\n").unwrap();
    let mut registry = ClassRegistry::with_options(config.analysis.clone());
    registry.declare_class(ClassEntity::new(ClassKind::NormalClass, "Widget", None, &[] as &[&str]).unwrap());
    registry.resolve();

    let out = DispatchBuilder::new(&registry, &config.dispatch).render_all();
    assert!(out.contains("k_Widget::o_invoke"));
    assert!(!out.contains("c_Widget::"));
}

#[test]
fn test_config_serializes_back() {
    let config = QuillConfig::default();
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["dispatch"]["id_prefix"], "$$");
    assert_eq!(json["analysis"]["max_resolution_rounds"], 64);
}
