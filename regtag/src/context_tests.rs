use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_explicit_path_wins() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("regtag")).unwrap();
    fs::write(dir.path().join("regtag/config.yaml"), "").unwrap();

    let path = resolve_config_path(
        Some(Path::new("/etc/regtag.yaml")),
        Some(dir.path().to_path_buf()),
    );

    assert_eq!(path, Some(PathBuf::from("/etc/regtag.yaml")));
}

#[test]
fn test_default_location_used_when_present() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("regtag")).unwrap();
    fs::write(dir.path().join("regtag/config.yaml"), "tags:\n  page_size: 50\n").unwrap();

    let path = resolve_config_path(None, Some(dir.path().to_path_buf()));

    assert_eq!(path, Some(dir.path().join("regtag/config.yaml")));
}

#[test]
fn test_default_location_ignored_when_absent() {
    let dir = TempDir::new().unwrap();

    assert_eq!(resolve_config_path(None, Some(dir.path().to_path_buf())), None);
    assert_eq!(resolve_config_path(None, None), None);
}

#[test]
fn test_context_loads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "tags:\n  page_size: 50\n").unwrap();

    let ctx = AppContext::from_config_path(Some(path.clone())).unwrap();

    assert_eq!(ctx.config_path, Some(path));
    assert_eq!(ctx.regtag.config().tags.page_size, Some(50));
}

#[test]
fn test_context_reports_missing_config_file() {
    let dir = TempDir::new().unwrap();

    let err = AppContext::from_config_path(Some(dir.path().join("missing.yaml"))).unwrap_err();

    assert!(err.contains("missing.yaml"));
}

#[test]
fn test_context_without_config_uses_defaults() {
    let ctx = AppContext::from_config_path(None).unwrap();

    assert!(ctx.config_path.is_none());
    assert!(ctx.regtag.config().registries.v2_only);
}
