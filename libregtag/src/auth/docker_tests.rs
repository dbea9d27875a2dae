use super::*;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

#[cfg(unix)]
fn write_helper(dir: &Path, name: &str, script: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("docker-credential-{}", name));
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_parse_docker_config() {
    let json = r#"{
        "auths": {
            "ghcr.io": { "auth": "dXNlcjpwYXNz" },
            "https://index.docker.io/v1/": { "identitytoken": "refresh" }
        },
        "credsStore": "desktop",
        "credHelpers": { "gcr.io": "gcloud" }
    }"#;

    let config = DockerConfig::from_json(json, Path::new("config.json")).unwrap();

    assert_eq!(config.auths.len(), 2);
    assert_eq!(config.creds_store.as_deref(), Some("desktop"));
    assert_eq!(config.cred_helpers.get("gcr.io").map(String::as_str), Some("gcloud"));
}

#[test]
fn test_missing_config_is_anonymous() {
    let dir = TempDir::new().unwrap();
    let resolver =
        DockerCredentialResolver::new().with_config_path(dir.path().join("missing.json"));

    let auth = resolver.lookup("ghcr.io").unwrap();

    assert!(auth.is_anonymous());
}

#[test]
fn test_malformed_config_is_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "{ not json");
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    let err = resolver.lookup("ghcr.io").unwrap_err();

    assert!(err.to_string().contains("failed to parse"));
}

#[test]
fn test_auth_entry_decodes_basic_credentials() {
    let dir = TempDir::new().unwrap();
    // "user:pass"
    let path = write_config(&dir, r#"{"auths": {"ghcr.io": {"auth": "dXNlcjpwYXNz"}}}"#);
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    let auth = resolver.lookup("ghcr.io").unwrap();

    assert_eq!(auth, AuthContext::basic("user", "pass"));
}

#[test]
fn test_auth_entry_matches_scheme_prefixed_key() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"auths": {"https://registry.example.com": {"username": "alice", "password": "secret"}}}"#,
    );
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    let auth = resolver.lookup("registry.example.com").unwrap();

    assert_eq!(auth, AuthContext::basic("alice", "secret"));
}

#[test]
fn test_docker_hub_uses_index_key() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"{"auths": {"https://index.docker.io/v1/": {"identitytoken": "refresh-token"}}}"#,
    );
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    let auth = resolver.lookup("docker.io").unwrap();

    assert_eq!(auth, AuthContext::identity_token("refresh-token"));
}

#[test]
fn test_unknown_domain_is_anonymous() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"auths": {"ghcr.io": {"auth": "dXNlcjpwYXNz"}}}"#);
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    assert!(resolver.lookup("quay.io").unwrap().is_anonymous());
}

#[test]
fn test_empty_auth_entry_is_anonymous() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"auths": {"ghcr.io": {}}}"#);
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    assert!(resolver.lookup("ghcr.io").unwrap().is_anonymous());
}

#[test]
fn test_auth_without_separator_is_error() {
    let dir = TempDir::new().unwrap();
    // "nocolon"
    let path = write_config(&dir, r#"{"auths": {"ghcr.io": {"auth": "bm9jb2xvbg=="}}}"#);
    let resolver = DockerCredentialResolver::new().with_config_path(path);

    let err = resolver.lookup("ghcr.io").unwrap_err();

    assert!(err.to_string().contains("malformed credentials"));
}

#[test]
fn test_normalize_server() {
    assert_eq!(normalize_server("https://index.docker.io/v1/"), "index.docker.io");
    assert_eq!(normalize_server("docker.io"), "index.docker.io");
    assert_eq!(normalize_server("http://localhost:5000"), "localhost:5000");
    assert_eq!(normalize_server("ghcr.io"), "ghcr.io");
}

#[cfg(unix)]
#[test]
fn test_cred_helper_supplies_credentials() {
    let dir = TempDir::new().unwrap();
    write_helper(
        dir.path(),
        "test",
        "#!/bin/sh\nread server\necho \"{\\\"ServerURL\\\":\\\"$server\\\",\\\"Username\\\":\\\"helper-user\\\",\\\"Secret\\\":\\\"helper-secret\\\"}\"\n",
    );
    let path = write_config(&dir, r#"{"credHelpers": {"ghcr.io": "test"}}"#);
    let resolver = DockerCredentialResolver::new()
        .with_config_path(path)
        .with_helper_dir(dir.path());

    let auth = resolver.lookup("ghcr.io").unwrap();

    assert_eq!(auth, AuthContext::basic("helper-user", "helper-secret"));
}

#[cfg(unix)]
#[test]
fn test_cred_helper_token_username_is_identity_token() {
    let dir = TempDir::new().unwrap();
    write_helper(
        dir.path(),
        "store",
        "#!/bin/sh\necho '{\"Username\":\"<token>\",\"Secret\":\"refresh\"}'\n",
    );
    let path = write_config(&dir, r#"{"credsStore": "store"}"#);
    let resolver = DockerCredentialResolver::new()
        .with_config_path(path)
        .with_helper_dir(dir.path());

    let auth = resolver.lookup("docker.io").unwrap();

    assert_eq!(auth, AuthContext::identity_token("refresh"));
}

#[cfg(unix)]
#[test]
fn test_cred_helper_not_found_falls_back_to_auths() {
    let dir = TempDir::new().unwrap();
    write_helper(
        dir.path(),
        "store",
        "#!/bin/sh\necho 'credentials not found in native keychain'\nexit 1\n",
    );
    let path = write_config(
        &dir,
        r#"{"credsStore": "store", "auths": {"ghcr.io": {"auth": "dXNlcjpwYXNz"}}}"#,
    );
    let resolver = DockerCredentialResolver::new()
        .with_config_path(path)
        .with_helper_dir(dir.path());

    let auth = resolver.lookup("ghcr.io").unwrap();

    assert_eq!(auth, AuthContext::basic("user", "pass"));
}

#[cfg(unix)]
#[test]
fn test_failing_cred_helper_is_error() {
    let dir = TempDir::new().unwrap();
    write_helper(dir.path(), "broken", "#!/bin/sh\necho 'keychain locked' >&2\nexit 2\n");
    let path = write_config(&dir, r#"{"credHelpers": {"ghcr.io": "broken"}}"#);
    let resolver = DockerCredentialResolver::new()
        .with_config_path(path)
        .with_helper_dir(dir.path());

    let err = resolver.lookup("ghcr.io").unwrap_err();

    assert!(err.to_string().contains("docker-credential-broken"));
}

#[test]
fn test_missing_cred_helper_binary_is_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, r#"{"credHelpers": {"ghcr.io": "absent"}}"#);
    let resolver = DockerCredentialResolver::new()
        .with_config_path(path)
        .with_helper_dir(dir.path());

    assert!(resolver.lookup("ghcr.io").is_err());
}
