use super::*;
use crate::auth::{AnonymousResolver, AuthContext};
use crate::endpoint::{ApiVersion, RegistryEndpoint, TlsPolicy};
use crate::error::{BoxError, LocatorError, ParseError, ProbeError, SessionError};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::ThreadId;

const DIGEST: &str = "sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b";

/// Discovery returning fixed endpoints and counting lookups.
#[derive(Clone, Default)]
struct CountingDiscovery {
    endpoints: Vec<RegistryEndpoint>,
    calls: Arc<AtomicUsize>,
}

impl CountingDiscovery {
    fn new(endpoints: Vec<RegistryEndpoint>) -> Self {
        Self {
            endpoints,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ServiceDiscovery for CountingDiscovery {
    fn lookup_endpoints(&self, _domain: &str) -> std::result::Result<Vec<RegistryEndpoint>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.endpoints.clone())
    }
}

struct FailingResolver;

impl CredentialResolver for FailingResolver {
    fn lookup(&self, _domain: &str) -> std::result::Result<AuthContext, BoxError> {
        Err("credential helper crashed".into())
    }
}

/// Resolver remembering the thread it was called on.
#[derive(Clone, Default)]
struct ThreadRecordingResolver {
    thread: Arc<Mutex<Option<ThreadId>>>,
}

impl CredentialResolver for ThreadRecordingResolver {
    fn lookup(&self, _domain: &str) -> std::result::Result<AuthContext, BoxError> {
        *self.thread.lock().unwrap() = Some(std::thread::current().id());
        Ok(AuthContext::Anonymous)
    }
}

fn regtag_with(discovery: CountingDiscovery) -> Regtag {
    Regtag::builder()
        .with_credential_resolver(AnonymousResolver)
        .with_service_discovery(discovery)
        .build()
        .unwrap()
}

fn local(server: &mockito::Server) -> RegistryEndpoint {
    RegistryEndpoint::new(&server.url(), ApiVersion::V2, TlsPolicy::Plaintext).unwrap()
}

async fn v2_server() -> (mockito::ServerGuard, mockito::Mock) {
    let mut server = mockito::Server::new_async().await;
    let handshake = server
        .mock("GET", "/v2/")
        .with_status(200)
        .with_header("Docker-Distribution-API-Version", "registry/2.0")
        .create_async()
        .await;
    (server, handshake)
}

#[test]
fn test_regtag_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Regtag>();
}

#[test]
fn test_builder_uses_given_config() {
    let mut config = Config::default();
    config.tags.page_size = Some(10);

    let regtag = Regtag::builder().with_config(config).build().unwrap();

    assert_eq!(regtag.config().tags.page_size, Some(10));
}

#[test]
fn test_builder_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    let err = Regtag::builder()
        .with_config_file(dir.path().join("missing.yaml"))
        .build()
        .unwrap_err();

    assert!(matches!(err, RegtagError::Config { .. }));
}

#[tokio::test]
async fn test_digest_reference_needs_no_network() {
    let discovery = CountingDiscovery::default();
    let regtag = regtag_with(discovery.clone());

    let digest = regtag
        .get_digest(&format!("library/alpine@{}", DIGEST))
        .await
        .unwrap();

    assert_eq!(digest.to_string(), DIGEST);
    assert_eq!(discovery.calls(), 0);
}

#[tokio::test]
async fn test_tagged_reference_cannot_list_tags() {
    let discovery = CountingDiscovery::default();
    let regtag = regtag_with(discovery.clone());

    let err = regtag.get_tags("library/alpine:1.0").await.unwrap_err();

    assert!(matches!(err, RegtagError::InvalidInput { .. }));
    assert_eq!(discovery.calls(), 0);
}

#[tokio::test]
async fn test_bare_reference_resolves_latest() {
    let (mut server, _handshake) = v2_server().await;
    let manifest = server
        .mock("HEAD", "/v2/library/alpine/manifests/latest")
        .with_status(200)
        .with_header("Docker-Content-Digest", DIGEST)
        .create_async()
        .await;
    let discovery = CountingDiscovery::new(vec![local(&server)]);
    let regtag = regtag_with(discovery.clone());

    let digest = regtag.get_digest("library/alpine").await.unwrap();

    manifest.assert_async().await;
    assert_eq!(digest.to_string(), DIGEST);
    assert_eq!(discovery.calls(), 1);
}

#[tokio::test]
async fn test_explicit_tag_is_resolved() {
    let (mut server, _handshake) = v2_server().await;
    let manifest = server
        .mock("HEAD", "/v2/library/alpine/manifests/3.19")
        .with_status(200)
        .with_header("Docker-Content-Digest", DIGEST)
        .create_async()
        .await;
    let regtag = regtag_with(CountingDiscovery::new(vec![local(&server)]));

    regtag.get_digest("alpine:3.19").await.unwrap();

    manifest.assert_async().await;
}

#[tokio::test]
async fn test_get_tags_end_to_end() {
    let (mut server, _handshake) = v2_server().await;
    let _tags = server
        .mock("GET", "/v2/team/app/tags/list")
        .with_status(200)
        .with_body(r#"{"name":"team/app","tags":["v1","v2"]}"#)
        .create_async()
        .await;
    let regtag = regtag_with(CountingDiscovery::new(vec![local(&server)]));

    let tags = regtag.get_tags("registry.example.com/team/app").await.unwrap();

    assert_eq!(tags, vec!["v1", "v2"]);
}

#[tokio::test]
async fn test_digest_only_reference_lists_tags() {
    let (mut server, _handshake) = v2_server().await;
    let _tags = server
        .mock("GET", "/v2/library/alpine/tags/list")
        .with_status(200)
        .with_body(r#"{"name":"library/alpine","tags":["latest"]}"#)
        .create_async()
        .await;
    let regtag = regtag_with(CountingDiscovery::new(vec![local(&server)]));

    let tags = regtag
        .get_tags(&format!("alpine@{}", DIGEST))
        .await
        .unwrap();

    assert_eq!(tags, vec!["latest"]);
}

#[tokio::test]
async fn test_missing_tag_is_session_error() {
    let (mut server, _handshake) = v2_server().await;
    let _manifest = server
        .mock("HEAD", "/v2/library/alpine/manifests/0.0")
        .with_status(404)
        .create_async()
        .await;
    let regtag = regtag_with(CountingDiscovery::new(vec![local(&server)]));

    let err = regtag.get_digest("alpine:0.0").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Session(SessionError::TagNotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_reference_is_parse_error() {
    let regtag = regtag_with(CountingDiscovery::default());

    let err = regtag.get_digest("Alpine").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Parse(ParseError::InvalidName { .. })
    ));
}

#[tokio::test]
async fn test_failing_credentials_stop_before_discovery() {
    let discovery = CountingDiscovery::default();
    let regtag = Regtag::builder()
        .with_credential_resolver(FailingResolver)
        .with_service_discovery(discovery.clone())
        .build()
        .unwrap();

    let err = regtag.get_digest("ghcr.io/team/app").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Locator(LocatorError::NoCredentials { .. })
    ));
    assert_eq!(discovery.calls(), 0);
}

#[tokio::test]
async fn test_no_endpoints_is_locator_error() {
    let regtag = regtag_with(CountingDiscovery::default());

    let err = regtag.get_digest("ghcr.io/team/app").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Locator(LocatorError::NoEndpoints { .. })
    ));
}

#[tokio::test]
async fn test_only_v1_endpoints_is_probe_error() {
    let legacy =
        RegistryEndpoint::new("http://127.0.0.1:1", ApiVersion::V1, TlsPolicy::Plaintext)
            .unwrap();
    let regtag = regtag_with(CountingDiscovery::new(vec![legacy]));

    let err = regtag.get_digest("ghcr.io/team/app").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Probe(ProbeError::NoV2Endpoint { candidates: 1 })
    ));
}

#[tokio::test]
async fn test_credential_lookup_runs_off_the_async_thread() {
    let resolver = ThreadRecordingResolver::default();
    let regtag = Regtag::builder()
        .with_credential_resolver(resolver.clone())
        .with_service_discovery(CountingDiscovery::default())
        .build()
        .unwrap();

    let err = regtag.get_digest("ghcr.io/team/app").await.unwrap_err();

    assert!(matches!(
        err,
        RegtagError::Locator(LocatorError::NoEndpoints { .. })
    ));
    let lookup_thread = resolver.thread.lock().unwrap().expect("lookup was called");
    assert_ne!(lookup_thread, std::thread::current().id());
}
