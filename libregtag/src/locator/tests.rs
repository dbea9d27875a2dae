use super::*;
use crate::auth::{AnonymousResolver, StaticCredentialResolver};
use crate::endpoint::DefaultServiceDiscovery;
use crate::error::BoxError;

struct FailingResolver;

impl CredentialResolver for FailingResolver {
    fn lookup(&self, _domain: &str) -> Result<AuthContext, BoxError> {
        Err("keychain locked".into())
    }
}

struct FixedDiscovery(Vec<RegistryEndpoint>);

impl ServiceDiscovery for FixedDiscovery {
    fn lookup_endpoints(&self, _domain: &str) -> Result<Vec<RegistryEndpoint>, BoxError> {
        Ok(self.0.clone())
    }
}

struct FailingDiscovery;

impl ServiceDiscovery for FailingDiscovery {
    fn lookup_endpoints(&self, _domain: &str) -> Result<Vec<RegistryEndpoint>, BoxError> {
        Err("lookup failed".into())
    }
}

fn reference(s: &str) -> Reference {
    s.parse().unwrap()
}

#[test]
fn test_resolve_docker_hub_reference() {
    let locator = RepositoryLocator::new(
        Arc::new(AnonymousResolver),
        Arc::new(DefaultServiceDiscovery::default()),
    );

    let located = locator.resolve(&reference("alpine")).unwrap();

    assert!(located.auth.is_anonymous());
    assert_eq!(
        located.endpoints[0].url.as_str(),
        "https://registry-1.docker.io/"
    );
}

#[test]
fn test_resolve_uses_credentials_for_domain() {
    let credentials =
        StaticCredentialResolver::new().with("ghcr.io", AuthContext::basic("user", "token"));
    let locator = RepositoryLocator::new(
        Arc::new(credentials),
        Arc::new(DefaultServiceDiscovery::default()),
    );

    let located = locator.resolve(&reference("ghcr.io/team/app:v1")).unwrap();

    assert_eq!(located.auth, AuthContext::basic("user", "token"));
    assert_eq!(located.endpoints[0].url.as_str(), "https://ghcr.io/");
}

#[test]
fn test_failing_credentials_are_no_credentials() {
    let locator = RepositoryLocator::new(
        Arc::new(FailingResolver),
        Arc::new(DefaultServiceDiscovery::default()),
    );

    let err = locator.resolve(&reference("ghcr.io/team/app")).unwrap_err();

    match err {
        LocatorError::NoCredentials { domain, source } => {
            assert_eq!(domain, "ghcr.io");
            assert_eq!(source.to_string(), "keychain locked");
        }
        other => panic!("Expected NoCredentials, got {:?}", other),
    }
}

#[test]
fn test_empty_discovery_is_no_endpoints() {
    let locator =
        RepositoryLocator::new(Arc::new(AnonymousResolver), Arc::new(FixedDiscovery(vec![])));

    let err = locator.resolve(&reference("quay.io/app")).unwrap_err();

    assert!(matches!(
        err,
        LocatorError::NoEndpoints { source: None, .. }
    ));
}

#[test]
fn test_failing_discovery_is_no_endpoints() {
    let locator =
        RepositoryLocator::new(Arc::new(AnonymousResolver), Arc::new(FailingDiscovery));

    let err = locator.resolve(&reference("quay.io/app")).unwrap_err();

    assert!(matches!(
        err,
        LocatorError::NoEndpoints {
            source: Some(_),
            ..
        }
    ));
}

#[test]
fn test_endpoint_order_is_preserved() {
    let endpoints = vec![
        RegistryEndpoint::v2("https://a.example.com").unwrap(),
        RegistryEndpoint::v2("https://b.example.com").unwrap(),
    ];
    let locator = RepositoryLocator::new(
        Arc::new(AnonymousResolver),
        Arc::new(FixedDiscovery(endpoints.clone())),
    );

    let located = locator.resolve(&reference("example.com/app")).unwrap();

    assert_eq!(located.endpoints, endpoints);
}
