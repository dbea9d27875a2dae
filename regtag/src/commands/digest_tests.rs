use super::*;

const DIGEST: &str = "sha256:c5b1261d6d3e43071626931fc004f70149baeba2c8ec672bd4f27761f8e1ad6b";

#[test]
fn test_pretty_prints_digest_only() {
    let resolved = ResolvedDigest {
        reference: "alpine:3.19".to_string(),
        digest: DIGEST.to_string(),
    };

    assert_eq!(resolved.format_pretty(), DIGEST);
}

#[tokio::test]
async fn test_pinned_reference_as_json() {
    let regtag = Regtag::new().unwrap();
    let reference = format!("alpine@{}", DIGEST);

    let output = resolve_digest(&regtag, &reference, OutputFormat::Json)
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(json["reference"], reference.as_str());
    assert_eq!(json["digest"], DIGEST);
}

#[tokio::test]
async fn test_invalid_reference_is_reported() {
    let regtag = Regtag::new().unwrap();

    let err = resolve_digest(&regtag, "Alpine", OutputFormat::Pretty)
        .await
        .unwrap_err();

    assert!(err.contains("Alpine"));
}
