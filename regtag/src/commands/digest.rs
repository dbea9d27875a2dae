use crate::context::AppContext;
use crate::format::{self, Formattable, OutputFormat};
use libregtag::Regtag;
use serde::Serialize;

#[cfg(test)]
#[path = "digest_tests.rs"]
mod tests;

/// Digest a reference resolved to
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDigest {
    pub reference: String,
    pub digest: String,
}

impl Formattable for ResolvedDigest {
    fn format_pretty(&self) -> String {
        self.digest.clone()
    }
}

/// Handle the digest command
pub async fn handle_digest(
    ctx: &AppContext,
    reference: &str,
    format: OutputFormat,
) -> Result<String, String> {
    resolve_digest(&ctx.regtag, reference, format).await
}

async fn resolve_digest(
    regtag: &Regtag,
    reference: &str,
    format: OutputFormat,
) -> Result<String, String> {
    let digest = regtag
        .get_digest(reference)
        .await
        .map_err(|e| e.to_string())?;

    format::format_output(
        &ResolvedDigest {
            reference: reference.to_string(),
            digest: digest.to_string(),
        },
        format,
    )
}
