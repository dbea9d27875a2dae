use crate::context::AppContext;
use crate::format::{self, Formattable, OutputFormat};
use libregtag::Regtag;
use serde::Serialize;

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;

/// Tags of one repository
#[derive(Debug, Clone, Serialize)]
pub struct TagList {
    pub reference: String,
    pub tags: Vec<String>,
}

impl Formattable for TagList {
    fn format_pretty(&self) -> String {
        self.tags.join("\n")
    }
}

/// Handle the tags command
pub async fn handle_tags(
    ctx: &AppContext,
    reference: &str,
    format: OutputFormat,
) -> Result<String, String> {
    list_tags(&ctx.regtag, reference, format).await
}

async fn list_tags(regtag: &Regtag, reference: &str, format: OutputFormat) -> Result<String, String> {
    let tags = regtag.get_tags(reference).await.map_err(|e| e.to_string())?;

    format::format_output(
        &TagList {
            reference: reference.to_string(),
            tags,
        },
        format,
    )
}
