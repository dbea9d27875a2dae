//! Basic usage example for the regtag library.
//!
//! Lists the tags of a repository and resolves a tag to its digest.
//!
//! Run with: cargo run --example basic_usage -- library/alpine

use libregtag::Regtag;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let repository = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "library/alpine".to_string());

    libregtag::init(std::env::var_os("REGTAG_DEBUG").is_some())?;
    let regtag = Regtag::new()?;

    println!("Fetching tags for '{}'...", repository);
    match regtag.get_tags(&repository).await {
        Ok(tags) => {
            println!("✓ Found {} tags", tags.len());
            for tag in tags.iter().take(10) {
                println!("  - {}", tag);
            }
            if tags.len() > 10 {
                println!("  ... and {} more", tags.len() - 10);
            }
        }
        Err(e) => {
            eprintln!("✗ Failed to list tags: {}", e);
            return Ok(());
        }
    }

    println!("\nResolving '{}' (latest)...", repository);
    match regtag.get_digest(&repository).await {
        Ok(digest) => println!("✓ {}", digest),
        Err(e) => eprintln!("✗ Failed to resolve digest: {}", e),
    }

    Ok(())
}
