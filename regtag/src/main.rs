use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod context;
mod format;

use context::AppContext;
use format::{ColorChoice, OutputFormat};

/// Regtag - Container Image Reference Resolver
///
/// Lists the tags of an image repository or resolves an image reference to
/// its content digest.
#[derive(Parser, Debug)]
#[command(name = "regtag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log every resolution step to stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Path to a YAML configuration file
    #[arg(long, global = true, env = "REGTAG_CONFIG")]
    config: Option<PathBuf>,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the tags of an image repository
    Tags {
        /// Image reference without a tag (e.g. alpine, ghcr.io/org/app)
        reference: String,
        /// Output format: pretty, json
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Resolve an image reference to its content digest
    Digest {
        /// Image reference (name, name:tag or name@digest)
        reference: String,
        /// Output format: pretty, json
        #[arg(short, long, default_value = "pretty")]
        format: String,
    },
    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let formatter = format::create_formatter(ColorChoice::from(cli.color.as_str()));

    if let Commands::Completion { shell } = cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = libregtag::init(cli.debug) {
        formatter.error(&e.to_string());
        std::process::exit(1);
    }

    let ctx = match AppContext::build(cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            formatter.error(&e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Tags { reference, format } => {
            commands::tags::handle_tags(&ctx, &reference, OutputFormat::from(format.as_str()))
                .await
        }
        Commands::Digest { reference, format } => {
            commands::digest::handle_digest(&ctx, &reference, OutputFormat::from(format.as_str()))
                .await
        }
        Commands::Completion { .. } => Ok(String::new()),
    };

    match result {
        Ok(output) if output.is_empty() => {}
        Ok(output) => println!("{}", output),
        Err(e) => {
            formatter.error(&e);
            std::process::exit(1);
        }
    }
}
