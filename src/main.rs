//! Camli CLI - content-addressed blob server client

use camli::cli;
use camli::prelude::*;
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camli")]
#[command(author, version, about = "Content-addressed blob server client", long_about = None)]
struct Cli {
    /// Server base URL (overrides config file and CAMLI_SERVER)
    #[arg(long, short, global = true)]
    server: Option<String>,

    /// Config file (default: ~/.camli/config.toml)
    #[arg(long, global = true, env = "CAMLI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the blobref of a local file
    Hash {
        /// File to hash
        file: PathBuf,
        /// Hash algorithm
        #[arg(long, short, default_value = "sha1", value_parser = algorithm_parser())]
        algorithm: HashAlgorithm,
    },
    /// Fetch a blob
    Get {
        /// Blobref
        blob_ref: String,
        /// Output path (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Check the content against the blobref
        #[arg(long)]
        verify: bool,
    },
    /// Upload files as blobs
    Put {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Report which blobs the server has
    Stat {
        /// Blobrefs to check
        #[arg(required = true)]
        blob_refs: Vec<String>,
    },
    /// Check whether one blob exists
    Exists {
        /// Blobref
        blob_ref: String,
    },
    /// List blobs on the server
    Enumerate {
        /// Stop after this many blobs
        #[arg(long, short)]
        limit: Option<usize>,
    },
    /// Run a search query
    Search {
        /// Search expression
        expression: String,
    },
    /// Describe a blob from the index
    Describe {
        /// Blobref
        blob_ref: String,
    },
    /// List the claims on a permanode
    Claims {
        /// Permanode blobref
        permanode: String,
    },
    /// Show the roots the server advertises
    Discover,
}

/// Accepts exactly the algorithm names used in blobref prefixes.
fn algorithm_parser() -> impl TypedValueParser<Value = HashAlgorithm> {
    PossibleValuesParser::new(HashAlgorithm::ALL.map(|a| a.name()))
        .try_map(|name| name.parse::<HashAlgorithm>())
}

fn main() -> ExitCode {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: Cli) -> camli::Result<()> {
    if let Commands::Hash { file, algorithm } = &args.command {
        println!("{}", cli::handle_hash(file, *algorithm)?);
        return Ok(());
    }

    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server = Some(server);
    }
    let conn = camli::connect_with_config(config.require_server()?, &config)?;

    match args.command {
        Commands::Hash { .. } => {}
        Commands::Get {
            blob_ref,
            output,
            verify,
        } => {
            let blob_ref = cli::parse_blob_ref(&blob_ref)?;
            let data = cli::handle_get(conn.blobs(), &blob_ref, verify)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    eprintln!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => std::io::stdout().lock().write_all(&data)?,
            }
        }
        Commands::Put { files } => {
            let results = cli::handle_put(conn.blobs(), &files)?;
            print!("{}", cli::format_put(&results));
        }
        Commands::Stat { blob_refs } => {
            let refs = blob_refs
                .iter()
                .map(|r| cli::parse_blob_ref(r))
                .collect::<camli::Result<Vec<_>>>()?;
            let stat = conn.blobs().stat_multi(&refs)?;
            print!("{}", cli::format_stat(&refs, &stat));
        }
        Commands::Exists { blob_ref } => {
            let blob_ref = cli::parse_blob_ref(&blob_ref)?;
            let exists = conn.blobs().exists(&blob_ref)?;
            println!("{}", if exists { "yes" } else { "no" });
        }
        Commands::Enumerate { limit } => {
            let entries = cli::handle_enumerate(conn.blobs(), limit)?;
            print!("{}", cli::format_enumerate(&entries));
        }
        Commands::Search { expression } => {
            let results = conn.search().query(&expression)?;
            print!("{}", cli::format_search_results(&results));
        }
        Commands::Describe { blob_ref } => {
            let blob_ref = cli::parse_blob_ref(&blob_ref)?;
            let desc = conn.search().describe_blob(&blob_ref)?;
            print!("{}", cli::format_description(&desc));
        }
        Commands::Claims { permanode } => {
            let permanode = cli::parse_blob_ref(&permanode)?;
            let claims = cli::handle_claims(conn.search(), &permanode)?;
            print!("{}", cli::format_claims(&claims));
        }
        Commands::Discover => print!("{}", cli::format_connection(&conn)),
    }

    Ok(())
}
