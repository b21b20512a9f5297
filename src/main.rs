//! Drupal-to-WXR Migration Tool - Main Entry Point
//!
//! Loads a Drupal site snapshot, runs the conversion, and writes the WXR
//! export. The actual implementation is in the `drupal2wxr` library.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

use drupal2wxr::{CommentImport, Converter, DrupalSource, Options, Snapshot, load_comment_import};

/// Migrate a Drupal 6 site snapshot into a WordPress WXR import file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the Drupal site snapshot (TOML)
    snapshot: PathBuf,

    /// Path of the WXR file to write
    output: PathBuf,

    /// Base URL of the Drupal site, e.g. http://example.org
    #[arg(long)]
    base_url: Url,

    /// Export language (defaults to the site's locale)
    #[arg(long)]
    lang: Option<String>,

    /// Leave comments open on migrated posts
    #[arg(long)]
    comments_open: bool,

    /// Leave pings open on migrated posts
    #[arg(long)]
    pings_open: bool,

    /// Disqus comments export (XML) to merge into the migration
    #[arg(long)]
    disqus_comments: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Check if no arguments were provided (except the program name)
    if std::env::args().len() == 1 {
        // No arguments provided, show help and exit with error code
        let mut cmd = Args::command();
        cmd.print_help().ok();
        println!(); // Add a newline after help
        std::process::exit(2);
    }

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let snapshot = Snapshot::load(&args.snapshot)?;
    let comment_import = match &args.disqus_comments {
        Some(path) => load_comment_import(path)?,
        None => CommentImport::new(),
    };
    let source = DrupalSource::new(snapshot, &args.base_url, comment_import);

    let out = File::create(&args.output)
        .with_context(|| format!("unable to create output file {}", args.output.display()))?;

    let opts = Options {
        base_url: args.base_url,
        lang: args.lang,
        comments_open: args.comments_open,
        pings_open: args.pings_open,
    };
    let mut converter = Converter::new(BufWriter::new(out), &source, &opts);
    let outcome = converter.run();
    converter.log().write_index();

    if let Err(err) = outcome {
        bail!("conversion aborted, output is incomplete: {err}");
    }
    Ok(())
}
