//! Larder CLI - manage an on-disk release collection

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use larder::{
    ArtifactSpec, Collection, CollectionConfig, CollectionOptions, CollectionPaths, Fetcher,
    Release, Rotation,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "larder",
    about = "Manage an on-disk release collection",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Collection root directory
    #[clap(long, global = true)]
    root: Option<PathBuf>,

    /// Configuration file (YAML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a new release composed of the given artifacts
    Add {
        /// Artifact specs as NAME@VERSION=URL
        specs: Vec<String>,

        /// YAML file holding a list of artifact specs
        #[clap(long)]
        spec_file: Option<PathBuf>,

        /// Number of previous releases to keep
        #[clap(long)]
        retention: Option<usize>,

        /// Keep orphaned artifacts instead of deleting them
        #[clap(long)]
        no_reap: bool,
    },

    /// List releases, newest first
    Releases {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// List stored artifacts no release references
    Orphans {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show the release the latest pointer refers to
    Latest {
        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },
}

/// Initialize tracing from the --log-level flag. Logs go to stderr so
/// stdout stays clean for --json output.
fn initialize_tracing(log_level: &LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_filter_directive()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level);

    let (paths, options) = resolve_collection(&cli)?;

    match cli.command {
        Command::Add {
            specs,
            spec_file,
            retention,
            no_reap,
        } => {
            let mut options = options;
            if let Some(keep) = retention {
                options.retention = keep;
            }
            if no_reap {
                options.reap = false;
            }
            add_command(paths, options, &specs, spec_file.as_deref())
        }
        Command::Releases { json } => releases_command(paths, options, json),
        Command::Orphans { json } => orphans_command(paths, options, json),
        Command::Latest { json } => latest_command(paths, options, json),
    }
}

/// Resolve layout and options from flags and the optional config file.
/// Flags win over file values; without either, the collection lives in
/// the current directory.
fn resolve_collection(cli: &Cli) -> Result<(CollectionPaths, CollectionOptions)> {
    let config = match &cli.config {
        Some(path) => {
            CollectionConfig::load(path).with_context(|| format!("Failed to load {path:?}"))?
        }
        None => CollectionConfig::default(),
    };

    let paths = match &cli.root {
        Some(root) => CollectionPaths::for_root(root),
        None => config.resolve_paths(Path::new(".")),
    };
    Ok((paths, config.options))
}

#[cfg(feature = "http")]
fn default_fetcher() -> Result<Box<dyn Fetcher>> {
    let fetcher = larder::HttpFetcher::new().context("Failed to build HTTP fetcher")?;
    Ok(Box::new(fetcher))
}

#[cfg(not(feature = "http"))]
fn default_fetcher() -> Result<Box<dyn Fetcher>> {
    bail!("This build has no HTTP transport. Rebuild with the http feature enabled.")
}

/// Parse `NAME@VERSION=URL` into an artifact spec.
fn parse_spec(raw: &str) -> Result<ArtifactSpec> {
    let (id, url) = raw
        .split_once('=')
        .with_context(|| format!("Invalid artifact spec {raw:?}: expected NAME@VERSION=URL"))?;
    let (name, version) = id
        .split_once('@')
        .with_context(|| format!("Invalid artifact spec {raw:?}: expected NAME@VERSION=URL"))?;
    let spec = ArtifactSpec::new(name, version, url);
    spec.validate()?;
    Ok(spec)
}

fn load_spec_file(path: &Path) -> Result<Vec<ArtifactSpec>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    let specs: Vec<ArtifactSpec> =
        serde_yaml_ng::from_str(&content).with_context(|| format!("Failed to parse {path:?}"))?;
    for spec in &specs {
        spec.validate()?;
    }
    Ok(specs)
}

fn add_command(
    paths: CollectionPaths,
    options: CollectionOptions,
    raw_specs: &[String],
    spec_file: Option<&Path>,
) -> Result<()> {
    let mut specs = Vec::new();
    if let Some(path) = spec_file {
        specs.extend(load_spec_file(path)?);
    }
    for raw in raw_specs {
        specs.push(parse_spec(raw)?);
    }
    if specs.is_empty() {
        bail!("No artifact specs given. Pass NAME@VERSION=URL arguments or --spec-file.");
    }

    let collection = Collection::open(paths, options);
    let fetcher = default_fetcher()?;
    let rotation = collection.add_release(&specs, fetcher.as_ref())?;
    print_rotation(&rotation);
    Ok(())
}

fn print_rotation(rotation: &Rotation) {
    println!(
        "Published release {} ({} artifacts)",
        rotation.release.sequence(),
        rotation.release.artifacts().len()
    );
    if !rotation.pruned.is_empty() {
        println!("Pruned {} stale manifest(s)", rotation.pruned.len());
    }
    if !rotation.reaped.is_empty() {
        println!("Reaped {} orphaned artifact(s)", rotation.reaped.len());
    }
    for error in &rotation.cleanup_errors {
        eprintln!("Warning: {error}");
    }
}

fn release_json(release: &Release) -> serde_json::Value {
    serde_json::json!({
        "sequence": release.sequence(),
        "created": release.created(),
        "path": release.path().display().to_string(),
        "artifacts": release.artifacts(),
    })
}

fn print_release_line(release: &Release) {
    println!(
        "{:>8}  {}  {} artifacts",
        release.sequence(),
        release.created(),
        release.artifacts().len()
    );
}

fn releases_command(paths: CollectionPaths, options: CollectionOptions, json: bool) -> Result<()> {
    let collection = Collection::open(paths, options);
    let releases = collection.releases()?;

    if json {
        let output: Vec<_> = releases.iter().map(release_json).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if releases.is_empty() {
        println!("No releases.");
    } else {
        for release in &releases {
            print_release_line(release);
        }
    }
    Ok(())
}

fn orphans_command(paths: CollectionPaths, options: CollectionOptions, json: bool) -> Result<()> {
    let collection = Collection::open(paths, options);
    let orphans = collection.orphans()?;

    if json {
        let output: Vec<_> = orphans
            .iter()
            .map(|artifact| {
                serde_json::json!({
                    "name": artifact.id.name,
                    "version": artifact.id.version,
                    "path": artifact.path.display().to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if orphans.is_empty() {
        println!("No orphaned artifacts.");
    } else {
        for artifact in &orphans {
            println!("{}  {}", artifact.id, artifact.path.display());
        }
    }
    Ok(())
}

fn latest_command(paths: CollectionPaths, options: CollectionOptions, json: bool) -> Result<()> {
    let collection = Collection::open(paths, options);
    let latest = collection.latest()?;

    if json {
        let output = match &latest {
            Some(release) => release_json(release),
            None => serde_json::Value::Null,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &latest {
            Some(release) => print_release_line(release),
            None => println!("No current release."),
        }
    }
    Ok(())
}
