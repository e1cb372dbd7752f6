use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use nufeed::config::{self, SourceDescriptor};
use nufeed::package::PackageIdentifier;
use nufeed::source::Source;
use nufeed::updates::UpdateOptions;

/// nufeed - package metadata resolver
///
/// Query local .nupkg directories and remote catalog feeds for package
/// metadata and available updates.
///
/// Examples:
///   nufeed --path /var/packages search json
///   nufeed --path https://feed.example.com/api/v2 find Foo.Lib '[1.0,2.0)'
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Source path: a package directory or an HTTP catalog endpoint
    /// (also via NUFEED_SOURCE)
    #[arg(long = "path", short = 'p', env = "NUFEED_SOURCE", global = true)]
    pub path: Option<String>,

    /// JSON source configuration file (list of {name, path, ...})
    #[arg(long = "config", short = 'c', value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Name of the source to query (with --config: selects from the list)
    #[arg(long = "source", short = 's', value_name = "NAME", global = true)]
    pub source_name: Option<String>,

    /// Username for the remote source
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Password for the remote source
    #[arg(long, global = true)]
    pub password: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Resolve every version of a package satisfying a constraint
    Find(FindArgs),

    /// Search the source for packages
    Search(SearchArgs),

    /// Discover available updates for installed packages
    Updates(UpdatesArgs),
}

#[derive(clap::Args, Debug)]
pub struct FindArgs {
    /// Package id
    pub id: String,

    /// Exact version or bracketed range, e.g. "1.2.0" or "[1.0,2.0)"
    pub version: String,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search term; empty matches everything
    #[arg(default_value = "")]
    pub term: String,

    /// Return every version instead of the latest per package
    #[arg(long)]
    pub all_versions: bool,

    /// Include pre-release versions
    #[arg(long)]
    pub prerelease: bool,

    /// Maximum number of results
    #[arg(long, default_value_t = 30)]
    pub take: usize,

    /// Number of results to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
}

#[derive(clap::Args, Debug)]
pub struct UpdatesArgs {
    /// Installed packages as id@version
    #[arg(value_name = "ID@VERSION", required = true)]
    pub installed: Vec<String>,

    /// Include pre-release versions
    #[arg(long)]
    pub prerelease: bool,

    /// Return every newer version instead of only the newest
    #[arg(long)]
    pub all_versions: bool,
}

fn build_source(cli: &Cli) -> Result<Source> {
    if let Some(config_path) = &cli.config {
        let json = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let descriptors = config::parse_descriptors(&json)?;
        let sources = config::load_sources(&descriptors)?;
        return sources
            .into_iter()
            .filter(|source| source.enabled())
            .find(|source| {
                cli.source_name
                    .as_deref()
                    .is_none_or(|name| source.name() == name)
            })
            .context("No enabled source matched");
    }

    let path = cli
        .path
        .clone()
        .context("Either --path or --config is required")?;
    let descriptor = SourceDescriptor {
        name: cli.source_name.clone().unwrap_or_else(|| "default".into()),
        path,
        username: cli.username.clone(),
        password: cli.password.clone(),
        enabled: true,
    };
    Source::from_descriptor(&descriptor)
}

fn parse_installed(specs: &[String]) -> Result<Vec<PackageIdentifier>> {
    specs
        .iter()
        .map(|spec| {
            let (id, version) = spec
                .split_once('@')
                .with_context(|| format!("Invalid '{}'. Expected id@version.", spec))?;
            Ok(PackageIdentifier::new(id, version))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let source = build_source(&cli)?;

    match &cli.command {
        Commands::Find(args) => {
            let identifier = PackageIdentifier::new(&args.id, &args.version);
            for package in source.find_packages_by_id(&identifier).await? {
                println!("{}", package);
            }
        }
        Commands::Search(args) => {
            let packages = source
                .search(
                    &args.term,
                    args.all_versions,
                    args.prerelease,
                    args.take,
                    args.skip,
                )
                .await?;
            for package in packages {
                match &package.description {
                    Some(description) => println!("{}  {}", package, description),
                    None => println!("{}", package),
                }
            }
        }
        Commands::Updates(args) => {
            let installed = parse_installed(&args.installed)?;
            let options = UpdateOptions {
                include_prerelease: args.prerelease,
                include_all_versions: args.all_versions,
                ..Default::default()
            };
            for package in source.get_updates(&installed, &options).await? {
                println!("{}", package);
            }
        }
    }
    Ok(())
}
