//! extension-bundler CLI

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use extension_bundler::snapshot::Snapshot;
use extension_bundler::{BundleMode, BundlePlugin, BundlerOptions, FsAssetWriter};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// extension-bundler: Compile .gjs components into a loadable extension bundle
#[derive(Parser, Debug)]
#[command(name = "extension-bundler", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile once and exit
    Build(BuildArgs),
    /// Compile, then recompile whenever a file under the module root changes
    Watch {
        #[command(flatten)]
        build: BuildArgs,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// JSON config file; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root that relative paths resolve against
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Entry point, overriding package.json
    #[arg(short, long)]
    entry: Option<String>,

    /// Output mode: single, multi or mirror
    #[arg(short, long)]
    mode: Option<BundleMode>,

    /// Shrink the single-mode artifact
    #[arg(long)]
    shrink: bool,

    /// Output directory
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Base URL written into the manifest, e.g. http://localhost:4205
    #[arg(long)]
    base_url: Option<String>,
}

impl BuildArgs {
    fn options(&self) -> anyhow::Result<BundlerOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                BundlerOptions::from_json(&json)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => BundlerOptions::default(),
        };

        if let Some(root) = &self.project_root {
            options.project_root = root.clone();
        }
        if let Some(entry) = &self.entry {
            options.entry_point = Some(entry.clone());
        }
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if self.shrink {
            options.shrink = true;
        }
        if let Some(out_dir) = &self.out_dir {
            options.output_dir = out_dir.clone();
        }
        Ok(options)
    }
}

fn plugin_for(args: &BuildArgs) -> anyhow::Result<BundlePlugin<FsAssetWriter>> {
    let options = args.options()?;
    let writer = FsAssetWriter::new(options.output_dir_path());
    Ok(BundlePlugin::new(options, writer))
}

/// Initial compile. With `--base-url` the URL is taken as already listening.
fn start(plugin: &mut BundlePlugin<FsAssetWriter>, base_url: Option<&str>) -> anyhow::Result<()> {
    match base_url {
        Some(url) => {
            let address = parse_base_url(url)?;
            plugin.server_listening(&address)?;
        }
        None => {
            plugin.build_start()?;
        }
    }
    Ok(())
}

fn parse_base_url(url: &str) -> anyhow::Result<extension_bundler::ServerAddress> {
    let (scheme, rest) = url
        .split_once("://")
        .with_context(|| format!("Base URL must look like http://host:port, got {}", url))?;
    let https = match scheme {
        "http" => false,
        "https" => true,
        other => bail!("Unsupported scheme in base URL: {}", other),
    };
    let authority = rest.trim_end_matches('/');
    // IPv6 hosts are bracketed, so a `]` after the last colon means no port.
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid port in base URL: {}", port))?;
            (host, Some(port))
        }
        _ => (authority, None),
    };
    Ok(extension_bundler::ServerAddress {
        https,
        host: Some(host.trim_matches(|c| c == '[' || c == ']').to_string()),
        port,
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            let mut plugin = plugin_for(&args)?;
            start(&mut plugin, args.base_url.as_deref())?;
        }
        Commands::Watch { build, interval_ms } => {
            let mut plugin = plugin_for(&build)?;
            if let Err(err) = start(&mut plugin, build.base_url.as_deref()) {
                log::error!("{:#}", err);
            }

            let root = plugin.options().modules_root_path();
            let interval = Duration::from_millis(interval_ms.max(50));
            log::info!("Watching {} every {:?}", root.display(), interval);

            let mut previous = Snapshot::capture(&root);
            loop {
                thread::sleep(interval);
                let current = Snapshot::capture(&root);
                for path in current.changed_paths(&previous) {
                    if let Err(err) = plugin.file_changed(&path) {
                        log::error!("{}", err);
                    }
                }
                previous = current;
            }
        }
    }

    Ok(())
}
