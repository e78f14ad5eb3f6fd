//! Page Composer CLI
//!
//! Usage:
//!   page-composer [OPTIONS] [TEMPLATE]
//!
//! Options:
//!   -c, --config <FILE>     Composer configuration (TOML format)
//!   -r, --root <DIR>        Template directory
//!   -x, --extension <EXT>   Template file extension
//!   -D, --data <FILE>       View data (JSON object)
//!   -l, --layout <NAME>     Default layout ("" to disable)
//!   --list                  List template names
//!   --check                 Compile every template and report errors
//!   -d, --debug             Verbose logging
//!   -h, --help              Print help

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use page_composer::{Composer, ComposerConfig, ViewData, ViewError};

#[derive(Parser)]
#[command(name = "page-composer")]
#[command(about = "Render templates through their layout chains")]
struct Cli {
    /// Template to render, by logical name
    template: Option<String>,

    /// Composer configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Template file extension
    #[arg(short = 'x', long)]
    extension: Option<String>,

    /// View data file (JSON object)
    #[arg(short = 'D', long)]
    data: Option<PathBuf>,

    /// Default layout; an empty string disables it
    #[arg(short, long)]
    layout: Option<String>,

    /// List template names and exit
    #[arg(long)]
    list: bool,

    /// Compile every template, report the first error and exit
    #[arg(long)]
    check: bool,

    /// Verbose logging, including each compiled template
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = match &cli.config {
        Some(path) => match ComposerConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ComposerConfig::default(),
    };
    if let Some(root) = &cli.root {
        config = config.with_root(root);
    }
    if let Some(extension) = &cli.extension {
        config = config.with_extension(extension);
    }
    if let Some(layout) = &cli.layout {
        config = config.with_default_layout(layout);
    }
    if cli.debug {
        config = config.with_debug(true);
    }

    let composer = Composer::from_config(&config);

    if cli.check {
        match composer.store().load() {
            Ok(()) => {
                let count = composer.store().names().map(|n| n.len()).unwrap_or(0);
                println!("{} templates OK", count);
                return;
            }
            Err(e) => {
                report(&e, &config.root);
                std::process::exit(1);
            }
        }
    }

    if cli.list {
        match composer.store().names() {
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
                return;
            }
            Err(e) => {
                report(&e, &config.root);
                std::process::exit(1);
            }
        }
    }

    let Some(template) = &cli.template else {
        eprintln!("Error: no template given (use --list to see available templates)");
        std::process::exit(1);
    };

    let data = match &cli.data {
        Some(path) => match read_data(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error reading data '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ViewData::new(),
    };

    match composer.render(template, data) {
        Ok(page) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&page).and_then(|_| stdout.write_all(b"\n")) {
                eprintln!("Error writing output: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            report(&e, &config.root);
            std::process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "page_composer=debug"
    } else {
        "page_composer=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_data(path: &Path) -> Result<ViewData, String> {
    let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content).map_err(|e| e.to_string())
}

/// Print an error, with source context for compile errors
fn report(err: &ViewError, root: &Path) {
    if let ViewError::Compile { path, cause } = err {
        if let Ok(source) = fs::read_to_string(root.join(path)) {
            eprint!("{}", cause.format(&source, path));
            return;
        }
    }
    eprintln!("Error: {}", err);
}
