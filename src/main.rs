use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use log::debug;
use regex::Regex;

use ::kindling::commands::{self, Context, Origin};
use ::kindling::document::ActiveDocument;
use ::kindling::host::ClusterCache;
use ::kindling::tracker::LogCommandLog;
use ::kindling::{
    ClusterSettings, Config, ConsoleNotifier, ConsoleProgress, ConsolePrompter, Kind,
};

#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    /// Path to config file
    #[clap(long, default_value = "kindling.toml")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a cluster
    Create {
        /// Cluster name. Defaults to `kind`.
        ///
        /// Giving a name or image skips the settings prompt.
        #[clap(long)]
        name: Option<String>,
        /// Node image version, eg. v1.27.3
        #[clap(long)]
        image: Option<String>,
        /// Kind cluster config to create from. `-` reads an unsaved config
        /// from stdin.
        ///
        /// Subject to the `create.policy` config setting.
        #[clap(long)]
        spec: Option<PathBuf>,
    },
    /// Delete a cluster
    Delete {
        /// Cluster to delete. Prompts if omitted.
        name: Option<String>,
        /// Don't ask for confirmation
        #[clap(long, short)]
        yes: bool,
    },
    /// List clusters
    List {
        /// Only list clusters whose name matches this regex
        ///
        /// Supported regex syntax: https://docs.rs/regex/latest/regex/#syntax.
        #[clap(long, default_value = ".*")]
        filter: String,
    },
    /// Print a cluster's kubeconfig
    Kubeconfig {
        /// Cluster name
        name: String,
    },
    /// Print the kind version
    Version,
}

/// The CLI has no cached cluster list to refresh
struct NoCache;

impl ClusterCache for NoCache {
    fn refresh(&self) {
        debug!("Cluster list changed");
    }
}

/// Print the result of a one-shot query, returning the exit code
fn print_result<T: AsRef<str>>(result: Result<T, ::kindling::Diagnostics>) -> i32 {
    match result {
        Ok(out) => {
            println!("{}", out.as_ref());
            0
        }
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();
    let config = Config::load(&args.config)?;
    let kind = Kind::new(&config.kind, Arc::new(LogCommandLog));

    let rc = match args.command {
        Cmd::Create { name, image, spec } => {
            let active = match spec {
                Some(p) if p.as_os_str() == "-" => Some(ActiveDocument::unsaved(io::stdin())?),
                Some(p) => Some(ActiveDocument::load(&p)?),
                None => None,
            };
            let settings_given = name.is_some() || image.is_some();
            let defaults =
                ClusterSettings::new(name.as_deref().unwrap_or("kind"), image.as_deref());
            let prompter = ConsolePrompter::new(defaults, false).settings_given(settings_given);
            let mut progress = ConsoleProgress::new();
            let mut ctx = Context {
                kind: &kind,
                config: &config,
                indicator: &mut progress,
                notifier: &ConsoleNotifier::new(),
                prompter: &prompter,
                cache: &NoCache,
            };
            let created = commands::create_cluster(&mut ctx, Origin::Palette, active.as_ref())
                .context("Failed to create cluster")?;
            i32::from(!created)
        }
        Cmd::Delete { name, yes } => {
            let prompter = ConsolePrompter::new(ClusterSettings::new("kind", None), yes);
            let mut progress = ConsoleProgress::new();
            let mut ctx = Context {
                kind: &kind,
                config: &config,
                indicator: &mut progress,
                notifier: &ConsoleNotifier::new(),
                prompter: &prompter,
                cache: &NoCache,
            };
            let deleted = commands::delete_cluster(&mut ctx, name.as_deref());
            i32::from(!deleted)
        }
        Cmd::List { filter } => {
            let filter = Regex::new(&filter).context("Failed to compile regex")?;
            print_result(commands::list_clusters(&kind, &filter).map(|names| names.join("\n")))
        }
        Cmd::Kubeconfig { name } => print_result(kind.get_kubeconfig(&name)),
        Cmd::Version => print_result(kind.version()),
    };

    exit(rc);
}
