mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    archive::ArchiveSubcommand, graph::GraphSubcommand, snapshot::SnapshotSubcommand,
    task::TaskSubcommand,
};
use dispatch_core::DispatchError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dispatch",
    about = "Filesystem-coordinated task graph — create, claim, and retire tasks shared by concurrent agent workers",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .dispatch/ or .git/)
    #[arg(long, global = true, env = "DISPATCH_ROOT")]
    root: Option<PathBuf>,

    /// Task list to operate on (default: the current-list pointer)
    #[arg(long, short = 'l', global = true, env = "DISPATCH_LIST")]
    list: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize dispatch state in the current project
    Init,

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Query the dependency graph
    Graph {
        #[command(subcommand)]
        subcommand: GraphSubcommand,
    },

    /// Capture and compare list snapshots
    Snapshot {
        #[command(subcommand)]
        subcommand: SnapshotSubcommand,
    },

    /// Retire lists to cold storage and bring them back
    Archive {
        #[command(subcommand)]
        subcommand: ArchiveSubcommand,
    },

    /// Point the session at a list (creates it if missing)
    Use { list: String },

    /// Show the current list
    Current,

    /// Show all lists
    Lists,

    /// Poll for stale in-progress tasks
    Watch {
        /// Stop after this many poll cycles (default: run until interrupted)
        #[arg(long)]
        cycles: Option<u32>,

        /// Seconds between polls (default: from config)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Unchanged cycles before a task is suspected (default: from config)
        #[arg(long)]
        suspect_after: Option<u32>,

        /// Unchanged cycles before a task is flagged (default: from config)
        #[arg(long)]
        flag_after: Option<u32>,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let json = cli.json;
    let list = cli.list;

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, json),
        Commands::Task { subcommand } => cmd::task::run(&root, list.as_deref(), subcommand, json),
        Commands::Graph { subcommand } => cmd::graph::run(&root, list.as_deref(), subcommand, json),
        Commands::Snapshot { subcommand } => {
            cmd::snapshot::run(&root, list.as_deref(), subcommand, json)
        }
        Commands::Archive { subcommand } => {
            cmd::archive::run(&root, list.as_deref(), subcommand, json)
        }
        Commands::Use { list: target } => cmd::session::use_list(&root, &target, json),
        Commands::Current => cmd::session::current(&root, json),
        Commands::Lists => cmd::session::lists(&root, json),
        Commands::Watch {
            cycles,
            interval_secs,
            suspect_after,
            flag_after,
        } => cmd::watch::run(
            &root,
            list.as_deref(),
            cycles,
            interval_secs,
            suspect_after,
            flag_after,
            json,
        ),
    };

    if let Err(e) = result {
        if json {
            // Machine-readable error object so orchestrating scripts can
            // branch on kind without parsing prose.
            let kind = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<DispatchError>())
                .map(|err| err.kind())
                .unwrap_or("error");
            eprintln!(
                "{}",
                serde_json::json!({ "error": kind, "message": format!("{e:#}") })
            );
        } else {
            eprintln!("error: {e:#}");
        }
        std::process::exit(1);
    }
}
