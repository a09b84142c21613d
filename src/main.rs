mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use context_dropper::config::Settings;
use context_dropper::context::block_on_detached;
use context_dropper::db;

use commands::App;

#[derive(Parser)]
#[command(name = "ctxdrop")]
#[command(about = "Curate project files into a single context file for AI chats")]
struct Cli {
    /// SQLite database to use instead of the default location
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Project to act on (defaults to the active project)
    #[arg(short, long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage categories of the current project
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Select a file or directory
    Select {
        path: PathBuf,
        /// Comma-separated extensions (".rs") or exact file names for directories
        #[arg(short, long)]
        types: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Remove a selection
    Unselect { path: PathBuf },
    /// Move a selection into a category, or out of all categories
    Assign {
        path: PathBuf,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List selections
    List,
    /// Print the annotated project structure
    Tree {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Preview a file or directory
    Preview { path: PathBuf },
    /// Generate the context file at the project root
    Drop {
        #[arg(short, long)]
        category: Option<String>,
        /// Give up after this many seconds without writing anything
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Register a project root
    Add {
        name: String,
        root: PathBuf,
        #[arg(long)]
        prompt: Option<String>,
    },
    /// List projects
    List,
    /// Make a project the active one
    Use { name: String },
    /// Delete a project and its selections
    Remove { name: String },
    /// Replace a project's prompt guide
    Prompt { name: String, text: String },
    /// Show a project's details
    Show { name: Option<String> },
}

#[derive(Subcommand)]
enum CategoryCommand {
    Add { name: String },
    List,
    /// Delete a category; its selections become uncategorized
    Remove { name: String },
}

/// Initialize tracing with output to stderr so stdout carries only command output
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "context_dropper=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // A timed-out drop leaves its pass running; exit without waiting for it.
    block_on_detached(run(cli))?
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load();
    let db = match settings.database_path(cli.db) {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let app = App::new(db, settings, cli.project);

    match cli.command {
        Commands::Project(cmd) => match cmd {
            ProjectCommand::Add { name, root, prompt } => app.project_add(&name, &root, prompt)?,
            ProjectCommand::List => app.project_list()?,
            ProjectCommand::Use { name } => app.project_use(&name)?,
            ProjectCommand::Remove { name } => app.project_remove(&name)?,
            ProjectCommand::Prompt { name, text } => app.project_prompt(&name, text)?,
            ProjectCommand::Show { name } => app.project_show(name.as_deref())?,
        },
        Commands::Category(cmd) => match cmd {
            CategoryCommand::Add { name } => app.category_add(&name)?,
            CategoryCommand::List => app.category_list()?,
            CategoryCommand::Remove { name } => app.category_remove(&name)?,
        },
        Commands::Select {
            path,
            types,
            category,
        } => app.select(&path, types.as_deref(), category.as_deref())?,
        Commands::Unselect { path } => app.unselect(&path)?,
        Commands::Assign { path, category } => app.assign(&path, category.as_deref())?,
        Commands::List => app.list()?,
        Commands::Tree { category } => app.tree(category.as_deref())?,
        Commands::Preview { path } => app.preview(&path),
        Commands::Drop { category, timeout } => app.drop_artifact(category.as_deref(), timeout).await?,
    }

    Ok(())
}
