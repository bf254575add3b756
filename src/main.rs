use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use todo_engine::config::{AppConfig, CliConfig, FileConfig, LoggingLevel};
use todo_engine::metrics;
use todo_engine::project::{AccessLevel, ProjectStore, ProjectVisibility};
use todo_engine::todos::{
    ResolvedByAction, TodoAction, TodoEvent, TodoFilter, TodoService, TodoState, TodoStore,
};
use todo_engine::user::{UserId, UserStore};
use todo_engine::{sqlite_service, SqliteStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

fn parse_visibility(s: &str) -> Result<ProjectVisibility> {
    ProjectVisibility::from_str(s).ok_or_else(|| anyhow!("Unknown visibility '{}'", s))
}

fn parse_access_level(s: &str) -> Result<AccessLevel> {
    AccessLevel::from_str(s).ok_or_else(|| anyhow!("Unknown access level '{}'", s))
}

fn parse_state(s: &str) -> Result<TodoState> {
    Ok(TodoState::parse(s)?)
}

fn parse_action(s: &str) -> Result<TodoAction> {
    TodoAction::parse(s).ok_or_else(|| anyhow!("Unknown to-do action '{}'", s))
}

#[derive(Parser, Debug)]
#[command(name = "todo-engine", version, about = "Inspect and drive the to-do ledger")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Default log level, LOG_LEVEL takes precedence.
    #[clap(long, value_enum, default_value = "info")]
    pub logging_level: LoggingLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database, or migrate an existing one.
    Init,
    AddUser {
        handle: String,
        #[clap(long)]
        admin: bool,
    },
    AddProject {
        name: String,
        #[clap(long, value_parser = parse_visibility, default_value = "private")]
        visibility: ProjectVisibility,
        /// Restrict code and merge requests to members.
        #[clap(long)]
        private_repository: bool,
    },
    /// List every user handle.
    Users,
    AddMember {
        project_id: usize,
        handle: String,
        #[clap(long, value_parser = parse_access_level, default_value = "developer")]
        access_level: AccessLevel,
    },
    Members { project_id: usize },
    /// List a user's to-dos, newest first.
    List {
        handle: String,
        #[clap(long, value_parser = parse_state)]
        state: Option<TodoState>,
        /// Only this action, e.g. `directly_addressed`.
        #[clap(long, value_parser = parse_action)]
        action: Option<TodoAction>,
        #[clap(long)]
        json: bool,
    },
    /// Show cached and recomputed to-do counters.
    Counts { handle: String },
    /// Mark to-dos done.
    Done { handle: String, ids: Vec<usize> },
    /// Put done to-dos back to pending.
    Restore { handle: String, ids: Vec<usize> },
    MarkAllDone { handle: String },
    /// Feed a JSON array of events through the engine.
    Replay {
        #[clap(value_parser = parse_path)]
        events: PathBuf,
    },
    /// Print the metrics registry in Prometheus text format.
    Metrics,
}

fn user_id(store: &SqliteStore, handle: &str) -> Result<UserId> {
    store
        .get_user_id(handle)?
        .ok_or_else(|| anyhow!("Unknown user '{}'", handle))
}

fn replay(service: &TodoService, path: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {:?}", path))?;
    let events: Vec<TodoEvent> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse events file: {:?}", path))?;

    info!("Replaying {} event(s) from {:?}", events.len(), path);
    let mut failed = 0;
    for (index, event) in events.iter().enumerate() {
        match service.handle(event) {
            Ok(outcome) => println!(
                "{} {}: {}",
                index,
                event.kind(),
                serde_json::to_string(&outcome)?
            ),
            Err(err) => {
                failed += 1;
                error!("Event {} ({}) failed: {}", index, event.kind(), err);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} event(s) failed", failed, events.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_path: cli_args.db_path.clone(),
        logging_level: cli_args.logging_level,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let default_level: LevelFilter = config
        .logging_level
        .as_filter()
        .parse()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    metrics::init_metrics();

    info!("Opening to-do database at {:?}...", config.db_path);
    let store = Arc::new(SqliteStore::new(&config.db_path)?);
    let service = sqlite_service(store.clone(), config.todos.clone());

    match &cli_args.command {
        Command::Init => {
            info!("Database ready at {:?}", config.db_path);
        }
        Command::AddUser { handle, admin } => {
            let id = store.create_user(handle, *admin)?;
            println!("{}", id);
        }
        Command::AddProject {
            name,
            visibility,
            private_repository,
        } => {
            let id = store.create_project(name, *visibility, *private_repository)?;
            println!("{}", id);
        }
        Command::Users => {
            for handle in store.get_all_user_handles()? {
                println!("{}", handle);
            }
        }
        Command::AddMember {
            project_id,
            handle,
            access_level,
        } => {
            let user = user_id(&store, handle)?;
            store
                .get_project(*project_id)?
                .ok_or_else(|| anyhow!("Unknown project {}", project_id))?;
            store.set_project_member(*project_id, user, *access_level)?;
        }
        Command::Members { project_id } => {
            for member in store.get_project_members(*project_id)? {
                println!("{:>6}  {:?}", member.user_id, member.access_level);
            }
        }
        Command::List {
            handle,
            state,
            action,
            json,
        } => {
            let user = user_id(&store, handle)?;
            let filter = TodoFilter {
                state: *state,
                action: *action,
                ..Default::default()
            };
            let todos = store.get_user_todos(user, &filter)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&todos)?);
            } else {
                for todo in todos {
                    println!(
                        "{:>6}  {:<7}  {:<18}  {:<24}  by {}",
                        todo.id,
                        todo.state.as_str(),
                        todo.action.as_str(),
                        todo.target.to_string(),
                        todo.author_id
                    );
                }
            }
        }
        Command::Counts { handle } => {
            let user = user_id(&store, handle)?;
            let cached = store.get_cached_counts(user)?;
            let actual = store.count_todos(user)?;
            println!("pending: {} (rows: {})", cached.pending, actual.pending);
            println!("done:    {} (rows: {})", cached.done, actual.done);
        }
        Command::Done { handle, ids } => {
            let user = user_id(&store, handle)?;
            let resolved = service.resolve_todos(ids, user, ResolvedByAction::ApiDone)?;
            println!("{} to-do(s) marked done", resolved.len());
        }
        Command::Restore { handle, ids } => {
            let user = user_id(&store, handle)?;
            let restored = service.restore_todos(ids, user)?;
            println!("{} to-do(s) restored", restored.len());
        }
        Command::MarkAllDone { handle } => {
            let user = user_id(&store, handle)?;
            let resolved = service.mark_all_done(user)?;
            println!("{} to-do(s) marked done", resolved.len());
        }
        Command::Replay { events } => replay(&service, events)?,
        Command::Metrics => print!("{}", metrics::encode_metrics()?),
    }

    Ok(())
}
