use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use podium::config::ServerConfig;
use podium::github::GithubHost;
use podium::server::{AppState, create_router};
use podium::store::{SqliteStore, Store};
use podium::types::Account;
use podium::worker::{JobQueue, RepoLocks, TaskRegistry, WorkerContext};

#[derive(Parser)]
#[command(name = "podium")]
#[command(about = "A presentation hosting server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, default_value = "8080")]
        port: u16,

        /// Data directory for database and rendered output
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Site label stamped on repository rows
        #[arg(long, default_value = "localhost")]
        site: String,

        /// Public base URL for external access (e.g., "https://podium.example.com").
        /// Registered webhooks point here. If not set, derived from host and port.
        #[arg(long)]
        public_base_url: Option<String>,

        /// Renderer executable, invoked as `renderer <source> <output-dir>`
        #[arg(long, default_value = "hovercraft")]
        renderer: PathBuf,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Register an account with a provider access token
    Add {
        username: String,

        /// Provider access token used for API calls on the account's behalf
        #[arg(long)]
        token: String,

        #[arg(long, default_value = "./data")]
        data_dir: String,
    },

    /// List registered accounts
    List {
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

fn open_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let data_path: PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;
    let store = SqliteStore::new(data_path.join("podium.db"))?;
    store.initialize()?;
    Ok(store)
}

fn run_account_add(username: String, token: String, data_dir: String) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;

    match store.get_account_by_username(&username)? {
        Some(mut account) => {
            account.access_token = Some(token);
            store.update_account(&account)?;
            println!("Updated credential for '{username}' ({})", account.id);
        }
        None => {
            let account = Account::new(&username, Some(token));
            store.create_account(&account)?;
            println!("Created account '{username}' ({})", account.id);
        }
    }
    Ok(())
}

fn run_account_list(data_dir: String) -> anyhow::Result<()> {
    let store = open_store(&data_dir)?;

    for account in store.list_accounts()? {
        let credential = if account.access_token.is_some() {
            "token set"
        } else {
            "no token"
        };
        println!("{}  {}  ({})", account.id, account.username, credential);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("podium=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Account { command } => match command {
            AccountCommands::Add {
                username,
                token,
                data_dir,
            } => {
                run_account_add(username, token, data_dir)?;
            }
            AccountCommands::List { data_dir } => {
                run_account_list(data_dir)?;
            }
        },
        Commands::Serve {
            host,
            port,
            data_dir,
            site,
            public_base_url,
            renderer,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                site,
                public_base_url,
                renderer,
                ..ServerConfig::default()
            };

            fs::create_dir_all(&config.data_dir)?;
            fs::create_dir_all(config.public_root())?;

            let store = SqliteStore::new(config.db_path())?;
            store.initialize()?;
            let store: Arc<dyn Store> = Arc::new(store);
            let host: Arc<dyn podium::github::CodeHost> =
                Arc::new(GithubHost::new(config.github_api_url.clone()));

            let queue = JobQueue::start(WorkerContext {
                store: store.clone(),
                host: host.clone(),
                config: config.clone(),
                registry: TaskRegistry::default(),
                locks: RepoLocks::default(),
            });

            let state = Arc::new(AppState {
                store,
                host,
                config: config.clone(),
                queue,
            });

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
