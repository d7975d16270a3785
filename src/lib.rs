//! # Podium
//!
//! A presentation hosting service. Podium mirrors a user's GitHub
//! repositories, watches the active ones through signed push webhooks,
//! builds the presentations declared in each repository's `.podium.yml`
//! manifest with an external renderer, and serves the rendered output
//! as static pages.
//!
//! Usable both as a standalone binary and as a library:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use podium::config::ServerConfig;
//! use podium::github::GithubHost;
//! use podium::server::{AppState, create_router};
//! use podium::store::{SqliteStore, Store};
//! use podium::worker::{JobQueue, RepoLocks, TaskRegistry, WorkerContext};
//!
//! let config = ServerConfig::default();
//! let store = Arc::new(SqliteStore::new(config.db_path()).unwrap());
//! store.initialize().unwrap();
//! let host = Arc::new(GithubHost::new(config.github_api_url.clone()));
//!
//! let queue = JobQueue::start(WorkerContext {
//!     store: store.clone(),
//!     host: host.clone(),
//!     config: config.clone(),
//!     registry: TaskRegistry::default(),
//!     locks: RepoLocks::default(),
//! });
//! let router = create_router(Arc::new(AppState { store, host, config, queue }));
//! // Serve with axum...
//! ```

pub mod config;
pub mod error;
pub mod github;
pub mod lifecycle;
pub mod server;
pub mod store;
pub mod testing;
pub mod types;
pub mod worker;
