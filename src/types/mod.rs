mod models;

pub use models::{Account, Presentation, RepoState, Repository, generate_secret};
