mod download;
pub mod dto;
mod repos;
mod response;
mod router;
pub mod webhook;

pub use router::{AppState, create_router};
