mod server;

pub use server::{CachePolicy, ServerConfig};
