pub mod broadcaster;
pub mod client;
pub mod error;
pub mod server;

pub use broadcaster::{Broadcaster, MapboxToken};
pub use client::{ViewerId, ViewerRegistry};
pub use error::ServerError;
pub use server::{start, start_heartbeat, ServerConfig, ServerHandle};
