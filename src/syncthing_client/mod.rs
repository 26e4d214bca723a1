pub mod api;
mod client;
mod core;
pub mod helpers;
pub mod models;

pub use client::{SyncthingApi, SyncthingClient};
pub use self::core::HttpClient;
