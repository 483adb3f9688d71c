//! Notion-backed blog: ingest a Notion database into a JSON snapshot and
//! answer read queries over that snapshot.

pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notion;
pub mod parser;
pub mod post;
pub mod snapshot;
pub mod store;
pub mod throttle;

pub use config::Settings;
pub use error::{Error, Result};
pub use post::{Post, Status};
pub use snapshot::Snapshot;
pub use store::BlogStore;
