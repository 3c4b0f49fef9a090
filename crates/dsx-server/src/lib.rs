//! DSX Server Library
//!
//! HTTP server for sharable dataset previews and the access requests built
//! on top of them.
//!
//! # Overview
//!
//! - **Sharing**: an owner derives a public preview of an annotated dataset,
//!   holding every item but full media for only a small evenly spaced subset
//! - **Access requests**: other users request access to a preview; the owner
//!   grants it (optionally as a mutual exchange of datasets) or denies it
//! - **Listings**: paginated views of sharable previews and pending requests
//!
//! # Architecture
//!
//! The server follows a **CQRS** layout. Every operation is a command or
//! query with an `async fn handle(state, request)`; routes translate HTTP
//! into those requests and the mediator in [`cqrs`] dispatches them
//! in-process.
//!
//! Documents live behind the traits in [`store`], backed by an in-memory
//! store for development and tests or PostgreSQL JSONB in production.
//! Sharing events go to a [`events::NotificationSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dsx_server::{api, config::Config, features::SharingState, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let state = SharingState::from_backend(Arc::new(MemoryStore::new()), config.sharing);
//!     api::serve(state, &config, async {}).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod cqrs;
pub mod error;
pub mod events;
pub mod features;
pub mod middleware;
pub mod store;

pub use error::AppError;
