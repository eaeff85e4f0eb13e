//! SonicVault: a media asset catalog with exclusive playback, share actions
//! and an admin workflow that commits new assets to a hosted repository.

/// Gated upload flow driving the catalog workflow.
pub mod admin;
/// Application data directory helpers.
pub mod app_dirs;
/// Catalog records and their text encoding.
pub mod catalog;
/// Command-line surface.
pub mod cli;
/// Persistent settings.
pub mod config;
/// Search and category filtering.
pub mod filter;
pub(crate) mod http_client;
/// Tracing setup.
pub mod logging;
/// Expiring status messages.
pub mod notify;
/// Exclusive audio playback.
pub mod playback;
/// Hosted repository access and credentials.
pub mod remote;
/// Link, copy, download and open actions.
pub mod share;
/// Upload and catalog registration pipeline.
pub mod workflow;
