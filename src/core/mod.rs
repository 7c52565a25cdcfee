//! Core engine for playtrack operations
//!
//! Everything that talks to Google Play goes through one open edit:
//!
//! - **api**: `PublisherApi` trait and the data it exchanges
//! - **http**: `HttpPublisher`, the Google Play Developer API client
//! - **memory**: `InMemoryBackend`, a recording fake for tests and dry runs
//! - **credentials**: Turning configured credentials into an API client
//! - **edit**: The open edit, its commit, and commit-timeout reconciliation
//! - **registrar**: Duplicate checks and APK uploads
//! - **expansion**: Attaching or inheriting expansion files
//! - **assign**: Track assignment planning and application
//! - **task**: Upload and assignment orchestration
//! - **config**: playtrack.toml parsing and validation
//! - **error**: Error types with contextual help messages
//! - **track**: Release tracks and rollout fractions
//! - **plan**: Content-addressed plan ids
//! - **report**: User-facing task output
//! - **cancel**: Cooperative cancellation

pub mod api;
pub mod assign;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod edit;
pub mod error;
pub mod expansion;
pub mod http;
pub mod memory;
pub mod plan;
pub mod registrar;
pub mod report;
pub mod task;
pub mod track;
