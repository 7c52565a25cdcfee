//! Upload Android APKs to Google Play and move them between release tracks
//!
//! The binary is a thin shell over [`commands`]; library callers usually want
//! [`core::task::run_upload`] and [`core::task::run_assignment`] with their own
//! [`core::api::PublisherApi`].

pub mod artifact;
pub mod commands;
pub mod core;
pub mod ui;
pub mod utils;
