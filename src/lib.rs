//! listing-builder - draft digital-download listings from the terminal
//!
//! This library provides OAuth2 PKCE login against the marketplace, token
//! storage, and the sequential workflow that creates a draft listing and
//! attaches its images and downloadable archive.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod listing;
pub mod storage;
pub mod ui;
pub mod workflow;

pub use error::{Error, Result};
