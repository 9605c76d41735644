//! # PM IDE Common Library
//!
//! Shared code for the PM IDE services:
//! - SSE wire decoding and server-side SSE helpers
//! - Chat event types, streaming accumulation and cost accounting
//! - Fuzzy ranking for palettes and search
//! - Built-in framework catalog
//! - Configuration loading and database bootstrap
//! - Event bus shared by handlers and the `/events` stream

pub mod chat;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod frameworks;
pub mod fuzzy;
pub mod pricing;
pub mod sse;
pub mod sse_parser;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
