//! Database bootstrap and settings access

pub mod init;
pub mod models;

pub use init::*;
pub use models::*;
