//! HTTP API handlers for pmide-sidecar

pub mod chat;
pub mod documents;
pub mod frameworks;
pub mod health;
pub mod models;

pub use chat::chat_routes;
pub use documents::document_routes;
pub use frameworks::framework_routes;
pub use health::health_routes;
pub use models::model_routes;
