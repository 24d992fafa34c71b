//! HTTP request handlers

pub mod access;
pub mod admin;
pub mod auth;
pub mod contact;
pub mod documents;
pub mod events;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod submissions;

pub use access::*;
pub use admin::*;
pub use auth::*;
pub use contact::*;
pub use documents::*;
pub use events::*;
pub use messages::*;
pub use notifications::*;
pub use submissions::*;

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::NotifyConfig;
use crate::events::EventHub;
use crate::notify::Dispatcher;
use crate::storage::DocumentStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: DocumentStore,
    pub hub: Arc<EventHub>,
    pub dispatcher: Arc<Dispatcher>,
    pub notify: NotifyConfig,
    /// Lowercased system-owner email; permanently a lead admin
    pub owner_email: String,
    pub max_upload_size: usize,
    pub session_expiry_hours: i64,
    pub is_production: bool,
}
