use std::sync::Arc;

use crate::engine::recommend::Recommender;
use crate::services::providers::{DeliverySink, WatchHistory};

/// Shared application state
///
/// Collaborators sit behind trait objects so the router can be exercised
/// against in-memory fakes in integration tests.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub history: Arc<dyn WatchHistory>,
    pub delivery: Arc<dyn DeliverySink>,
}
