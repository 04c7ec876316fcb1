//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use ewaste_core::{
    authz::Authorizer,
    chat::ChatHistory,
    guard::SubmissionGuard,
    offline::OfflineMode,
    ports::{AssistantService, ChangeFeed, Clock, DatabaseService, DumpingAnalysisService},
    records::RecordService,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub feed: Arc<dyn ChangeFeed>,
    pub offline: OfflineMode,
    pub authorizer: Authorizer,
    pub records: RecordService,
    pub assistant: Arc<dyn AssistantService>,
    pub chat: ChatHistory,
    pub guard: SubmissionGuard,
}

impl AppState {
    /// Wires the core services over the given adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        feed: Arc<dyn ChangeFeed>,
        clock: Arc<dyn Clock>,
        analysis: Arc<dyn DumpingAnalysisService>,
        assistant: Arc<dyn AssistantService>,
    ) -> Self {
        Self {
            offline: OfflineMode::new(db.clone(), feed.clone(), clock.clone()),
            authorizer: Authorizer::new(db.clone()),
            records: RecordService::new(db.clone(), feed.clone(), clock.clone(), analysis),
            chat: ChatHistory::new(db.clone(), feed.clone(), clock),
            db,
            config,
            feed,
            assistant,
            guard: SubmissionGuard::new(),
        }
    }
}
