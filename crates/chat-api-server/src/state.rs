use axum::extract::FromRef;
use std::sync::Arc;

use crate::services::conversation::{ConversationManager, SessionStore};
use crate::services::DocumentService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub conversation_manager: Arc<ConversationManager>,
    pub document_service: Arc<DocumentService>,
    pub session_store: Arc<dyn SessionStore>,
}

impl FromRef<AppState> for Arc<ConversationManager> {
    fn from_ref(state: &AppState) -> Self {
        state.conversation_manager.clone()
    }
}

impl FromRef<AppState> for Arc<DocumentService> {
    fn from_ref(state: &AppState) -> Self {
        state.document_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        state.session_store.clone()
    }
}
