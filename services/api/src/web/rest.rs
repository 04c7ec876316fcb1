//! services/api/src/web/rest.rs
//!
//! Shared pieces of the REST handlers: the failure type every handler returns,
//! the mapping from core errors to status codes, the offline gate, and the
//! master definition for the OpenAPI specification.

use axum::http::StatusCode;
use ewaste_core::{
    features::Capability, guard::InFlight, ports::PortError, records::RecordError,
};
use tracing::{error, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::web::{admin, assistant, auth, offline, records, state::AppState};

/// What a handler returns on failure: a status and a plain-text message.
pub type ApiFailure = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        offline::offline_status_handler,
        offline::start_offline_handler,
        offline::end_offline_handler,
        offline::capabilities_handler,
        records::create_collection_request_handler,
        records::list_collection_requests_handler,
        records::cancel_collection_request_handler,
        records::create_dumping_report_handler,
        records::list_dumping_reports_handler,
        records::create_listing_handler,
        records::list_listings_handler,
        records::set_listing_availability_handler,
        records::register_item_handler,
        records::list_items_handler,
        records::wallet_handler,
        admin::admin_me_handler,
        admin::initialize_admin_handler,
        admin::list_admin_users_handler,
        admin::grant_admin_handler,
        admin::analytics_handler,
        admin::set_collection_status_handler,
        admin::set_report_status_handler,
        assistant::chat_handler,
        assistant::list_conversations_handler,
        assistant::conversation_messages_handler,
        assistant::delete_conversation_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::MeResponse,
            offline::OfflineSessionResponse,
            offline::OfflineStatusResponse,
            offline::CapabilitiesResponse,
            records::CollectionRequestBody,
            records::CollectionRequestResponse,
            records::DumpingReportBody,
            records::DumpingReportResponse,
            records::ListingBody,
            records::ListingResponse,
            records::AvailabilityBody,
            records::ItemBody,
            records::ItemResponse,
            records::RegisteredItemResponse,
            records::WalletResponse,
            admin::AdminMeResponse,
            admin::InitializeAdminRequest,
            admin::InitializeAdminResponse,
            admin::AdminUserResponse,
            admin::GrantRoleRequest,
            admin::StatusUpdateRequest,
            admin::MetricResponse,
            assistant::ChatTurn,
            assistant::ChatRequest,
            assistant::ChatResponse,
            assistant::ConversationResponse,
            assistant::ChatMessageResponse,
        )
    ),
    tags(
        (name = "E-Waste API", description = "Offline mode, admin roles, collection requests, dumping reports, item registration, marketplace and assistant.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

pub fn port_failure(context: &str, e: PortError) -> ApiFailure {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        PortError::Conflict(message) => (StatusCode::CONFLICT, message),
        PortError::Unauthorized => (StatusCode::FORBIDDEN, "Not allowed".to_string()),
        PortError::Unexpected(message) => {
            error!("{}: {}", context, message);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{} failed", context))
        }
    }
}

pub fn record_failure(context: &str, e: RecordError) -> ApiFailure {
    match e {
        RecordError::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, errors.to_string()),
        e @ RecordError::InvalidTransition { .. } => (StatusCode::CONFLICT, e.to_string()),
        e @ RecordError::Conflict => (StatusCode::CONFLICT, e.to_string()),
        e @ RecordError::NotOwner => (StatusCode::FORBIDDEN, e.to_string()),
        RecordError::Port(e) => port_failure(context, e),
    }
}

//=========================================================================================
// Offline Gate & Double-Submit Guard
//=========================================================================================

/// Rejects with 403 when offline mode has `capability` switched off for `owner_id`.
pub async fn ensure_capability(
    state: &AppState,
    owner_id: Uuid,
    capability: Capability,
) -> Result<(), ApiFailure> {
    if state.offline.capabilities(owner_id).await.allows(capability) {
        return Ok(());
    }
    warn!("{:?} refused for {} while offline", capability, owner_id);
    Err((
        StatusCode::FORBIDDEN,
        "This feature is unavailable while offline mode is active".to_string(),
    ))
}

/// Rejects with 409 while the same mutation is already running for `owner_id`.
pub fn begin_submission(
    state: &AppState,
    owner_id: Uuid,
    operation: &'static str,
) -> Result<InFlight, ApiFailure> {
    state.guard.try_begin(owner_id, operation).ok_or((
        StatusCode::CONFLICT,
        "A previous submission is still in progress".to_string(),
    ))
}
