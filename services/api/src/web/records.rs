//! services/api/src/web/records.rs
//!
//! Owner-facing endpoints for collection requests, dumping reports, item
//! registration, the marketplace and the eco-points wallet.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ewaste_core::{
    domain::{AuthContext, CollectionRequest, DumpingReport, EWasteItem, MarketplaceListing},
    features::Capability,
    lifecycle::{Availability, Lifecycle},
    records::RegisteredItem,
    validation::{CollectionRequestInput, DumpingReportInput, ItemInput, ListingInput},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::{
    rest::{begin_submission, ensure_capability, record_failure, ApiFailure},
    state::AppState,
};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CollectionRequestBody {
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<CollectionRequestBody> for CollectionRequestInput {
    fn from(body: CollectionRequestBody) -> Self {
        Self {
            address: body.address,
            city: body.city,
            state: body.state,
            postal_code: body.postal_code,
            scheduled_date: body.scheduled_date,
            notes: body.notes,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CollectionRequestResponse {
    pub id: Uuid,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// `pending`, `confirmed`, `in_progress`, `completed` or `cancelled`.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CollectionRequest> for CollectionRequestResponse {
    fn from(r: CollectionRequest) -> Self {
        Self {
            id: r.id,
            address: r.address,
            city: r.city,
            state: r.state,
            postal_code: r.postal_code,
            scheduled_date: r.scheduled_date,
            notes: r.notes,
            status: r.status.as_str().to_string(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DumpingReportBody {
    pub description: String,
    pub location: String,
    pub waste_type: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl From<DumpingReportBody> for DumpingReportInput {
    fn from(body: DumpingReportBody) -> Self {
        Self {
            description: body.description,
            location: body.location,
            waste_type: body.waste_type,
            latitude: body.latitude,
            longitude: body.longitude,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DumpingReportResponse {
    pub id: Uuid,
    pub description: String,
    pub location: String,
    pub waste_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `low`, `medium`, `high` or `critical`.
    pub severity: String,
    pub ai_recommendations: Option<String>,
    /// `pending`, `in_progress` or `resolved`.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DumpingReport> for DumpingReportResponse {
    fn from(r: DumpingReport) -> Self {
        Self {
            id: r.id,
            description: r.description,
            location: r.location,
            waste_type: r.waste_type,
            latitude: r.latitude,
            longitude: r.longitude,
            severity: r.severity.as_str().to_string(),
            ai_recommendations: r.recommendations,
            status: r.status.as_str().to_string(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ListingBody {
    pub title: String,
    pub description: String,
    pub device_type: String,
    pub condition: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_free: bool,
    pub location: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<ListingBody> for ListingInput {
    fn from(body: ListingBody) -> Self {
        Self {
            title: body.title,
            description: body.description,
            device_type: body.device_type,
            condition: body.condition,
            price: body.price,
            is_free: body.is_free,
            location: body.location,
            image_url: body.image_url,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ListingResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub device_type: String,
    pub condition: String,
    pub price: f64,
    pub is_free: bool,
    pub location: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MarketplaceListing> for ListingResponse {
    fn from(l: MarketplaceListing) -> Self {
        Self {
            id: l.id,
            owner_id: l.owner_id,
            title: l.title,
            description: l.description,
            device_type: l.device_type,
            condition: l.condition,
            price: l.price,
            is_free: l.is_free,
            location: l.location,
            image_url: l.image_url,
            is_available: l.availability.is_available(),
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ItemBody {
    pub name: String,
    /// Mobile, Computer, Laptop, Printer, Accessories or Other
    pub category: String,
    pub brand: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Working, Damaged or Not Working
    pub condition: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<ItemBody> for ItemInput {
    fn from(body: ItemBody) -> Self {
        Self {
            name: body.name,
            category: body.category,
            brand: body.brand,
            model: body.model,
            condition: body.condition,
            description: body.description,
            image_url: body.image_url,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: String,
    pub brand: String,
    pub model: Option<String>,
    pub condition: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EWasteItem> for ItemResponse {
    fn from(i: EWasteItem) -> Self {
        Self {
            id: i.id,
            owner_id: i.owner_id,
            name: i.name,
            category: i.category,
            brand: i.brand,
            model: i.model,
            condition: i.condition,
            description: i.description,
            image_url: i.image_url,
            status: i.status,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegisteredItemResponse {
    pub item: ItemResponse,
    /// The free listing made for a working or damaged device.
    pub listing: Option<ListingResponse>,
}

impl From<RegisteredItem> for RegisteredItemResponse {
    fn from(r: RegisteredItem) -> Self {
        Self {
            item: r.item.into(),
            listing: r.listing.map(Into::into),
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct ListingQuery {
    /// Only the caller's own listings, available or not.
    #[serde(default)]
    pub mine: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AvailabilityBody {
    pub is_available: bool,
}

#[derive(Serialize, ToSchema)]
pub struct WalletResponse {
    pub eco_points: i64,
}

//=========================================================================================
// Collection Requests
//=========================================================================================

/// POST /collection-requests - Schedule a pickup
#[utoipa::path(
    post,
    path = "/collection-requests",
    request_body = CollectionRequestBody,
    responses(
        (status = 201, description = "Request created as pending", body = CollectionRequestResponse),
        (status = 403, description = "Offline mode is active"),
        (status = 409, description = "A submission is already in progress"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_collection_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<CollectionRequestBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::ScheduleCollection).await?;
    let _in_flight = begin_submission(&state, auth.user_id, "collection_request")?;

    let request = state
        .records
        .submit_collection_request(auth.user_id, &body.into())
        .await
        .map_err(|e| record_failure("Scheduling the pickup", e))?;
    Ok((StatusCode::CREATED, Json(CollectionRequestResponse::from(request))))
}

/// GET /collection-requests - The caller's requests, newest first
#[utoipa::path(
    get,
    path = "/collection-requests",
    responses((status = 200, description = "The caller's requests", body = [CollectionRequestResponse]))
)]
pub async fn list_collection_requests_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CollectionRequestResponse>>, ApiFailure> {
    let requests = state
        .records
        .list_collection_requests(auth.user_id)
        .await
        .map_err(|e| record_failure("Loading collection requests", e))?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

/// POST /collection-requests/{id}/cancel - Cancel a pending request
#[utoipa::path(
    post,
    path = "/collection-requests/{id}/cancel",
    params(("id" = Uuid, Path, description = "Collection request id")),
    responses(
        (status = 200, description = "Request is cancelled", body = CollectionRequestResponse),
        (status = 403, description = "Not the owner, or offline mode is active"),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request is no longer pending")
    )
)]
pub async fn cancel_collection_request_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionRequestResponse>, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::ScheduleCollection).await?;
    let request = state
        .records
        .cancel_collection_request(auth.user_id, id)
        .await
        .map_err(|e| record_failure("Cancelling the pickup", e))?;
    Ok(Json(request.into()))
}

//=========================================================================================
// Dumping Reports
//=========================================================================================

/// POST /dumping-reports - Report an illegal dumping site
#[utoipa::path(
    post,
    path = "/dumping-reports",
    request_body = DumpingReportBody,
    responses(
        (status = 201, description = "Report filed and analysed", body = DumpingReportResponse),
        (status = 403, description = "Offline mode is active"),
        (status = 409, description = "A submission is already in progress"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_dumping_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<DumpingReportBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::RegisterItems).await?;
    let _in_flight = begin_submission(&state, auth.user_id, "dumping_report")?;

    let report = state
        .records
        .submit_dumping_report(auth.user_id, &body.into())
        .await
        .map_err(|e| record_failure("Filing the report", e))?;
    Ok((StatusCode::CREATED, Json(DumpingReportResponse::from(report))))
}

/// GET /dumping-reports - The caller's reports, newest first
#[utoipa::path(
    get,
    path = "/dumping-reports",
    responses((status = 200, description = "The caller's reports", body = [DumpingReportResponse]))
)]
pub async fn list_dumping_reports_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<DumpingReportResponse>>, ApiFailure> {
    let reports = state
        .records
        .list_dumping_reports(auth.user_id)
        .await
        .map_err(|e| record_failure("Loading dumping reports", e))?;
    Ok(Json(reports.into_iter().map(Into::into).collect()))
}

//=========================================================================================
// Marketplace
//=========================================================================================

/// POST /marketplace/listings - Offer a used device
#[utoipa::path(
    post,
    path = "/marketplace/listings",
    request_body = ListingBody,
    responses(
        (status = 201, description = "Listing created as available", body = ListingResponse),
        (status = 403, description = "Offline mode is active"),
        (status = 409, description = "A submission is already in progress"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_listing_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ListingBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::AccessMarketplace).await?;
    let _in_flight = begin_submission(&state, auth.user_id, "marketplace_listing")?;

    let listing = state
        .records
        .create_listing(auth.user_id, &body.into())
        .await
        .map_err(|e| record_failure("Creating the listing", e))?;
    Ok((StatusCode::CREATED, Json(ListingResponse::from(listing))))
}

/// GET /marketplace/listings - Browse available listings, or `?mine=true` for the caller's own
#[utoipa::path(
    get,
    path = "/marketplace/listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings, newest first", body = [ListingResponse]),
        (status = 403, description = "Offline mode is active")
    )
)]
pub async fn list_listings_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ListingResponse>>, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::AccessMarketplace).await?;
    let listings = if query.mine {
        state.records.list_own_listings(auth.user_id).await
    } else {
        state.records.browse_listings().await
    }
    .map_err(|e| record_failure("Loading listings", e))?;
    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// POST /marketplace/listings/{id}/availability - Mark a listing available or sold
#[utoipa::path(
    post,
    path = "/marketplace/listings/{id}/availability",
    params(("id" = Uuid, Path, description = "Listing id")),
    request_body = AvailabilityBody,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 403, description = "Not the owner, or offline mode is active"),
        (status = 404, description = "No such listing")
    )
)]
pub async fn set_listing_availability_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<AvailabilityBody>,
) -> Result<Json<ListingResponse>, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::AccessMarketplace).await?;
    let listing = state
        .records
        .set_listing_availability(auth.user_id, id, Availability::from_flag(body.is_available))
        .await
        .map_err(|e| record_failure("Updating the listing", e))?;
    Ok(Json(listing.into()))
}

//=========================================================================================
// Registered Items
//=========================================================================================

/// POST /items - Register a device for recycling
#[utoipa::path(
    post,
    path = "/items",
    request_body = ItemBody,
    responses(
        (status = 201, description = "Item registered, with its free listing if reusable", body = RegisteredItemResponse),
        (status = 403, description = "Offline mode is active"),
        (status = 409, description = "A submission is already in progress"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn register_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<ItemBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::RegisterItems).await?;
    let _in_flight = begin_submission(&state, auth.user_id, "e_waste_item")?;

    let registered = state
        .records
        .register_item(auth.user_id, &body.into())
        .await
        .map_err(|e| record_failure("Registering the item", e))?;
    Ok((StatusCode::CREATED, Json(RegisteredItemResponse::from(registered))))
}

/// GET /items - The caller's registered items, newest first
#[utoipa::path(
    get,
    path = "/items",
    responses((status = 200, description = "The caller's items", body = [ItemResponse]))
)]
pub async fn list_items_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ItemResponse>>, ApiFailure> {
    let items = state
        .records
        .list_items(auth.user_id)
        .await
        .map_err(|e| record_failure("Loading items", e))?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

//=========================================================================================
// Wallet
//=========================================================================================

/// GET /wallet - Eco points earned from completed pickups
#[utoipa::path(
    get,
    path = "/wallet",
    responses(
        (status = 200, description = "The caller's balance", body = WalletResponse),
        (status = 403, description = "Offline mode is active")
    )
)]
pub async fn wallet_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<WalletResponse>, ApiFailure> {
    ensure_capability(&state, auth.user_id, Capability::AccessWallet).await?;
    let eco_points = state
        .records
        .eco_points(auth.user_id)
        .await
        .map_err(|e| record_failure("Loading the wallet", e))?;
    Ok(Json(WalletResponse { eco_points }))
}
