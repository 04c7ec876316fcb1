//! Creating and moving collection requests, dumping reports and marketplace
//! listings through their lifecycles, and registering devices for recycling.
//!
//! Every status write is a compare-and-swap against the status the transition
//! was checked from, so the transition tables in [`crate::lifecycle`] hold even
//! when two actors race. Each successful write refreshes `updated_at` and
//! publishes a change event for the record's owner.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{
    CollectionRequest, DumpingAnalysis, DumpingReport, EWasteItem, MarketplaceListing, Severity,
};
use crate::feed::Collection;
use crate::lifecycle::{Actor, Availability, CollectionStatus, Lifecycle, ReportStatus};
use crate::ports::{ChangeFeed, Clock, DatabaseService, DumpingAnalysisService, PortError};
use crate::validation::{
    CollectionRequestInput, DumpingReportInput, ItemInput, ListingInput, ValidationErrors,
};

/// Eco points credited to the owner when a pickup completes.
pub const COMPLETION_ECO_POINTS: i32 = 10;

pub const FALLBACK_RECOMMENDATIONS: &str =
    "Unable to perform AI analysis. Please ensure all fields are filled correctly and try again.";

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("record belongs to another user")]
    NotOwner,
    #[error("record changed concurrently; reload and retry")]
    Conflict,
    #[error(transparent)]
    Port(#[from] PortError),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// A newly registered device and the free listing made for it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredItem {
    pub item: EWasteItem,
    pub listing: Option<MarketplaceListing>,
}

fn check_transition<S: Lifecycle>(from: S, to: S, actor: Actor) -> RecordResult<()> {
    if from.can_transition(to, actor) {
        Ok(())
    } else {
        Err(RecordError::InvalidTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

#[derive(Clone)]
pub struct RecordService {
    db: Arc<dyn DatabaseService>,
    feed: Arc<dyn ChangeFeed>,
    clock: Arc<dyn Clock>,
    analysis: Arc<dyn DumpingAnalysisService>,
}

impl RecordService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        feed: Arc<dyn ChangeFeed>,
        clock: Arc<dyn Clock>,
        analysis: Arc<dyn DumpingAnalysisService>,
    ) -> Self {
        Self {
            db,
            feed,
            clock,
            analysis,
        }
    }

    // --- Collection Requests ---

    pub async fn submit_collection_request(
        &self,
        owner_id: Uuid,
        input: &CollectionRequestInput,
    ) -> RecordResult<CollectionRequest> {
        let now = self.clock.now();
        input.validate(now)?;
        let request = self.db.insert_collection_request(owner_id, input, now).await?;
        info!("Collection request {} submitted by {}", request.id, owner_id);
        self.feed.publish(Collection::CollectionRequests, owner_id, request.id);
        Ok(request)
    }

    pub async fn list_collection_requests(&self, owner_id: Uuid) -> RecordResult<Vec<CollectionRequest>> {
        Ok(self.db.list_collection_requests(owner_id).await?)
    }

    /// Owner cancel. Cancelling an already-cancelled request is a no-op.
    pub async fn cancel_collection_request(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> RecordResult<CollectionRequest> {
        let request = self.db.get_collection_request(id).await?;
        if request.owner_id != owner_id {
            return Err(RecordError::NotOwner);
        }
        if request.status == CollectionStatus::Cancelled {
            return Ok(request);
        }
        self.move_collection_request(request, CollectionStatus::Cancelled, Actor::Owner)
            .await
    }

    /// Reviewer step along `pending → confirmed → in_progress → completed`.
    pub async fn advance_collection_request(
        &self,
        id: Uuid,
        next: CollectionStatus,
    ) -> RecordResult<CollectionRequest> {
        let request = self.db.get_collection_request(id).await?;
        let owner_id = request.owner_id;
        let updated = self
            .move_collection_request(request, next, Actor::Reviewer)
            .await?;
        if next == CollectionStatus::Completed {
            if let Err(e) = self.db.add_eco_points(owner_id, COMPLETION_ECO_POINTS).await {
                // The status change stands; only the reward is lost.
                error!("Failed to award eco points to {} for {}: {:?}", owner_id, id, e);
            }
        }
        Ok(updated)
    }

    async fn move_collection_request(
        &self,
        request: CollectionRequest,
        next: CollectionStatus,
        actor: Actor,
    ) -> RecordResult<CollectionRequest> {
        check_transition(request.status, next, actor)?;
        let swapped = self
            .db
            .update_collection_status(request.id, request.status, next, self.clock.now())
            .await?;
        if !swapped {
            warn!("Collection request {} changed under a {:?} update", request.id, actor);
            return Err(RecordError::Conflict);
        }
        info!(
            "Collection request {} moved {} -> {}",
            request.id,
            request.status.as_str(),
            next.as_str()
        );
        self.feed.publish(Collection::CollectionRequests, request.owner_id, request.id);
        Ok(self.db.get_collection_request(request.id).await?)
    }

    // --- Dumping Reports ---

    /// Validates, analyses and stores a report. A failed analysis does not
    /// block the report; it is stored as `medium` with fallback advice.
    pub async fn submit_dumping_report(
        &self,
        owner_id: Uuid,
        input: &DumpingReportInput,
    ) -> RecordResult<DumpingReport> {
        input.validate()?;
        let analysis = match self
            .analysis
            .analyze(&input.description, &input.waste_type, &input.location)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Dumping report analysis failed, using fallback: {:?}", e);
                DumpingAnalysis {
                    severity: Severity::Medium,
                    recommendations: FALLBACK_RECOMMENDATIONS.to_string(),
                }
            }
        };
        let report = self
            .db
            .insert_dumping_report(owner_id, input, &analysis, self.clock.now())
            .await?;
        info!(
            "Dumping report {} filed by {} with severity {}",
            report.id,
            owner_id,
            report.severity.as_str()
        );
        self.feed.publish(Collection::DumpingReports, owner_id, report.id);
        Ok(report)
    }

    pub async fn list_dumping_reports(&self, owner_id: Uuid) -> RecordResult<Vec<DumpingReport>> {
        Ok(self.db.list_dumping_reports(owner_id).await?)
    }

    pub async fn advance_dumping_report(
        &self,
        id: Uuid,
        next: ReportStatus,
    ) -> RecordResult<DumpingReport> {
        let report = self.db.get_dumping_report(id).await?;
        check_transition(report.status, next, Actor::Reviewer)?;
        let swapped = self
            .db
            .update_report_status(id, report.status, next, self.clock.now())
            .await?;
        if !swapped {
            return Err(RecordError::Conflict);
        }
        info!("Dumping report {} moved {} -> {}", id, report.status.as_str(), next.as_str());
        self.feed.publish(Collection::DumpingReports, report.owner_id, id);
        Ok(self.db.get_dumping_report(id).await?)
    }

    // --- Marketplace Listings ---

    pub async fn create_listing(
        &self,
        owner_id: Uuid,
        input: &ListingInput,
    ) -> RecordResult<MarketplaceListing> {
        input.validate()?;
        let listing = self
            .db
            .insert_marketplace_listing(owner_id, input, self.clock.now())
            .await?;
        info!("Listing {} created by {}", listing.id, owner_id);
        self.feed.publish(Collection::MarketplaceListings, owner_id, listing.id);
        Ok(listing)
    }

    pub async fn list_own_listings(&self, owner_id: Uuid) -> RecordResult<Vec<MarketplaceListing>> {
        Ok(self.db.list_marketplace_listings(owner_id).await?)
    }

    pub async fn browse_listings(&self) -> RecordResult<Vec<MarketplaceListing>> {
        Ok(self.db.list_available_listings().await?)
    }

    /// Owner toggle. Setting the current value again is a no-op.
    pub async fn set_listing_availability(
        &self,
        owner_id: Uuid,
        id: Uuid,
        availability: Availability,
    ) -> RecordResult<MarketplaceListing> {
        let listing = self.db.get_marketplace_listing(id).await?;
        if listing.owner_id != owner_id {
            return Err(RecordError::NotOwner);
        }
        if listing.availability == availability {
            return Ok(listing);
        }
        check_transition(listing.availability, availability, Actor::Owner)?;
        self.db
            .set_listing_availability(id, availability, self.clock.now())
            .await?;
        self.feed.publish(Collection::MarketplaceListings, owner_id, id);
        Ok(self.db.get_marketplace_listing(id).await?)
    }

    // --- Registered Items ---

    /// Stores the device and, when it is still reusable, offers it as a free
    /// listing. The registration stands even if the listing cannot be written.
    pub async fn register_item(&self, owner_id: Uuid, input: &ItemInput) -> RecordResult<RegisteredItem> {
        input.validate()?;
        let now = self.clock.now();
        let item = self.db.insert_e_waste_item(owner_id, input, now).await?;
        info!("Item {} registered by {}", item.id, owner_id);
        self.feed.publish(Collection::EWasteItems, owner_id, item.id);

        let listing = match input.free_listing() {
            Some(listing) => match self.db.insert_marketplace_listing(owner_id, &listing, now).await {
                Ok(listing) => {
                    info!("Item {} offered as free listing {}", item.id, listing.id);
                    self.feed.publish(Collection::MarketplaceListings, owner_id, listing.id);
                    Some(listing)
                }
                Err(e) => {
                    error!("Failed to list item {} on the marketplace: {:?}", item.id, e);
                    None
                }
            },
            None => None,
        };
        Ok(RegisteredItem { item, listing })
    }

    pub async fn list_items(&self, owner_id: Uuid) -> RecordResult<Vec<EWasteItem>> {
        Ok(self.db.list_e_waste_items(owner_id).await?)
    }

    // --- Wallet ---

    pub async fn eco_points(&self, owner_id: Uuid) -> RecordResult<i64> {
        Ok(self.db.eco_points_of(owner_id).await?)
    }
}
