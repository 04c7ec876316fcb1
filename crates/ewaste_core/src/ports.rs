//! crates/ewaste_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted database, the LLM provider and the realtime feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::AdminRole;
use crate::domain::{
    AdminUser, ChatMessage, ChatRole, CollectionRequest, Conversation, DumpingAnalysis,
    DumpingReport, EWasteItem, MarketplaceListing, OfflineSession, PlatformCounts,
    StoredChatMessage, User, UserCredentials,
};
use crate::feed::{Collection, Subscription};
use crate::lifecycle::{Availability, CollectionStatus, ReportStatus};
use crate::validation::{CollectionRequestInput, DumpingReportInput, ItemInput, ListingInput};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence & Auth Collaborator
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users and Auth Sessions ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Offline Sessions ---
    /// Deactivates every active session of `owner_id`, then inserts a fresh active one.
    /// Implementations run both steps in one transaction where they can.
    async fn start_offline_session(
        &self,
        owner_id: Uuid,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> PortResult<OfflineSession>;

    /// Most recent session with `is_active AND expires_at > now`.
    async fn find_active_offline_session(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Option<OfflineSession>>;

    /// Returns how many rows flipped from active to inactive.
    async fn deactivate_offline_sessions(&self, owner_id: Uuid) -> PortResult<u64>;

    // --- Admin Procedures ---
    /// The caller's role, or `None` when there is no *active* assignment.
    async fn admin_role_of(&self, owner_id: Uuid) -> PortResult<Option<AdminRole>>;

    async fn list_admin_users(&self) -> PortResult<Vec<AdminUser>>;

    async fn grant_admin_role(
        &self,
        owner_id: Uuid,
        role: AdminRole,
        granted_by: Uuid,
    ) -> PortResult<AdminUser>;

    /// Creates a `super_admin` for the user with `email` iff no admin rows exist at all.
    async fn initialize_first_admin(&self, email: &str) -> PortResult<bool>;

    async fn add_eco_points(&self, owner_id: Uuid, points: i32) -> PortResult<()>;

    async fn eco_points_of(&self, owner_id: Uuid) -> PortResult<i64>;

    // --- Collection Requests ---
    async fn insert_collection_request(
        &self,
        owner_id: Uuid,
        input: &CollectionRequestInput,
        now: DateTime<Utc>,
    ) -> PortResult<CollectionRequest>;

    async fn list_collection_requests(&self, owner_id: Uuid) -> PortResult<Vec<CollectionRequest>>;

    async fn get_collection_request(&self, id: Uuid) -> PortResult<CollectionRequest>;

    /// Compare-and-swap on `status`. `Ok(false)` means the row no longer had `expected`.
    async fn update_collection_status(
        &self,
        id: Uuid,
        expected: CollectionStatus,
        next: CollectionStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    // --- Dumping Reports ---
    async fn insert_dumping_report(
        &self,
        owner_id: Uuid,
        input: &DumpingReportInput,
        analysis: &DumpingAnalysis,
        now: DateTime<Utc>,
    ) -> PortResult<DumpingReport>;

    async fn list_dumping_reports(&self, owner_id: Uuid) -> PortResult<Vec<DumpingReport>>;

    async fn get_dumping_report(&self, id: Uuid) -> PortResult<DumpingReport>;

    async fn update_report_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    // --- Marketplace Listings ---
    async fn insert_marketplace_listing(
        &self,
        owner_id: Uuid,
        input: &ListingInput,
        now: DateTime<Utc>,
    ) -> PortResult<MarketplaceListing>;

    async fn list_marketplace_listings(&self, owner_id: Uuid)
        -> PortResult<Vec<MarketplaceListing>>;

    async fn list_available_listings(&self) -> PortResult<Vec<MarketplaceListing>>;

    async fn get_marketplace_listing(&self, id: Uuid) -> PortResult<MarketplaceListing>;

    async fn set_listing_availability(
        &self,
        id: Uuid,
        availability: Availability,
        now: DateTime<Utc>,
    ) -> PortResult<()>;

    // --- Registered Items ---
    async fn insert_e_waste_item(
        &self,
        owner_id: Uuid,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> PortResult<EWasteItem>;

    async fn list_e_waste_items(&self, owner_id: Uuid) -> PortResult<Vec<EWasteItem>>;

    // --- Assistant Conversations ---
    async fn create_conversation(
        &self,
        owner_id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Conversation>;

    /// Most recently active first.
    async fn list_conversations(&self, owner_id: Uuid) -> PortResult<Vec<Conversation>>;

    async fn get_conversation(&self, id: Uuid) -> PortResult<Conversation>;

    /// Appends a message and bumps the conversation's `updated_at`.
    async fn append_chat_message(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        role: ChatRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<StoredChatMessage>;

    /// Oldest first.
    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<StoredChatMessage>>;

    /// Removes the conversation and its messages.
    async fn delete_conversation(&self, id: Uuid) -> PortResult<()>;

    // --- Analytics ---
    async fn platform_counts(&self, now: DateTime<Utc>) -> PortResult<PlatformCounts>;
}

//=========================================================================================
// Realtime, LLM and Clock Ports
//=========================================================================================

/// Push-based change notifications. Payloads only say *that* something changed;
/// subscribers reload from the database.
pub trait ChangeFeed: Send + Sync {
    fn publish(&self, collection: Collection, owner_id: Uuid, record_id: Uuid);

    /// A subscription scoped to `owner_id` that initially watches nothing.
    fn subscribe(&self, owner_id: Uuid) -> Subscription;

    fn subscribe_to(&self, collection: Collection, owner_id: Uuid) -> Subscription {
        let mut subscription = self.subscribe(owner_id);
        subscription.watch(collection);
        subscription
    }
}

#[async_trait]
pub trait DumpingAnalysisService: Send + Sync {
    /// Assesses a dumping site from its textual description.
    async fn analyze(
        &self,
        description: &str,
        waste_type: &str,
        location: &str,
    ) -> PortResult<DumpingAnalysis>;
}

#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Produces the assistant's next message given the prior conversation.
    async fn reply(&self, history: &[ChatMessage], message: &str) -> PortResult<String>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
