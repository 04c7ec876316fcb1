//! In-memory adapters for the core ports.
//!
//! Used by the test suites of both crates and handy for running the API
//! without Postgres or an LLM key. Behaviour mirrors the SQL adapter, including
//! the compare-and-swap status updates and the first-admin gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::AdminRole;
use crate::domain::{
    AdminUser, ChatMessage, ChatRole, CollectionRequest, Conversation, DumpingAnalysis,
    DumpingReport, EWasteItem, MarketplaceListing, OfflineSession, PlatformCounts, Severity,
    StoredChatMessage, User, UserCredentials, ITEM_REGISTERED,
};
use crate::lifecycle::{Availability, CollectionStatus, Lifecycle, ReportStatus};
use crate::ports::{
    AssistantService, DatabaseService, DumpingAnalysisService, PortError, PortResult,
};
use crate::validation::{CollectionRequestInput, DumpingReportInput, ItemInput, ListingInput};

#[derive(Default)]
struct State {
    users: Vec<UserCredentials>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    offline_sessions: Vec<OfflineSession>,
    admins: Vec<AdminUser>,
    eco_points: HashMap<Uuid, i64>,
    collection_requests: Vec<CollectionRequest>,
    dumping_reports: Vec<DumpingReport>,
    listings: Vec<MarketplaceListing>,
    items: Vec<EWasteItem>,
    conversations: Vec<Conversation>,
    chat_messages: Vec<StoredChatMessage>,
    races: HashMap<Uuid, CollectionStatus>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    state: Mutex<State>,
    failing: AtomicBool,
    listings_failing: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every port call fails with `PortError::Unexpected`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While set, only marketplace listing inserts fail.
    pub fn set_listings_failing(&self, failing: bool) {
        self.listings_failing.store(failing, Ordering::SeqCst);
    }

    /// Inserts an admin row directly, bypassing the grant rules.
    pub fn seed_admin(&self, owner_id: Uuid, role: AdminRole, is_active: bool) {
        self.lock().admins.push(AdminUser {
            id: Uuid::new_v4(),
            owner_id,
            role,
            is_active,
            created_by: None,
            created_at: Utc::now(),
        });
    }

    /// Simulates another writer: right after the next read of request `id`,
    /// its stored status becomes `status`.
    pub fn race_after_next_read(&self, id: Uuid, status: CollectionStatus) {
        self.lock().races.insert(id, status);
    }

    pub fn offline_sessions(&self, owner_id: Uuid) -> Vec<OfflineSession> {
        self.lock()
            .offline_sessions
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Rows flagged active, expired or not.
    pub fn active_offline_sessions(&self, owner_id: Uuid) -> usize {
        self.lock()
            .offline_sessions
            .iter()
            .filter(|s| s.owner_id == owner_id && s.is_active)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> PortResult<MutexGuard<'_, State>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("in-memory database is failing".to_string()));
        }
        Ok(self.lock())
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

fn newest_first<T: Clone>(items: impl Iterator<Item = T>) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.reverse();
    items
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut state = self.state()?;
        if state.users.iter().any(|u| u.email == email) {
            return Err(PortError::Conflict(format!("email {} already registered", email)));
        }
        let user_id = Uuid::new_v4();
        state.users.push(UserCredentials {
            user_id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(User {
            user_id,
            email: Some(email.to_string()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.state()?
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| not_found("User", email))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.state()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| User {
                user_id: u.user_id,
                email: Some(u.email.clone()),
            })
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state()?
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.state()?.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state()?.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn start_offline_session(
        &self,
        owner_id: Uuid,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> PortResult<OfflineSession> {
        let mut state = self.state()?;
        for session in state
            .offline_sessions
            .iter_mut()
            .filter(|s| s.owner_id == owner_id && s.is_active)
        {
            session.is_active = false;
        }
        let session = OfflineSession {
            id: Uuid::new_v4(),
            owner_id,
            started_at,
            expires_at,
            is_active: true,
        };
        state.offline_sessions.push(session.clone());
        Ok(session)
    }

    async fn find_active_offline_session(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Option<OfflineSession>> {
        Ok(self
            .state()?
            .offline_sessions
            .iter()
            .filter(|s| s.owner_id == owner_id && s.is_active && s.expires_at > now)
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn deactivate_offline_sessions(&self, owner_id: Uuid) -> PortResult<u64> {
        let mut state = self.state()?;
        let mut count = 0;
        for session in state
            .offline_sessions
            .iter_mut()
            .filter(|s| s.owner_id == owner_id && s.is_active)
        {
            session.is_active = false;
            count += 1;
        }
        Ok(count)
    }

    async fn admin_role_of(&self, owner_id: Uuid) -> PortResult<Option<AdminRole>> {
        Ok(self
            .state()?
            .admins
            .iter()
            .find(|a| a.owner_id == owner_id && a.is_active)
            .map(|a| a.role))
    }

    async fn list_admin_users(&self) -> PortResult<Vec<AdminUser>> {
        Ok(newest_first(self.state()?.admins.iter().cloned()))
    }

    async fn grant_admin_role(
        &self,
        owner_id: Uuid,
        role: AdminRole,
        granted_by: Uuid,
    ) -> PortResult<AdminUser> {
        let mut state = self.state()?;
        state.admins.retain(|a| a.owner_id != owner_id);
        let admin = AdminUser {
            id: Uuid::new_v4(),
            owner_id,
            role,
            is_active: true,
            created_by: Some(granted_by),
            created_at: Utc::now(),
        };
        state.admins.push(admin.clone());
        Ok(admin)
    }

    async fn initialize_first_admin(&self, email: &str) -> PortResult<bool> {
        let mut state = self.state()?;
        if !state.admins.is_empty() {
            return Ok(false);
        }
        let Some(user_id) = state.users.iter().find(|u| u.email == email).map(|u| u.user_id) else {
            return Ok(false);
        };
        state.admins.push(AdminUser {
            id: Uuid::new_v4(),
            owner_id: user_id,
            role: AdminRole::SuperAdmin,
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn add_eco_points(&self, owner_id: Uuid, points: i32) -> PortResult<()> {
        *self.state()?.eco_points.entry(owner_id).or_insert(0) += i64::from(points);
        Ok(())
    }

    async fn eco_points_of(&self, owner_id: Uuid) -> PortResult<i64> {
        Ok(self.state()?.eco_points.get(&owner_id).copied().unwrap_or(0))
    }

    async fn insert_collection_request(
        &self,
        owner_id: Uuid,
        input: &CollectionRequestInput,
        now: DateTime<Utc>,
    ) -> PortResult<CollectionRequest> {
        let request = CollectionRequest {
            id: Uuid::new_v4(),
            owner_id,
            address: input.address.clone(),
            city: input.city.clone(),
            state: input.state_or_default().to_string(),
            postal_code: input.postal_code.clone(),
            scheduled_date: input.scheduled_date,
            notes: input.notes.clone(),
            status: CollectionStatus::initial(),
            created_at: now,
            updated_at: now,
        };
        self.state()?.collection_requests.push(request.clone());
        Ok(request)
    }

    async fn list_collection_requests(&self, owner_id: Uuid) -> PortResult<Vec<CollectionRequest>> {
        Ok(newest_first(
            self.state()?
                .collection_requests
                .iter()
                .filter(|r| r.owner_id == owner_id)
                .cloned(),
        ))
    }

    async fn get_collection_request(&self, id: Uuid) -> PortResult<CollectionRequest> {
        let mut state = self.state()?;
        let race = state.races.remove(&id);
        let request = state
            .collection_requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| not_found("Collection request", id))?;
        let snapshot = request.clone();
        if let Some(status) = race {
            request.status = status;
        }
        Ok(snapshot)
    }

    async fn update_collection_status(
        &self,
        id: Uuid,
        expected: CollectionStatus,
        next: CollectionStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut state = self.state()?;
        match state
            .collection_requests
            .iter_mut()
            .find(|r| r.id == id && r.status == expected)
        {
            Some(request) => {
                request.status = next;
                request.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_dumping_report(
        &self,
        owner_id: Uuid,
        input: &DumpingReportInput,
        analysis: &DumpingAnalysis,
        now: DateTime<Utc>,
    ) -> PortResult<DumpingReport> {
        let report = DumpingReport {
            id: Uuid::new_v4(),
            owner_id,
            description: input.description.clone(),
            location: input.location.clone(),
            waste_type: input.waste_type.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            severity: analysis.severity,
            recommendations: Some(analysis.recommendations.clone()),
            status: ReportStatus::initial(),
            created_at: now,
            updated_at: now,
        };
        self.state()?.dumping_reports.push(report.clone());
        Ok(report)
    }

    async fn list_dumping_reports(&self, owner_id: Uuid) -> PortResult<Vec<DumpingReport>> {
        Ok(newest_first(
            self.state()?
                .dumping_reports
                .iter()
                .filter(|r| r.owner_id == owner_id)
                .cloned(),
        ))
    }

    async fn get_dumping_report(&self, id: Uuid) -> PortResult<DumpingReport> {
        self.state()?
            .dumping_reports
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| not_found("Dumping report", id))
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut state = self.state()?;
        match state
            .dumping_reports
            .iter_mut()
            .find(|r| r.id == id && r.status == expected)
        {
            Some(report) => {
                report.status = next;
                report.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_marketplace_listing(
        &self,
        owner_id: Uuid,
        input: &ListingInput,
        now: DateTime<Utc>,
    ) -> PortResult<MarketplaceListing> {
        if self.listings_failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("listing insert failed".to_string()));
        }
        let listing = MarketplaceListing {
            id: Uuid::new_v4(),
            owner_id,
            title: input.title.clone(),
            description: Some(input.description.clone()),
            device_type: input.device_type.clone(),
            condition: input.condition.clone(),
            price: input.price,
            is_free: input.is_free,
            location: input.location.clone(),
            image_url: input.image_url.clone(),
            availability: Availability::initial(),
            created_at: now,
            updated_at: now,
        };
        self.state()?.listings.push(listing.clone());
        Ok(listing)
    }

    async fn list_marketplace_listings(&self, owner_id: Uuid) -> PortResult<Vec<MarketplaceListing>> {
        Ok(newest_first(
            self.state()?
                .listings
                .iter()
                .filter(|l| l.owner_id == owner_id)
                .cloned(),
        ))
    }

    async fn list_available_listings(&self) -> PortResult<Vec<MarketplaceListing>> {
        Ok(newest_first(
            self.state()?
                .listings
                .iter()
                .filter(|l| l.availability.is_available())
                .cloned(),
        ))
    }

    async fn get_marketplace_listing(&self, id: Uuid) -> PortResult<MarketplaceListing> {
        self.state()?
            .listings
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found("Listing", id))
    }

    async fn set_listing_availability(
        &self,
        id: Uuid,
        availability: Availability,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.state()?;
        let listing = state
            .listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| not_found("Listing", id))?;
        listing.availability = availability;
        listing.updated_at = now;
        Ok(())
    }

    async fn insert_e_waste_item(
        &self,
        owner_id: Uuid,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> PortResult<EWasteItem> {
        let item = EWasteItem {
            id: Uuid::new_v4(),
            owner_id,
            name: input.name.trim().to_string(),
            category: input.category.clone(),
            brand: input.brand.trim().to_string(),
            model: input.model.clone(),
            condition: input.condition.clone(),
            description: input.description.clone(),
            image_url: input.image_url.clone(),
            status: ITEM_REGISTERED.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state()?.items.push(item.clone());
        Ok(item)
    }

    async fn list_e_waste_items(&self, owner_id: Uuid) -> PortResult<Vec<EWasteItem>> {
        Ok(newest_first(
            self.state()?
                .items
                .iter()
                .filter(|i| i.owner_id == owner_id)
                .cloned(),
        ))
    }

    async fn create_conversation(
        &self,
        owner_id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Conversation> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            owner_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state()?.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(&self, owner_id: Uuid) -> PortResult<Vec<Conversation>> {
        let mut conversations = newest_first(
            self.state()?
                .conversations
                .iter()
                .filter(|c| c.owner_id == owner_id)
                .cloned(),
        );
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }

    async fn get_conversation(&self, id: Uuid) -> PortResult<Conversation> {
        self.state()?
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found("Conversation", id))
    }

    async fn append_chat_message(
        &self,
        conversation_id: Uuid,
        _owner_id: Uuid,
        role: ChatRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<StoredChatMessage> {
        let mut state = self.state()?;
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| not_found("Conversation", conversation_id))?;
        conversation.updated_at = now;
        let message = StoredChatMessage {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_string(),
            created_at: now,
        };
        state.chat_messages.push(message.clone());
        Ok(message)
    }

    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<StoredChatMessage>> {
        Ok(self
            .state()?
            .chat_messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn delete_conversation(&self, id: Uuid) -> PortResult<()> {
        let mut state = self.state()?;
        state.chat_messages.retain(|m| m.conversation_id != id);
        state.conversations.retain(|c| c.id != id);
        Ok(())
    }

    async fn platform_counts(&self, now: DateTime<Utc>) -> PortResult<PlatformCounts> {
        let state = self.state()?;
        let count = |n: usize| n as i64;
        Ok(PlatformCounts {
            users: count(state.users.len()),
            collection_requests: count(state.collection_requests.len()),
            pending_collection_requests: count(
                state
                    .collection_requests
                    .iter()
                    .filter(|r| r.status == CollectionStatus::Pending)
                    .count(),
            ),
            completed_collection_requests: count(
                state
                    .collection_requests
                    .iter()
                    .filter(|r| r.status == CollectionStatus::Completed)
                    .count(),
            ),
            dumping_reports: count(state.dumping_reports.len()),
            open_dumping_reports: count(
                state
                    .dumping_reports
                    .iter()
                    .filter(|r| r.status != ReportStatus::Resolved)
                    .count(),
            ),
            available_listings: count(
                state
                    .listings
                    .iter()
                    .filter(|l| l.availability.is_available())
                    .count(),
            ),
            registered_items: count(state.items.len()),
            active_offline_sessions: count(
                state
                    .offline_sessions
                    .iter()
                    .filter(|s| s.is_active && s.expires_at > now)
                    .count(),
            ),
        })
    }
}

/// Analysis stub that returns a fixed result, or fails.
pub struct CannedAnalysis(Option<DumpingAnalysis>);

impl CannedAnalysis {
    pub fn returning(severity: Severity, recommendations: &str) -> Self {
        Self(Some(DumpingAnalysis {
            severity,
            recommendations: recommendations.to_string(),
        }))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl DumpingAnalysisService for CannedAnalysis {
    async fn analyze(&self, _: &str, _: &str, _: &str) -> PortResult<DumpingAnalysis> {
        self.0
            .clone()
            .ok_or_else(|| PortError::Unexpected("analysis unavailable".to_string()))
    }
}

/// Assistant stub that answers every message with the same text.
pub struct CannedAssistant(pub String);

#[async_trait]
impl AssistantService for CannedAssistant {
    async fn reply(&self, _history: &[ChatMessage], _message: &str) -> PortResult<String> {
        Ok(self.0.clone())
    }
}
