//! crates/ewaste_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format; status and
//! role vocabularies live next to the logic that governs them (`lifecycle`,
//! `authz`).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::AdminRole;
use crate::lifecycle::{Availability, CollectionStatus, ReportStatus};

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The authenticated caller of a request.
///
/// Resolved once per request by the auth layer and passed explicitly to
/// whatever needs it; nothing in the core reads a global "current user".
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// A time-boxed window of offline-tolerant access.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineSession {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

/// A role assignment row. Inactive rows grant nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub role: AdminRole,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A pickup request for registered e-waste.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub status: CollectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assessed severity of an illegal dumping site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse used for LLM output and stored rows ("High", "high ", ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// The result of analysing a dumping report.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpingAnalysis {
    pub severity: Severity,
    pub recommendations: String,
}

/// A citizen report of illegally dumped e-waste.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpingReport {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub description: String,
    pub location: String,
    pub waste_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub severity: Severity,
    pub recommendations: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A used device offered on the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceListing {
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
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A device registered for recycling. Status starts at `registered`.
#[derive(Debug, Clone, PartialEq)]
pub struct EWasteItem {
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

pub const ITEM_REGISTERED: &str = "registered";

/// Who said a line in an assistant conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A saved assistant conversation. `updated_at` moves with every new message.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredChatMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredChatMessage> for ChatMessage {
    fn from(m: StoredChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content,
        }
    }
}

/// Platform-wide row counts behind the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCounts {
    pub users: i64,
    pub collection_requests: i64,
    pub pending_collection_requests: i64,
    pub completed_collection_requests: i64,
    pub dumping_reports: i64,
    pub open_dumping_reports: i64,
    pub available_listings: i64,
    pub registered_items: i64,
    pub active_offline_sessions: i64,
}
