//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Status columns are plain text guarded by CHECK constraints; every status
//! write is a conditional UPDATE so a concurrent change makes it affect no rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ewaste_core::authz::AdminRole;
use ewaste_core::domain::{
    AdminUser, ChatRole, CollectionRequest, Conversation, DumpingAnalysis, DumpingReport,
    EWasteItem, MarketplaceListing, OfflineSession, PlatformCounts, Severity, StoredChatMessage,
    User, UserCredentials, ITEM_REGISTERED,
};
use ewaste_core::lifecycle::{Availability, CollectionStatus, Lifecycle, ReportStatus};
use ewaste_core::ports::{DatabaseService, PortError, PortResult};
use ewaste_core::validation::{
    CollectionRequestInput, DumpingReportInput, ItemInput, ListingInput,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(kind: &'static str, id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", kind, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn corrupt(column: &str, e: impl std::fmt::Display) -> PortError {
    PortError::Unexpected(format!("unreadable {} column: {}", column, e))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: Some(self.email),
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct OfflineSessionRecord {
    id: Uuid,
    user_id: Uuid,
    started_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    is_active: bool,
}
impl OfflineSessionRecord {
    fn to_domain(self) -> OfflineSession {
        OfflineSession {
            id: self.id,
            owner_id: self.user_id,
            started_at: self.started_at,
            expires_at: self.expires_at,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct AdminUserRecord {
    id: Uuid,
    user_id: Uuid,
    role: String,
    is_active: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}
impl AdminUserRecord {
    fn to_domain(self) -> PortResult<AdminUser> {
        Ok(AdminUser {
            id: self.id,
            owner_id: self.user_id,
            role: self.role.parse().map_err(|e| corrupt("role", e))?,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CollectionRequestRecord {
    id: Uuid,
    user_id: Uuid,
    address: String,
    city: String,
    state: String,
    postal_code: String,
    scheduled_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CollectionRequestRecord {
    fn to_domain(self) -> PortResult<CollectionRequest> {
        Ok(CollectionRequest {
            id: self.id,
            owner_id: self.user_id,
            address: self.address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            scheduled_date: self.scheduled_date,
            notes: self.notes,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DumpingReportRecord {
    id: Uuid,
    user_id: Uuid,
    description: String,
    location: String,
    waste_type: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    severity: String,
    ai_recommendations: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl DumpingReportRecord {
    fn to_domain(self) -> PortResult<DumpingReport> {
        Ok(DumpingReport {
            id: self.id,
            owner_id: self.user_id,
            description: self.description,
            location: self.location,
            waste_type: self.waste_type,
            latitude: self.latitude,
            longitude: self.longitude,
            severity: Severity::parse(&self.severity)
                .ok_or_else(|| corrupt("severity", &self.severity))?,
            recommendations: self.ai_recommendations,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ListingRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    device_type: String,
    condition: String,
    price: f64,
    is_free: bool,
    location: String,
    image_url: Option<String>,
    is_available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ListingRecord {
    fn to_domain(self) -> MarketplaceListing {
        MarketplaceListing {
            id: self.id,
            owner_id: self.user_id,
            title: self.title,
            description: self.description,
            device_type: self.device_type,
            condition: self.condition,
            price: self.price,
            is_free: self.is_free,
            location: self.location,
            image_url: self.image_url,
            availability: Availability::from_flag(self.is_available),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ItemRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    category: String,
    brand: String,
    model: Option<String>,
    condition: String,
    description: Option<String>,
    image_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ItemRecord {
    fn to_domain(self) -> EWasteItem {
        EWasteItem {
            id: self.id,
            owner_id: self.user_id,
            name: self.name,
            category: self.category,
            brand: self.brand,
            model: self.model,
            condition: self.condition,
            description: self.description,
            image_url: self.image_url,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ITEM_COLUMNS: &str = "id, user_id, name, category, brand, model, condition, description, image_url, status, created_at, updated_at";

#[derive(FromRow)]
struct ConversationRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ConversationRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            id: self.id,
            owner_id: self.user_id,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<StoredChatMessage> {
        Ok(StoredChatMessage {
            id: self.id,
            conversation_id: self.conversation_id,
            role: ChatRole::parse(&self.role).ok_or_else(|| corrupt("role", &self.role))?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CountsRecord {
    users: i64,
    collection_requests: i64,
    pending_collection_requests: i64,
    completed_collection_requests: i64,
    dumping_reports: i64,
    open_dumping_reports: i64,
    available_listings: i64,
    registered_items: i64,
    active_offline_sessions: i64,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Users and Auth Sessions ---

    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => {
                PortError::Conflict(format!("email {} already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT user_id, email FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("User", user_id))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Offline Sessions ---

    async fn start_offline_session(
        &self,
        owner_id: Uuid,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> PortResult<OfflineSession> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("UPDATE offline_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active")
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, OfflineSessionRecord>(
            "INSERT INTO offline_sessions (id, user_id, started_at, expires_at, is_active) \
             VALUES ($1, $2, $3, $4, TRUE) \
             RETURNING id, user_id, started_at, expires_at, is_active",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(started_at)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn find_active_offline_session(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Option<OfflineSession>> {
        let record = sqlx::query_as::<_, OfflineSessionRecord>(
            "SELECT id, user_id, started_at, expires_at, is_active FROM offline_sessions \
             WHERE user_id = $1 AND is_active AND expires_at > $2 \
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(owner_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(OfflineSessionRecord::to_domain))
    }

    async fn deactivate_offline_sessions(&self, owner_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE offline_sessions SET is_active = FALSE WHERE user_id = $1 AND is_active",
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    // --- Admin Procedures ---

    async fn admin_role_of(&self, owner_id: Uuid) -> PortResult<Option<AdminRole>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM admin_users WHERE user_id = $1 AND is_active",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        role.map(|r| r.parse().map_err(|e| corrupt("role", e))).transpose()
    }

    async fn list_admin_users(&self) -> PortResult<Vec<AdminUser>> {
        let records = sqlx::query_as::<_, AdminUserRecord>(
            "SELECT id, user_id, role, is_active, created_by, created_at FROM admin_users \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(AdminUserRecord::to_domain).collect()
    }

    async fn grant_admin_role(
        &self,
        owner_id: Uuid,
        role: AdminRole,
        granted_by: Uuid,
    ) -> PortResult<AdminUser> {
        let record = sqlx::query_as::<_, AdminUserRecord>(
            "INSERT INTO admin_users (id, user_id, role, is_active, created_by) \
             VALUES ($1, $2, $3, TRUE, $4) \
             ON CONFLICT (user_id) DO UPDATE \
             SET role = EXCLUDED.role, is_active = TRUE, created_by = EXCLUDED.created_by \
             RETURNING id, user_id, role, is_active, created_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(role.as_str())
        .bind(granted_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_foreign_key_violation() => {
                PortError::NotFound(format!("User {} not found", owner_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn initialize_first_admin(&self, email: &str) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Serializes concurrent bootstraps; the loser sees the winner's row.
        sqlx::query("LOCK TABLE admin_users IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let any_admin = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM admin_users)")
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
        if any_admin {
            return Ok(false);
        }

        let user_id = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        let Some(user_id) = user_id else {
            return Ok(false);
        };

        sqlx::query(
            "INSERT INTO admin_users (id, user_id, role, is_active) VALUES ($1, $2, $3, TRUE)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(AdminRole::SuperAdmin.as_str())
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }

    async fn add_eco_points(&self, owner_id: Uuid, points: i32) -> PortResult<()> {
        sqlx::query("UPDATE users SET eco_points = eco_points + $2 WHERE user_id = $1")
            .bind(owner_id)
            .bind(i64::from(points))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn eco_points_of(&self, owner_id: Uuid) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT eco_points FROM users WHERE user_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected("User", owner_id))
    }

    // --- Collection Requests ---

    async fn insert_collection_request(
        &self,
        owner_id: Uuid,
        input: &CollectionRequestInput,
        now: DateTime<Utc>,
    ) -> PortResult<CollectionRequest> {
        let record = sqlx::query_as::<_, CollectionRequestRecord>(
            "INSERT INTO collection_requests \
             (id, user_id, address, city, state, postal_code, scheduled_date, notes, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
             RETURNING id, user_id, address, city, state, postal_code, scheduled_date, notes, status, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.address.trim())
        .bind(input.city.trim())
        .bind(input.state_or_default())
        .bind(input.postal_code.trim())
        .bind(input.scheduled_date)
        .bind(input.notes.as_deref())
        .bind(CollectionStatus::initial().as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_collection_requests(&self, owner_id: Uuid) -> PortResult<Vec<CollectionRequest>> {
        let records = sqlx::query_as::<_, CollectionRequestRecord>(
            "SELECT id, user_id, address, city, state, postal_code, scheduled_date, notes, status, created_at, updated_at \
             FROM collection_requests WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(CollectionRequestRecord::to_domain).collect()
    }

    async fn get_collection_request(&self, id: Uuid) -> PortResult<CollectionRequest> {
        let record = sqlx::query_as::<_, CollectionRequestRecord>(
            "SELECT id, user_id, address, city, state, postal_code, scheduled_date, notes, status, created_at, updated_at \
             FROM collection_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Collection request", id))?;
        record.to_domain()
    }

    async fn update_collection_status(
        &self,
        id: Uuid,
        expected: CollectionStatus,
        next: CollectionStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE collection_requests SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    // --- Dumping Reports ---

    async fn insert_dumping_report(
        &self,
        owner_id: Uuid,
        input: &DumpingReportInput,
        analysis: &DumpingAnalysis,
        now: DateTime<Utc>,
    ) -> PortResult<DumpingReport> {
        let record = sqlx::query_as::<_, DumpingReportRecord>(
            "INSERT INTO dumping_reports \
             (id, user_id, description, location, waste_type, latitude, longitude, severity, ai_recommendations, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             RETURNING id, user_id, description, location, waste_type, latitude, longitude, severity, ai_recommendations, status, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.description.trim())
        .bind(input.location.trim())
        .bind(input.waste_type.trim())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(analysis.severity.as_str())
        .bind(analysis.recommendations.as_str())
        .bind(ReportStatus::initial().as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_dumping_reports(&self, owner_id: Uuid) -> PortResult<Vec<DumpingReport>> {
        let records = sqlx::query_as::<_, DumpingReportRecord>(
            "SELECT id, user_id, description, location, waste_type, latitude, longitude, severity, ai_recommendations, status, created_at, updated_at \
             FROM dumping_reports WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(DumpingReportRecord::to_domain).collect()
    }

    async fn get_dumping_report(&self, id: Uuid) -> PortResult<DumpingReport> {
        let record = sqlx::query_as::<_, DumpingReportRecord>(
            "SELECT id, user_id, description, location, waste_type, latitude, longitude, severity, ai_recommendations, status, created_at, updated_at \
             FROM dumping_reports WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Dumping report", id))?;
        record.to_domain()
    }

    async fn update_report_status(
        &self,
        id: Uuid,
        expected: ReportStatus,
        next: ReportStatus,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE dumping_reports SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    // --- Marketplace Listings ---

    async fn insert_marketplace_listing(
        &self,
        owner_id: Uuid,
        input: &ListingInput,
        now: DateTime<Utc>,
    ) -> PortResult<MarketplaceListing> {
        let record = sqlx::query_as::<_, ListingRecord>(
            "INSERT INTO marketplace_listings \
             (id, user_id, title, description, device_type, condition, price, is_free, location, image_url, is_available, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12) \
             RETURNING id, user_id, title, description, device_type, condition, price, is_free, location, image_url, is_available, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.title.trim())
        .bind(input.description.trim())
        .bind(input.device_type.trim())
        .bind(input.condition.trim())
        .bind(input.price)
        .bind(input.is_free)
        .bind(input.location.trim())
        .bind(input.image_url.as_deref())
        .bind(Availability::initial().is_available())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_marketplace_listings(&self, owner_id: Uuid) -> PortResult<Vec<MarketplaceListing>> {
        let records = sqlx::query_as::<_, ListingRecord>(
            "SELECT id, user_id, title, description, device_type, condition, price, is_free, location, image_url, is_available, created_at, updated_at \
             FROM marketplace_listings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ListingRecord::to_domain).collect())
    }

    async fn list_available_listings(&self) -> PortResult<Vec<MarketplaceListing>> {
        let records = sqlx::query_as::<_, ListingRecord>(
            "SELECT id, user_id, title, description, device_type, condition, price, is_free, location, image_url, is_available, created_at, updated_at \
             FROM marketplace_listings WHERE is_available ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ListingRecord::to_domain).collect())
    }

    async fn get_marketplace_listing(&self, id: Uuid) -> PortResult<MarketplaceListing> {
        let record = sqlx::query_as::<_, ListingRecord>(
            "SELECT id, user_id, title, description, device_type, condition, price, is_free, location, image_url, is_available, created_at, updated_at \
             FROM marketplace_listings WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Listing", id))?;
        Ok(record.to_domain())
    }

    async fn set_listing_availability(
        &self,
        id: Uuid,
        availability: Availability,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE marketplace_listings SET is_available = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(availability.is_available())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Listing {} not found", id)));
        }
        Ok(())
    }

    // --- Registered Items ---

    async fn insert_e_waste_item(
        &self,
        owner_id: Uuid,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> PortResult<EWasteItem> {
        let record = sqlx::query_as::<_, ItemRecord>(&format!(
            "INSERT INTO e_waste_items \
             (id, user_id, name, category, brand, model, condition, description, image_url, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(&input.category)
        .bind(input.brand.trim())
        .bind(input.model.as_deref())
        .bind(&input.condition)
        .bind(input.description.as_deref())
        .bind(input.image_url.as_deref())
        .bind(ITEM_REGISTERED)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_e_waste_items(&self, owner_id: Uuid) -> PortResult<Vec<EWasteItem>> {
        let records = sqlx::query_as::<_, ItemRecord>(&format!(
            "SELECT {} FROM e_waste_items WHERE user_id = $1 ORDER BY created_at DESC",
            ITEM_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ItemRecord::to_domain).collect())
    }

    // --- Assistant Conversations ---

    async fn create_conversation(
        &self,
        owner_id: Uuid,
        title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "INSERT INTO chat_conversations (id, user_id, title, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING id, user_id, title, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(title)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_conversations(&self, owner_id: Uuid) -> PortResult<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, title, created_at, updated_at FROM chat_conversations \
             WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ConversationRecord::to_domain).collect())
    }

    async fn get_conversation(&self, id: Uuid) -> PortResult<Conversation> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            "SELECT id, user_id, title, created_at, updated_at FROM chat_conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Conversation", id))?;
        Ok(record.to_domain())
    }

    async fn append_chat_message(
        &self,
        conversation_id: Uuid,
        owner_id: Uuid,
        role: ChatRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<StoredChatMessage> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let touched = sqlx::query("UPDATE chat_conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if touched.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Conversation {} not found",
                conversation_id
            )));
        }

        let record = sqlx::query_as::<_, ChatMessageRecord>(
            "INSERT INTO chat_messages (id, conversation_id, user_id, role, content, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, conversation_id, role, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(owner_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn list_chat_messages(&self, conversation_id: Uuid) -> PortResult<Vec<StoredChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT id, conversation_id, role, content, created_at FROM chat_messages \
             WHERE conversation_id = $1 ORDER BY seq",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ChatMessageRecord::to_domain).collect()
    }

    async fn delete_conversation(&self, id: Uuid) -> PortResult<()> {
        // Messages go with the conversation through ON DELETE CASCADE.
        sqlx::query("DELETE FROM chat_conversations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Analytics ---

    async fn platform_counts(&self, now: DateTime<Utc>) -> PortResult<PlatformCounts> {
        let record = sqlx::query_as::<_, CountsRecord>(
            "SELECT \
             (SELECT COUNT(*) FROM users) AS users, \
             (SELECT COUNT(*) FROM collection_requests) AS collection_requests, \
             (SELECT COUNT(*) FROM collection_requests WHERE status = 'pending') AS pending_collection_requests, \
             (SELECT COUNT(*) FROM collection_requests WHERE status = 'completed') AS completed_collection_requests, \
             (SELECT COUNT(*) FROM dumping_reports) AS dumping_reports, \
             (SELECT COUNT(*) FROM dumping_reports WHERE status <> 'resolved') AS open_dumping_reports, \
             (SELECT COUNT(*) FROM marketplace_listings WHERE is_available) AS available_listings, \
             (SELECT COUNT(*) FROM e_waste_items) AS registered_items, \
             (SELECT COUNT(*) FROM offline_sessions WHERE is_active AND expires_at > $1) AS active_offline_sessions",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(PlatformCounts {
            users: record.users,
            collection_requests: record.collection_requests,
            pending_collection_requests: record.pending_collection_requests,
            completed_collection_requests: record.completed_collection_requests,
            dumping_reports: record.dumping_reports,
            open_dumping_reports: record.open_dumping_reports,
            available_listings: record.available_listings,
            registered_items: record.registered_items,
            active_offline_sessions: record.active_offline_sessions,
        })
    }
}
