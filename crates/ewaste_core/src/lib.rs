pub mod analytics;
pub mod authz;
pub mod chat;
pub mod clock;
pub mod domain;
pub mod features;
pub mod feed;
pub mod guard;
pub mod lifecycle;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod offline;
pub mod ports;
pub mod records;
pub mod validation;

pub use analytics::{metrics, Metric};
pub use authz::{AdminRole, Authorizer};
pub use chat::ChatHistory;
pub use clock::{ManualClock, SystemClock};
pub use domain::{
    AdminUser, AuthContext, ChatMessage, ChatRole, CollectionRequest, Conversation,
    DumpingAnalysis, DumpingReport, EWasteItem, MarketplaceListing, OfflineSession,
    PlatformCounts, Severity, StoredChatMessage, User, UserCredentials,
};
pub use features::{capabilities, Capability, OfflineCapabilities};
pub use feed::{BroadcastFeed, Collection, Invalidated, Subscription};
pub use guard::SubmissionGuard;
pub use lifecycle::{Actor, Availability, CollectionStatus, Lifecycle, ReportStatus};
pub use offline::{Countdown, CountdownRunner, OfflineMode, Tick};
pub use ports::{
    AssistantService, ChangeFeed, Clock, DatabaseService, DumpingAnalysisService, PortError,
    PortResult,
};
pub use records::{RecordError, RecordResult, RecordService, RegisteredItem};
pub use validation::{
    CollectionRequestInput, DumpingReportInput, FieldError, ItemInput, ListingInput,
    ValidationErrors,
};
