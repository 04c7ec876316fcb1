//! Platform metrics for the admin dashboard.

use serde::Serialize;

use crate::domain::PlatformCounts;

/// One dashboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub metric: &'static str,
    pub description: &'static str,
    pub value: i64,
}

/// Dashboard rows in display order.
pub fn metrics(counts: &PlatformCounts) -> Vec<Metric> {
    let row = |metric: &'static str, description: &'static str, value: i64| Metric {
        metric,
        description,
        value,
    };
    vec![
        row("total_users", "Registered users", counts.users),
        row("total_collection_requests", "Pickup requests ever made", counts.collection_requests),
        row(
            "pending_collection_requests",
            "Pickups waiting for confirmation",
            counts.pending_collection_requests,
        ),
        row(
            "completed_collection_requests",
            "Pickups completed",
            counts.completed_collection_requests,
        ),
        row("total_dumping_reports", "Illegal dumping reports filed", counts.dumping_reports),
        row(
            "open_dumping_reports",
            "Dumping reports not yet resolved",
            counts.open_dumping_reports,
        ),
        row(
            "available_listings",
            "Marketplace listings still available",
            counts.available_listings,
        ),
        row("registered_items", "Devices registered for recycling", counts.registered_items),
        row(
            "active_offline_sessions",
            "Users currently in offline mode",
            counts.active_offline_sessions,
        ),
    ]
}
