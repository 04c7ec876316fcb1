//! Status state machines for collection requests, dumping reports and
//! marketplace listings.
//!
//! All three share one shape: a record starts in an initial state, moves
//! forward one step at a time when a reviewer advances it, and ends in a
//! terminal state. Owners may only leave through their own exit (cancel a
//! pending collection request, toggle a listing).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Owner,
    Reviewer,
}

pub trait Lifecycle: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    fn initial() -> Self;

    fn as_str(self) -> &'static str;

    fn is_terminal(self) -> bool;

    /// Whether `actor` may move a record from `self` to `next`.
    fn can_transition(self, next: Self, actor: Actor) -> bool;
}

#[derive(Debug, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

//=========================================================================================
// Collection Requests
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl Lifecycle for CollectionStatus {
    fn initial() -> Self {
        CollectionStatus::Pending
    }

    fn as_str(self) -> &'static str {
        match self {
            CollectionStatus::Pending => "pending",
            CollectionStatus::Confirmed => "confirmed",
            CollectionStatus::InProgress => "in_progress",
            CollectionStatus::Completed => "completed",
            CollectionStatus::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, CollectionStatus::Completed | CollectionStatus::Cancelled)
    }

    fn can_transition(self, next: Self, actor: Actor) -> bool {
        use CollectionStatus::*;
        match actor {
            Actor::Owner => matches!((self, next), (Pending, Cancelled)),
            Actor::Reviewer => matches!(
                (self, next),
                (Pending, Confirmed) | (Confirmed, InProgress) | (InProgress, Completed)
            ),
        }
    }
}

impl FromStr for CollectionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CollectionStatus::Pending),
            "confirmed" => Ok(CollectionStatus::Confirmed),
            "in_progress" => Ok(CollectionStatus::InProgress),
            "completed" => Ok(CollectionStatus::Completed),
            "cancelled" => Ok(CollectionStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

//=========================================================================================
// Dumping Reports
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

impl Lifecycle for ReportStatus {
    fn initial() -> Self {
        ReportStatus::Pending
    }

    fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
        }
    }

    fn is_terminal(self) -> bool {
        self == ReportStatus::Resolved
    }

    fn can_transition(self, next: Self, actor: Actor) -> bool {
        use ReportStatus::*;
        match actor {
            Actor::Owner => false,
            Actor::Reviewer => matches!((self, next), (Pending, InProgress) | (InProgress, Resolved)),
        }
    }
}

impl FromStr for ReportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "in_progress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

//=========================================================================================
// Marketplace Listings
//=========================================================================================

/// Listings toggle rather than progress; neither state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

impl Availability {
    pub fn from_flag(is_available: bool) -> Self {
        if is_available {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    pub fn is_available(self) -> bool {
        self == Availability::Available
    }
}

impl Lifecycle for Availability {
    fn initial() -> Self {
        Availability::Available
    }

    fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
        }
    }

    fn is_terminal(self) -> bool {
        false
    }

    fn can_transition(self, next: Self, actor: Actor) -> bool {
        actor == Actor::Owner && self != next
    }
}
