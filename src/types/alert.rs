use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

pub type AlertId = u64;
pub type SubjectId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse().map(UserId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertKind {
    #[serde(rename = "EXPIRE_IN_3")]
    ExpireIn3,
    #[serde(rename = "EXPIRE_IN_1")]
    ExpireIn1,
    #[serde(rename = "EXPIRE_TODAY")]
    ExpireToday,
    #[serde(rename = "SYSTEM")]
    System,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::ExpireIn3 => "EXPIRE_IN_3",
            AlertKind::ExpireIn1 => "EXPIRE_IN_1",
            AlertKind::ExpireToday => "EXPIRE_TODAY",
            AlertKind::System => "SYSTEM",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted expiry notice for one user.
///
/// `read` and `read_at` only change through the read actions of
/// [`crate::alerts::AlertService`]; everything else is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    pub subject_id: Option<SubjectId>,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub user_id: UserId,
    pub subject_id: Option<SubjectId>,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// One row reported by an expiry source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringItem {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub item_name: String,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContact {
    pub user_id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub email_alerts: bool,
}

impl UserContact {
    /// Address to mail, present only when the user registered one and opted in.
    pub fn mail_address(&self) -> Option<&str> {
        if !self.email_alerts {
            return None;
        }
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
    pub unread_count: u64,
}
