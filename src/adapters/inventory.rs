use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::macros::format_description;
use tracing::warn;

use crate::ports::{ExpirySource, SourceError, UserDirectory};
use crate::types::alert::{ExpiringItem, SubjectId, UserContact, UserId};

/// Read-only users and tracked items loaded from a TOML file with `[[users]]`
/// and `[[items]]` tables.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    inner: Arc<InventoryData>,
}

#[derive(Debug, Default)]
struct InventoryData {
    users: HashMap<UserId, UserContact>,
    items: Vec<TrackedItem>,
}

#[derive(Debug, Clone)]
struct TrackedItem {
    id: SubjectId,
    user_id: UserId,
    name: String,
    expires_on: Date,
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid inventory toml: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct InventoryToml {
    #[serde(default)]
    users: Vec<UserToml>,
    #[serde(default)]
    items: Vec<ItemToml>,
}

#[derive(Debug, Deserialize)]
struct UserToml {
    id: u64,
    name: String,
    email: Option<String>,
    #[serde(default)]
    email_alerts: bool,
}

#[derive(Debug, Deserialize)]
struct ItemToml {
    id: SubjectId,
    user: u64,
    name: String,
    expires_on: String,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses an inventory, skipping malformed entries with a warning.
    pub fn from_toml_str(contents: &str) -> Result<Self, InventoryError> {
        let parsed: InventoryToml = toml::from_str(contents)?;
        let mut data = InventoryData::default();

        for user in parsed.users {
            let name = user.name.trim();
            if name.is_empty() {
                warn!(user_id = user.id, "inventory user has an empty name, ignoring");
                continue;
            }
            let user_id = UserId(user.id);
            if data.users.contains_key(&user_id) {
                warn!(user_id = user.id, "duplicate inventory user, ignoring");
                continue;
            }
            data.users.insert(
                user_id,
                UserContact {
                    user_id,
                    name: name.to_string(),
                    email: user
                        .email
                        .map(|email| email.trim().to_string())
                        .filter(|email| !email.is_empty()),
                    email_alerts: user.email_alerts,
                },
            );
        }

        let date_format = format_description!("[year]-[month]-[day]");
        for item in parsed.items {
            let expires_on = match Date::parse(item.expires_on.trim(), date_format) {
                Ok(date) => date,
                Err(err) => {
                    warn!(
                        item_id = item.id,
                        expires_on = %item.expires_on,
                        "invalid expiry date, ignoring item: {err}"
                    );
                    continue;
                }
            };
            let name = item.name.trim();
            if name.is_empty() {
                warn!(item_id = item.id, "inventory item has an empty name, ignoring");
                continue;
            }
            data.items.push(TrackedItem {
                id: item.id,
                user_id: UserId(item.user),
                name: name.to_string(),
                expires_on,
            });
        }

        Ok(Self {
            inner: Arc::new(data),
        })
    }

    pub fn user_count(&self) -> usize {
        self.inner.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.inner.items.len()
    }
}

impl ExpirySource for Inventory {
    async fn expiring_items(
        &self,
        today: Date,
        days: &[i64],
    ) -> Result<Vec<ExpiringItem>, SourceError> {
        let items = self
            .inner
            .items
            .iter()
            .filter_map(|item| {
                let days_until_expiry = (item.expires_on - today).whole_days();
                days.contains(&days_until_expiry).then(|| ExpiringItem {
                    user_id: item.user_id,
                    subject_id: item.id,
                    item_name: item.name.clone(),
                    days_until_expiry,
                })
            })
            .collect();
        Ok(items)
    }
}

impl UserDirectory for Inventory {
    async fn contact(&self, user_id: UserId) -> Result<Option<UserContact>, SourceError> {
        Ok(self.inner.users.get(&user_id).cloned())
    }
}
