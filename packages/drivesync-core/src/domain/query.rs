//! Typed synchronization root query
//!
//! Selects the documents whose subscription list holds an enabled entry for
//! a user, skipping deleted documents. Stores interpret the struct; the
//! `Display` rendering is for logs only.

use std::fmt;

use super::models::UserId;
use crate::config::constants;

/// Sortable document attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRootQuery {
    pub user: UserId,
    pub excluded_lifecycle_state: String,
    pub order: Vec<(SortKey, SortOrder)>,
}

impl SyncRootQuery {
    /// Enabled subscriptions of `user`, by title then newest first
    pub fn for_user(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            excluded_lifecycle_state: constants::document::DELETED_LIFECYCLE_STATE.to_string(),
            order: vec![
                (SortKey::Title, SortOrder::Ascending),
                (SortKey::Created, SortOrder::Descending),
            ],
        }
    }
}

/// Quote a string literal, escaping backslashes and single quotes
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

impl fmt::Display for SyncRootQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SELECT ecm:uuid FROM Document WHERE subscriptions/*1/username = {} \
             AND subscriptions/*1/enabled = 1 AND ecm:currentLifeCycleState <> {}",
            quote_literal(&self.user),
            quote_literal(&self.excluded_lifecycle_state)
        )?;
        for (i, (key, order)) in self.order.iter().enumerate() {
            f.write_str(if i == 0 { " ORDER BY " } else { ", " })?;
            f.write_str(match key {
                SortKey::Title => "dc:title",
                SortKey::Created => "dc:created",
            })?;
            if *order == SortOrder::Descending {
                f.write_str(" DESC")?;
            }
        }
        Ok(())
    }
}
