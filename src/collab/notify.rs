//! Notification fan-out. The dispatcher runs after the triggering write
//! has committed; a failed or duplicated notification must never turn a
//! successful mutation into a failed one, so every storage error is
//! logged and swallowed here.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::documents::PageShare;
use crate::storage::Collection;

use super::{Comment, Notification, NotificationKind};

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn Collection<Notification>>,
}

impl NotificationDispatcher {
    pub fn new(notifications: Arc<dyn Collection<Notification>>) -> Self {
        Self { notifications }
    }

    /// One `mention` notification per mentioned user, at least once.
    pub async fn comment_mentions(&self, comment: &Comment) {
        for user_id in &comment.mentions {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                kind: NotificationKind::Mention,
                title: "You were mentioned".to_string(),
                message: "You were mentioned in a comment".to_string(),
                page_id: Some(comment.page_id),
                block_id: comment.block_id,
                comment_id: Some(comment.id),
                related_user_id: Some(comment.created_by.clone()),
                read: false,
                created_at: Utc::now(),
            };
            if let Err(err) = self.notifications.put(notification).await {
                tracing::warn!(
                    user_id = %user_id,
                    comment_id = %comment.id,
                    error = %err,
                    "dropping mention notification"
                );
            }
        }
    }

    pub async fn page_shared(&self, share: &PageShare, page_title: &str) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: share.user_id.clone(),
            kind: NotificationKind::Share,
            title: "A page was shared with you".to_string(),
            message: format!("\"{page_title}\" was shared with you"),
            page_id: Some(share.page_id),
            block_id: None,
            comment_id: None,
            related_user_id: Some(share.shared_by.clone()),
            read: false,
            created_at: Utc::now(),
        };
        if let Err(err) = self.notifications.put(notification).await {
            tracing::warn!(
                user_id = %share.user_id,
                page_id = %share.page_id,
                error = %err,
                "dropping share notification"
            );
        }
    }
}
