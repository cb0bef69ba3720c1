//! Comments and notifications. Comment creation validates its anchors
//! (page, block, parent comment) against live state, persists the
//! comment, and only then hands the mention set to the dispatcher; a
//! notification failure never rolls the comment back.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Action;
use crate::api_router::actor_id;
use crate::documents::{Block, Page};
use crate::shared::error::{CoreError, CoreResult};
use crate::shared::state::AppState;
use crate::storage::{Collection, Record};

pub mod notify;

pub use notify::NotificationDispatcher;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub page_id: Uuid,
    pub block_id: Option<Uuid>,
    pub content: String,
    pub mentions: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved: bool,
    pub parent_comment_id: Option<Uuid>,
}

impl Record for Comment {
    const COLLECTION: &'static str = "comments";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![("page", self.page_id.to_string())];
        if let Some(block_id) = self.block_id {
            entries.push(("block", block_id.to_string()));
        }
        entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Mention,
    Comment,
    Share,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub page_id: Option<Uuid>,
    pub block_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub related_user_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("user", self.user_id.clone())]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComment {
    pub page_id: Uuid,
    pub block_id: Option<Uuid>,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub parent_comment_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CollabService {
    pages: Arc<dyn Collection<Page>>,
    blocks: Arc<dyn Collection<Block>>,
    comments: Arc<dyn Collection<Comment>>,
    notifications: Arc<dyn Collection<Notification>>,
    dispatcher: NotificationDispatcher,
}

impl CollabService {
    pub fn new(
        pages: Arc<dyn Collection<Page>>,
        blocks: Arc<dyn Collection<Block>>,
        comments: Arc<dyn Collection<Comment>>,
        notifications: Arc<dyn Collection<Notification>>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            pages,
            blocks,
            comments,
            notifications,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub async fn create_comment(&self, req: CreateComment, author: &str) -> CoreResult<Comment> {
        if req.content.trim().is_empty() {
            return Err(CoreError::Validation("comment content is required".into()));
        }
        self.pages
            .get(&req.page_id.to_string())
            .await?
            .ok_or_else(|| CoreError::not_found("page", req.page_id))?;

        if let Some(block_id) = req.block_id {
            let block = self
                .blocks
                .get(&block_id.to_string())
                .await?
                .ok_or_else(|| CoreError::not_found("block", block_id))?;
            if block.page_id != req.page_id {
                return Err(CoreError::Validation(
                    "block belongs to a different page".into(),
                ));
            }
        }

        if let Some(parent_id) = req.parent_comment_id {
            let parent = self
                .comments
                .get(&parent_id.to_string())
                .await?
                .ok_or_else(|| CoreError::not_found("comment", parent_id))?;
            if parent.page_id != req.page_id {
                return Err(CoreError::Validation(
                    "parent comment belongs to a different page".into(),
                ));
            }
        }

        // Mentions are a set; repeats collapse to one notification.
        let mut mentions: Vec<String> = Vec::new();
        for mention in req.mentions {
            if !mentions.contains(&mention) {
                mentions.push(mention);
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            page_id: req.page_id,
            block_id: req.block_id,
            content: req.content,
            mentions,
            created_by: author.to_string(),
            created_at: now,
            updated_at: now,
            resolved: false,
            parent_comment_id: req.parent_comment_id,
        };
        self.comments.put(comment.clone()).await?;

        self.dispatcher.comment_mentions(&comment).await;

        Ok(comment)
    }

    pub async fn list_by_page(&self, page_id: Uuid) -> CoreResult<Vec<Comment>> {
        let mut comments = self.comments.find_by("page", &page_id.to_string()).await?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    pub async fn list_by_block(&self, block_id: Uuid) -> CoreResult<Vec<Comment>> {
        let mut comments = self.comments.find_by("block", &block_id.to_string()).await?;
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    pub async fn resolve_comment(&self, comment_id: Uuid) -> CoreResult<Comment> {
        let mut comment = self
            .comments
            .get(&comment_id.to_string())
            .await?
            .ok_or_else(|| CoreError::not_found("comment", comment_id))?;
        comment.resolved = true;
        comment.updated_at = Utc::now();
        self.comments.put(comment.clone()).await?;
        Ok(comment)
    }

    pub async fn list_notifications(&self, user_id: &str) -> CoreResult<Vec<Notification>> {
        let mut notifications = self.notifications.find_by("user", user_id).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    pub async fn mark_notification_read(&self, notification_id: Uuid) -> CoreResult<Notification> {
        let mut notification = self
            .notifications
            .get(&notification_id.to_string())
            .await?
            .ok_or_else(|| CoreError::not_found("notification", notification_id))?;
        notification.read = true;
        self.notifications.put(notification.clone()).await?;
        Ok(notification)
    }
}

// ===== Routes =====

async fn create_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateComment>,
) -> Result<(StatusCode, Json<Comment>), CoreError> {
    let actor = actor_id(&headers);
    state
        .gate
        .require_page(&actor, req.page_id, Action::Comment)
        .await?;
    let comment = state.collab.create_comment(req, &actor).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_page_comments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    Ok(Json(state.collab.list_by_page(page_id).await?))
}

async fn list_block_comments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(block_id): Path<Uuid>,
) -> Result<Json<Vec<Comment>>, CoreError> {
    let actor = actor_id(&headers);
    let block = state
        .store
        .get_block(block_id)
        .await?
        .ok_or_else(|| CoreError::not_found("block", block_id))?;
    state
        .gate
        .require_page(&actor, block.page_id, Action::Read)
        .await?;
    Ok(Json(state.collab.list_by_block(block_id).await?))
}

async fn resolve_comment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Comment>, CoreError> {
    let actor = actor_id(&headers);
    let comment = state
        .collab
        .comments
        .get(&comment_id.to_string())
        .await?
        .ok_or_else(|| CoreError::not_found("comment", comment_id))?;
    state
        .gate
        .require_page(&actor, comment.page_id, Action::Comment)
        .await?;
    Ok(Json(state.collab.resolve_comment(comment_id).await?))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>, CoreError> {
    let actor = actor_id(&headers);
    if actor != user_id {
        return Err(CoreError::PermissionDenied);
    }
    Ok(Json(state.collab.list_notifications(&user_id).await?))
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Notification>, CoreError> {
    let actor = actor_id(&headers);
    let notification = state
        .collab
        .notifications
        .get(&notification_id.to_string())
        .await?
        .ok_or_else(|| CoreError::not_found("notification", notification_id))?;
    if notification.user_id != actor {
        return Err(CoreError::PermissionDenied);
    }
    Ok(Json(
        state.collab.mark_notification_read(notification_id).await?,
    ))
}

pub fn configure_collab_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/comments", post(create_comment))
        .route("/api/comments/page/:page_id", get(list_page_comments))
        .route("/api/comments/block/:block_id", get(list_block_comments))
        .route("/api/comments/:comment_id/resolve", put(resolve_comment))
        .route("/api/notifications/user/:user_id", get(list_notifications))
        .route(
            "/api/notifications/:notification_id/read",
            put(mark_notification_read),
        )
}
