//! Per-user ordered favorites list, a thin manager layered on the
//! document store's collections.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_router::actor_id;
use crate::documents::Page;
use crate::shared::error::{CoreError, CoreResult};
use crate::shared::state::AppState;
use crate::storage::{commit_with_retry, Collection, Record};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub user_id: String,
    pub page_id: Uuid,
    pub order: i64,
    pub added_at: DateTime<Utc>,
}

impl Favorite {
    pub fn storage_key(user_id: &str, page_id: Uuid) -> String {
        format!("{user_id}/{page_id}")
    }
}

impl Record for Favorite {
    const COLLECTION: &'static str = "favorites";

    fn key(&self) -> String {
        Self::storage_key(&self.user_id, self.page_id)
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("user", self.user_id.clone())]
    }
}

#[derive(Clone)]
pub struct FavoritesService {
    favorites: Arc<dyn Collection<Favorite>>,
    pages: Arc<dyn Collection<Page>>,
}

impl FavoritesService {
    pub fn new(
        favorites: Arc<dyn Collection<Favorite>>,
        pages: Arc<dyn Collection<Page>>,
    ) -> Self {
        Self { favorites, pages }
    }

    /// Appends the page to the end of the user's list. Adding a page that
    /// is already a favorite returns the existing entry unchanged.
    pub async fn add(&self, user_id: &str, page_id: Uuid) -> CoreResult<Favorite> {
        self.pages
            .get(&page_id.to_string())
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        let user_id = user_id.to_string();
        commit_with_retry(&self.favorites, move |records| {
            if let Some(existing) = records
                .iter()
                .find(|f| f.user_id == user_id && f.page_id == page_id)
            {
                return Ok(existing.clone());
            }
            let order = records
                .iter()
                .filter(|f| f.user_id == user_id)
                .map(|f| f.order)
                .max()
                .map(|max| max + 1)
                .unwrap_or(0);
            let favorite = Favorite {
                user_id: user_id.clone(),
                page_id,
                order,
                added_at: Utc::now(),
            };
            records.push(favorite.clone());
            Ok(favorite)
        })
        .await
    }

    pub async fn remove(&self, user_id: &str, page_id: Uuid) -> CoreResult<()> {
        let removed = self
            .favorites
            .remove(&Favorite::storage_key(user_id, page_id))
            .await?;
        if !removed {
            return Err(CoreError::not_found("favorite", page_id));
        }
        Ok(())
    }

    pub async fn list(&self, user_id: &str) -> CoreResult<Vec<Favorite>> {
        let mut favorites = self.favorites.find_by("user", user_id).await?;
        favorites.sort_by(|a, b| a.order.cmp(&b.order).then(a.added_at.cmp(&b.added_at)));
        Ok(favorites)
    }
}

// ===== Routes =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFavoriteRequest {
    page_id: Uuid,
}

async fn list_favorites(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Favorite>>, CoreError> {
    let actor = actor_id(&headers);
    if actor != user_id {
        return Err(CoreError::PermissionDenied);
    }
    Ok(Json(state.favorites.list(&user_id).await?))
}

async fn add_favorite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<Favorite>), CoreError> {
    let actor = actor_id(&headers);
    state
        .gate
        .require_page(&actor, req.page_id, crate::access::Action::Read)
        .await?;
    let favorite = state.favorites.add(&actor, req.page_id).await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, page_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, CoreError> {
    let actor = actor_id(&headers);
    if actor != user_id {
        return Err(CoreError::PermissionDenied);
    }
    state.favorites.remove(&user_id, page_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_favorites_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/favorites", axum::routing::post(add_favorite))
        .route("/api/favorites/:user_id", get(list_favorites))
        .route(
            "/api/favorites/:user_id/:page_id",
            axum::routing::delete(remove_favorite),
        )
}
