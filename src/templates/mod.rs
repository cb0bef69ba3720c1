//! Reusable page templates. A template holds an ordered snapshot of
//! block payloads, never live blocks; instantiating one materializes a
//! fresh page whose blocks get new ids and 0..n-1 positions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_router::actor_id;
use crate::documents::{Block, BlockPayload, CreatePage, DocumentStore, Page};
use crate::shared::error::{CoreError, CoreResult};
use crate::shared::state::AppState;
use crate::storage::{Collection, Record};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub icon: Option<String>,
    pub content: Vec<BlockPayload>,
    pub is_public: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Template {
    const COLLECTION: &'static str = "templates";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("category", self.category.clone())]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub content: Vec<BlockPayload>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Clone)]
pub struct TemplatesService {
    templates: Arc<dyn Collection<Template>>,
    store: DocumentStore,
}

impl TemplatesService {
    pub fn new(templates: Arc<dyn Collection<Template>>, store: DocumentStore) -> Self {
        Self { templates, store }
    }

    pub async fn create(&self, req: CreateTemplate, actor: &str) -> CoreResult<Template> {
        if req.name.trim().is_empty() {
            return Err(CoreError::Validation("template name is required".into()));
        }
        if req.category.trim().is_empty() {
            return Err(CoreError::Validation("template category is required".into()));
        }
        for payload in &req.content {
            payload.validate()?;
        }
        let template = Template {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            category: req.category,
            icon: req.icon,
            content: req.content,
            is_public: req.is_public,
            created_by: actor.to_string(),
            created_at: Utc::now(),
        };
        self.templates.put(template.clone()).await?;
        Ok(template)
    }

    pub async fn get(&self, template_id: Uuid) -> CoreResult<Option<Template>> {
        Ok(self.templates.get(&template_id.to_string()).await?)
    }

    pub async fn list(&self) -> CoreResult<Vec<Template>> {
        let mut templates = self.templates.list().await?;
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    pub async fn list_by_category(&self, category: &str) -> CoreResult<Vec<Template>> {
        let mut templates = self.templates.find_by("category", category).await?;
        templates.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    /// Creates a page from the template's content snapshot. Blocks are
    /// appended in snapshot order, so they come out numbered 0..n-1.
    pub async fn instantiate(
        &self,
        template_id: Uuid,
        workspace_id: Uuid,
        parent_page_id: Option<Uuid>,
        title: Option<String>,
        actor: &str,
    ) -> CoreResult<(Page, Vec<Block>)> {
        let template = self
            .get(template_id)
            .await?
            .ok_or_else(|| CoreError::not_found("template", template_id))?;

        let page = self
            .store
            .create_page(
                CreatePage {
                    workspace_id,
                    title: title.unwrap_or_else(|| template.name.clone()),
                    icon: template.icon.clone(),
                    cover_image: None,
                    parent_page_id,
                    is_private: false,
                },
                actor,
            )
            .await?;

        for payload in &template.content {
            self.store
                .create_block(page.id, payload.clone(), None, actor)
                .await?;
        }

        let blocks = self.store.list_blocks(page.id).await?;
        Ok((page, blocks))
    }
}

// ===== Routes =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstantiateTemplateRequest {
    workspace_id: Uuid,
    parent_page_id: Option<Uuid>,
    title: Option<String>,
}

async fn list_templates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Json<Vec<Template>>, CoreError> {
    let templates = match params.get("category") {
        Some(category) => state.templates.list_by_category(category).await?,
        None => state.templates.list().await?,
    };
    Ok(Json(templates))
}

async fn create_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTemplate>,
) -> Result<(StatusCode, Json<Template>), CoreError> {
    let actor = actor_id(&headers);
    let template = state.templates.create(req, &actor).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<Template>, CoreError> {
    let template = state
        .templates
        .get(template_id)
        .await?
        .ok_or_else(|| CoreError::not_found("template", template_id))?;
    Ok(Json(template))
}

async fn instantiate_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(template_id): Path<Uuid>,
    Json(req): Json<InstantiateTemplateRequest>,
) -> Result<(StatusCode, Json<Page>), CoreError> {
    let actor = actor_id(&headers);
    match req.parent_page_id {
        Some(parent_id) => {
            state
                .gate
                .require_page(&actor, parent_id, crate::access::Action::Edit)
                .await?;
        }
        None => {
            state
                .gate
                .require_workspace(&actor, req.workspace_id, false)
                .await?;
        }
    }
    let (page, _) = state
        .templates
        .instantiate(template_id, req.workspace_id, req.parent_page_id, req.title, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub fn configure_templates_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/templates", get(list_templates).post(create_template))
        .route("/api/templates/:template_id", get(get_template))
        .route(
            "/api/templates/:template_id/instantiate",
            post(instantiate_template),
        )
}
