//! The document store: workspaces, membership, the page tree, page
//! shares, and typed content blocks. Every relational invariant is
//! enforced here, at the service boundary, never delegated to callers.
//!
//! Ordering mutations (create/move/insert/reorder) run inside a
//! snapshot/commit critical section so concurrent writers serialize and
//! sibling orders never collide.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Action;
use crate::api_router::actor_id;
use crate::collab::Comment;
use crate::favorites::Favorite;
use crate::shared::error::{CoreError, CoreResult};
use crate::shared::state::AppState;
use crate::storage::{commit_with_retry, Collection};

pub mod blocks;
pub mod search;
pub mod tree;

pub use blocks::{BlockPatch, BlockPayload, EmbedKind, TextKind};
pub use search::{SearchHit, SearchHitKind};

use crate::storage::Record;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Workspace {
    const COLLECTION: &'static str = "workspaces";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("owner", self.owner_id.clone())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub workspace_id: Uuid,
    pub user_id: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl WorkspaceMember {
    pub fn storage_key(workspace_id: Uuid, user_id: &str) -> String {
        format!("{workspace_id}/{user_id}")
    }
}

impl Record for WorkspaceMember {
    const COLLECTION: &'static str = "workspace-members";

    fn key(&self) -> String {
        Self::storage_key(self.workspace_id, &self.user_id)
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("workspace", self.workspace_id.to_string()),
            ("user", self.user_id.clone()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub parent_page_id: Option<Uuid>,
    pub order: i64,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub last_edited_by: String,
}

impl Page {
    /// Index value grouping siblings: the parent page, or a per-workspace
    /// root bucket for top-level pages.
    fn sibling_bucket(workspace_id: Uuid, parent_page_id: Option<Uuid>) -> String {
        match parent_page_id {
            Some(parent) => parent.to_string(),
            None => format!("root:{workspace_id}"),
        }
    }
}

impl Record for Page {
    const COLLECTION: &'static str = "pages";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("workspace", self.workspace_id.to_string()),
            (
                "parent",
                Self::sibling_bucket(self.workspace_id, self.parent_page_id),
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    View,
    Comment,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageShare {
    pub page_id: Uuid,
    pub user_id: String,
    pub permission: SharePermission,
    pub shared_at: DateTime<Utc>,
    pub shared_by: String,
}

impl PageShare {
    pub fn storage_key(page_id: Uuid, user_id: &str) -> String {
        format!("{page_id}/{user_id}")
    }
}

impl Record for PageShare {
    const COLLECTION: &'static str = "page-shares";

    fn key(&self) -> String {
        Self::storage_key(self.page_id, &self.user_id)
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page_id.to_string()),
            ("user", self.user_id.clone()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: Uuid,
    pub page_id: Uuid,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(flatten)]
    pub payload: BlockPayload,
}

impl Record for Block {
    const COLLECTION: &'static str = "blocks";

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("page", self.page_id.to_string())]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePage {
    pub workspace_id: Uuid,
    pub title: String,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub parent_page_id: Option<Uuid>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePatch {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub cover_image: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub icon: Option<String>,
}

/// One level of the page tree; callers descend per level instead of
/// fetching an unbounded subtree in one call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTree {
    pub page: Page,
    pub children: Vec<Page>,
}

#[derive(Clone)]
pub struct DocumentStore {
    workspaces: Arc<dyn Collection<Workspace>>,
    members: Arc<dyn Collection<WorkspaceMember>>,
    pages: Arc<dyn Collection<Page>>,
    blocks: Arc<dyn Collection<Block>>,
    shares: Arc<dyn Collection<PageShare>>,
    comments: Arc<dyn Collection<Comment>>,
    favorites: Arc<dyn Collection<Favorite>>,
}

impl DocumentStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspaces: Arc<dyn Collection<Workspace>>,
        members: Arc<dyn Collection<WorkspaceMember>>,
        pages: Arc<dyn Collection<Page>>,
        blocks: Arc<dyn Collection<Block>>,
        shares: Arc<dyn Collection<PageShare>>,
        comments: Arc<dyn Collection<Comment>>,
        favorites: Arc<dyn Collection<Favorite>>,
    ) -> Self {
        Self {
            workspaces,
            members,
            pages,
            blocks,
            shares,
            comments,
            favorites,
        }
    }

    // ===== Workspaces =====

    pub async fn create_workspace(
        &self,
        name: &str,
        owner_id: &str,
        icon: Option<String>,
    ) -> CoreResult<Workspace> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("workspace name is required".into()));
        }
        let now = Utc::now();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: owner_id.to_string(),
            icon,
            created_at: now,
            updated_at: now,
        };
        self.workspaces.put(workspace.clone()).await?;

        // The creator's membership row is the sole source of visibility.
        self.members
            .put(WorkspaceMember {
                workspace_id: workspace.id,
                user_id: owner_id.to_string(),
                role: MemberRole::Owner,
                joined_at: now,
            })
            .await?;

        Ok(workspace)
    }

    pub async fn get_workspace(&self, workspace_id: Uuid) -> CoreResult<Option<Workspace>> {
        Ok(self.workspaces.get(&workspace_id.to_string()).await?)
    }

    pub async fn update_workspace(
        &self,
        workspace_id: Uuid,
        patch: WorkspacePatch,
    ) -> CoreResult<Workspace> {
        let mut workspace = self
            .get_workspace(workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("workspace", workspace_id))?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(CoreError::Validation("workspace name is required".into()));
            }
            workspace.name = name;
        }
        if patch.icon.is_some() {
            workspace.icon = patch.icon;
        }
        workspace.updated_at = Utc::now();

        self.workspaces.put(workspace.clone()).await?;
        Ok(workspace)
    }

    pub async fn list_members(&self, workspace_id: Uuid) -> CoreResult<Vec<WorkspaceMember>> {
        self.get_workspace(workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("workspace", workspace_id))?;
        let mut members = self
            .members
            .find_by("workspace", &workspace_id.to_string())
            .await?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(members)
    }

    pub async fn add_member(
        &self,
        workspace_id: Uuid,
        user_id: &str,
        role: MemberRole,
    ) -> CoreResult<WorkspaceMember> {
        self.get_workspace(workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("workspace", workspace_id))?;

        let user_id = user_id.to_string();
        commit_with_retry(&self.members, move |records| {
            if records
                .iter()
                .any(|m| m.workspace_id == workspace_id && m.user_id == user_id)
            {
                return Err(CoreError::Validation(format!(
                    "user {user_id} is already a member of this workspace"
                )));
            }
            let member = WorkspaceMember {
                workspace_id,
                user_id: user_id.clone(),
                role,
                joined_at: Utc::now(),
            };
            records.push(member.clone());
            Ok(member)
        })
        .await
    }

    pub async fn remove_member(&self, workspace_id: Uuid, user_id: &str) -> CoreResult<()> {
        let user_id = user_id.to_string();
        commit_with_retry(&self.members, move |records| {
            let position = records
                .iter()
                .position(|m| m.workspace_id == workspace_id && m.user_id == user_id)
                .ok_or_else(|| CoreError::not_found("workspace member", &user_id))?;
            if records[position].role == MemberRole::Owner {
                let owners = records
                    .iter()
                    .filter(|m| m.workspace_id == workspace_id && m.role == MemberRole::Owner)
                    .count();
                if owners <= 1 {
                    return Err(CoreError::Validation(
                        "cannot remove the last owner of a workspace".into(),
                    ));
                }
            }
            records.remove(position);
            Ok(())
        })
        .await
    }

    pub async fn list_user_workspaces(&self, user_id: &str) -> CoreResult<Vec<Workspace>> {
        let memberships = self.members.find_by("user", user_id).await?;
        let mut workspaces = Vec::new();
        for membership in memberships {
            if let Some(workspace) = self.get_workspace(membership.workspace_id).await? {
                workspaces.push(workspace);
            }
        }
        workspaces.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(workspaces)
    }

    // ===== Pages =====

    pub async fn create_page(&self, req: CreatePage, actor: &str) -> CoreResult<Page> {
        if req.title.trim().is_empty() {
            return Err(CoreError::Validation("page title is required".into()));
        }
        self.get_workspace(req.workspace_id)
            .await?
            .ok_or_else(|| CoreError::not_found("workspace", req.workspace_id))?;

        let actor = actor.to_string();
        commit_with_retry(&self.pages, move |records| {
            if let Some(parent_id) = req.parent_page_id {
                let parent = records
                    .iter()
                    .find(|p| p.id == parent_id)
                    .ok_or_else(|| CoreError::not_found("page", parent_id))?;
                if parent.workspace_id != req.workspace_id {
                    return Err(CoreError::Validation(
                        "parent page belongs to a different workspace".into(),
                    ));
                }
            }
            let order = tree::next_sibling_order(records, req.workspace_id, req.parent_page_id);
            let now = Utc::now();
            let page = Page {
                id: Uuid::new_v4(),
                workspace_id: req.workspace_id,
                title: req.title.clone(),
                icon: req.icon.clone(),
                cover_image: req.cover_image.clone(),
                parent_page_id: req.parent_page_id,
                order,
                is_private: req.is_private,
                created_at: now,
                updated_at: now,
                created_by: actor.clone(),
                last_edited_by: actor.clone(),
            };
            records.push(page.clone());
            Ok(page)
        })
        .await
    }

    pub async fn get_page(&self, page_id: Uuid) -> CoreResult<Option<Page>> {
        Ok(self.pages.get(&page_id.to_string()).await?)
    }

    pub async fn update_page(
        &self,
        page_id: Uuid,
        patch: PagePatch,
        actor: &str,
    ) -> CoreResult<Page> {
        let mut page = self
            .get_page(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(CoreError::Validation("page title is required".into()));
            }
            page.title = title;
        }
        if patch.icon.is_some() {
            page.icon = patch.icon;
        }
        if patch.cover_image.is_some() {
            page.cover_image = patch.cover_image;
        }
        if let Some(is_private) = patch.is_private {
            page.is_private = is_private;
        }
        page.updated_at = Utc::now();
        page.last_edited_by = actor.to_string();

        self.pages.put(page.clone()).await?;
        Ok(page)
    }

    /// Re-parents a page with insertion semantics: siblings of the new
    /// parent at or after `new_order` shift by one. Fails when the move
    /// would make the page an ancestor of itself.
    pub async fn move_page(
        &self,
        page_id: Uuid,
        new_parent_page_id: Option<Uuid>,
        new_order: i64,
        actor: &str,
    ) -> CoreResult<Page> {
        let actor = actor.to_string();
        commit_with_retry(&self.pages, move |records| {
            let index = records
                .iter()
                .position(|p| p.id == page_id)
                .ok_or_else(|| CoreError::not_found("page", page_id))?;
            let workspace_id = records[index].workspace_id;

            if let Some(parent_id) = new_parent_page_id {
                let parent = records
                    .iter()
                    .find(|p| p.id == parent_id)
                    .ok_or_else(|| CoreError::not_found("page", parent_id))?;
                if parent.workspace_id != workspace_id {
                    return Err(CoreError::Validation(
                        "parent page belongs to a different workspace".into(),
                    ));
                }
                if tree::would_create_cycle(records, page_id, parent_id) {
                    return Err(CoreError::Validation(
                        "cannot move a page underneath itself or one of its descendants".into(),
                    ));
                }
            }

            let slot = new_order.max(0);
            for sibling in records.iter_mut() {
                if sibling.id != page_id
                    && sibling.workspace_id == workspace_id
                    && sibling.parent_page_id == new_parent_page_id
                    && sibling.order >= slot
                {
                    sibling.order += 1;
                }
            }

            let page = &mut records[index];
            page.parent_page_id = new_parent_page_id;
            page.order = slot;
            page.updated_at = Utc::now();
            page.last_edited_by = actor.clone();
            Ok(page.clone())
        })
        .await
    }

    /// Recursive cascade delete: blocks, shares, comments, and favorites
    /// of the page and all descendants go first, pages last, so a
    /// re-entered cascade always finds a consistent remainder. Deleting a
    /// page that is already gone is a no-op.
    pub async fn delete_page(&self, page_id: Uuid) -> CoreResult<()> {
        let snapshot = self.pages.snapshot().await?;
        if !snapshot.records.iter().any(|p| p.id == page_id) {
            return Ok(());
        }

        let mut doomed: HashSet<Uuid> =
            tree::descendants_post_order(&snapshot.records, page_id)
                .into_iter()
                .collect();
        doomed.insert(page_id);

        let targets = doomed.clone();
        commit_with_retry(&self.blocks, move |records| {
            records.retain(|b| !targets.contains(&b.page_id));
            Ok(())
        })
        .await?;

        let targets = doomed.clone();
        commit_with_retry(&self.shares, move |records| {
            records.retain(|s| !targets.contains(&s.page_id));
            Ok(())
        })
        .await?;

        let targets = doomed.clone();
        commit_with_retry(&self.comments, move |records| {
            records.retain(|c| !targets.contains(&c.page_id));
            Ok(())
        })
        .await?;

        let targets = doomed.clone();
        commit_with_retry(&self.favorites, move |records| {
            records.retain(|f| !targets.contains(&f.page_id));
            Ok(())
        })
        .await?;

        commit_with_retry(&self.pages, move |records| {
            records.retain(|p| !doomed.contains(&p.id));
            Ok(())
        })
        .await
    }

    pub async fn list_children(
        &self,
        workspace_id: Uuid,
        parent_page_id: Option<Uuid>,
    ) -> CoreResult<Vec<Page>> {
        let bucket = Page::sibling_bucket(workspace_id, parent_page_id);
        let mut children = self.pages.find_by("parent", &bucket).await?;
        children.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(children)
    }

    pub async fn list_by_workspace(&self, workspace_id: Uuid) -> CoreResult<Vec<Page>> {
        let mut pages = self
            .pages
            .find_by("workspace", &workspace_id.to_string())
            .await?;
        pages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pages)
    }

    pub async fn get_page_tree(&self, page_id: Uuid) -> CoreResult<PageTree> {
        let page = self
            .get_page(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;
        let children = self.list_children(page.workspace_id, Some(page_id)).await?;
        Ok(PageTree { page, children })
    }

    // ===== Page shares =====

    pub async fn share_page(
        &self,
        page_id: Uuid,
        user_id: &str,
        permission: SharePermission,
        shared_by: &str,
    ) -> CoreResult<PageShare> {
        self.get_page(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;
        let share = PageShare {
            page_id,
            user_id: user_id.to_string(),
            permission,
            shared_at: Utc::now(),
            shared_by: shared_by.to_string(),
        };
        self.shares.put(share.clone()).await?;
        Ok(share)
    }

    pub async fn list_shares(&self, page_id: Uuid) -> CoreResult<Vec<PageShare>> {
        let mut shares = self.shares.find_by("page", &page_id.to_string()).await?;
        shares.sort_by(|a, b| a.shared_at.cmp(&b.shared_at));
        Ok(shares)
    }

    pub async fn revoke_share(&self, page_id: Uuid, user_id: &str) -> CoreResult<()> {
        let removed = self
            .shares
            .remove(&PageShare::storage_key(page_id, user_id))
            .await?;
        if !removed {
            return Err(CoreError::not_found("page share", user_id));
        }
        Ok(())
    }

    // ===== Blocks =====

    pub async fn create_block(
        &self,
        page_id: Uuid,
        payload: BlockPayload,
        after_block_id: Option<Uuid>,
        actor: &str,
    ) -> CoreResult<Block> {
        payload.validate()?;
        self.get_page(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        let actor = actor.to_string();
        commit_with_retry(&self.blocks, move |records| {
            let order = match after_block_id {
                Some(after) => {
                    let anchor = records
                        .iter()
                        .find(|b| b.id == after && b.page_id == page_id)
                        .ok_or_else(|| CoreError::not_found("block", after))?;
                    let at = anchor.order;
                    for block in records.iter_mut() {
                        if block.page_id == page_id && block.order > at {
                            block.order += 1;
                        }
                    }
                    at + 1
                }
                None => records
                    .iter()
                    .filter(|b| b.page_id == page_id)
                    .map(|b| b.order)
                    .max()
                    .map(|max| max + 1)
                    .unwrap_or(0),
            };
            let now = Utc::now();
            let block = Block {
                id: Uuid::new_v4(),
                page_id,
                order,
                created_at: now,
                updated_at: now,
                created_by: actor.clone(),
                payload: payload.clone(),
            };
            records.push(block.clone());
            Ok(block)
        })
        .await
    }

    pub async fn get_block(&self, block_id: Uuid) -> CoreResult<Option<Block>> {
        Ok(self.blocks.get(&block_id.to_string()).await?)
    }

    pub async fn update_block(&self, block_id: Uuid, patch: BlockPatch) -> CoreResult<Block> {
        commit_with_retry(&self.blocks, move |records| {
            let block = records
                .iter_mut()
                .find(|b| b.id == block_id)
                .ok_or_else(|| CoreError::not_found("block", block_id))?;
            let mut payload = block.payload.clone();
            payload.apply(&patch)?;
            block.payload = payload;
            block.updated_at = Utc::now();
            Ok(block.clone())
        })
        .await
    }

    /// Replaces the payload wholesale, keeping id, page, and position.
    pub async fn convert_block(
        &self,
        block_id: Uuid,
        new_payload: BlockPayload,
    ) -> CoreResult<Block> {
        new_payload.validate()?;
        commit_with_retry(&self.blocks, move |records| {
            let block = records
                .iter_mut()
                .find(|b| b.id == block_id)
                .ok_or_else(|| CoreError::not_found("block", block_id))?;
            block.payload = new_payload.clone();
            block.updated_at = Utc::now();
            Ok(block.clone())
        })
        .await
    }

    pub async fn delete_block(&self, block_id: Uuid) -> CoreResult<()> {
        let removed = self.blocks.remove(&block_id.to_string()).await?;
        if !removed {
            return Err(CoreError::not_found("block", block_id));
        }
        Ok(())
    }

    pub async fn list_blocks(&self, page_id: Uuid) -> CoreResult<Vec<Block>> {
        let mut blocks = self.blocks.find_by("page", &page_id.to_string()).await?;
        blocks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(blocks)
    }

    /// Atomically renumbers a page's blocks to 0..n-1 following the given
    /// sequence. The id set must match the page's blocks exactly.
    pub async fn reorder_blocks(
        &self,
        page_id: Uuid,
        ordered_block_ids: Vec<Uuid>,
    ) -> CoreResult<Vec<Block>> {
        self.get_page(page_id)
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        commit_with_retry(&self.blocks, move |records| {
            let current: HashSet<Uuid> = records
                .iter()
                .filter(|b| b.page_id == page_id)
                .map(|b| b.id)
                .collect();
            let given: HashSet<Uuid> = ordered_block_ids.iter().copied().collect();
            if given.len() != ordered_block_ids.len() || given != current {
                return Err(CoreError::Validation(
                    "reorder must list every block of the page exactly once".into(),
                ));
            }

            let now = Utc::now();
            for (position, block_id) in ordered_block_ids.iter().enumerate() {
                if let Some(block) = records.iter_mut().find(|b| b.id == *block_id) {
                    block.order = position as i64;
                    block.updated_at = now;
                }
            }

            let mut reordered: Vec<Block> = records
                .iter()
                .filter(|b| b.page_id == page_id)
                .cloned()
                .collect();
            reordered.sort_by_key(|b| b.order);
            Ok(reordered)
        })
        .await
    }
}

// ===== Routes =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkspaceRequest {
    name: String,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    user_id: String,
    role: MemberRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovePageRequest {
    new_parent_page_id: Option<Uuid>,
    #[serde(default)]
    new_order: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharePageRequest {
    user_id: String,
    permission: SharePermission,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBlockRequest {
    after_block_id: Option<Uuid>,
    #[serde(flatten)]
    payload: BlockPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBlocksRequest {
    block_ids: Vec<Uuid>,
}

async fn create_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), CoreError> {
    let actor = actor_id(&headers);
    let workspace = state
        .store
        .create_workspace(&req.name, &actor, req.icon)
        .await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workspace>>, CoreError> {
    let actor = actor_id(&headers);
    Ok(Json(state.store.list_user_workspaces(&actor).await?))
}

async fn get_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Workspace>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, false).await?;
    let workspace = state
        .store
        .get_workspace(workspace_id)
        .await?
        .ok_or_else(|| CoreError::not_found("workspace", workspace_id))?;
    Ok(Json(workspace))
}

async fn update_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(patch): Json<WorkspacePatch>,
) -> Result<Json<Workspace>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, true).await?;
    Ok(Json(state.store.update_workspace(workspace_id, patch).await?))
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Vec<WorkspaceMember>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, false).await?;
    Ok(Json(state.store.list_members(workspace_id).await?))
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<WorkspaceMember>), CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, true).await?;
    let member = state
        .store
        .add_member(workspace_id, &req.user_id, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((workspace_id, user_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, true).await?;
    state.store.remove_member(workspace_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_workspace_pages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Vec<Page>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, false).await?;
    Ok(Json(state.store.list_by_workspace(workspace_id).await?))
}

async fn search_workspace(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(workspace_id): Path<Uuid>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Result<Json<Vec<SearchHit>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_workspace(&actor, workspace_id, false).await?;
    let query = params.get("q").map(String::as_str).unwrap_or_default();
    let hits = state.store.search(workspace_id, query).await?;

    // Results are clipped to pages the caller may read.
    let mut visible = Vec::with_capacity(hits.len());
    for hit in hits {
        if state.gate.can_read_page(&actor, hit.page_id).await? {
            visible.push(hit);
        }
    }
    Ok(Json(visible))
}

async fn create_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreatePage>,
) -> Result<(StatusCode, Json<Page>), CoreError> {
    let actor = actor_id(&headers);
    match req.parent_page_id {
        Some(parent_id) => {
            state.gate.require_page(&actor, parent_id, Action::Edit).await?;
        }
        None => {
            state
                .gate
                .require_workspace(&actor, req.workspace_id, false)
                .await?;
        }
    }
    let page = state.store.create_page(req, &actor).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn get_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Page>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    let page = state
        .store
        .get_page(page_id)
        .await?
        .ok_or_else(|| CoreError::not_found("page", page_id))?;
    Ok(Json(page))
}

async fn update_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
    Json(patch): Json<PagePatch>,
) -> Result<Json<Page>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    Ok(Json(state.store.update_page(page_id, patch, &actor).await?))
}

async fn delete_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<StatusCode, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    state.store.delete_page(page_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
    Json(req): Json<MovePageRequest>,
) -> Result<Json<Page>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    let page = state
        .store
        .move_page(page_id, req.new_parent_page_id, req.new_order, &actor)
        .await?;
    Ok(Json(page))
}

async fn list_children(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Vec<Page>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    let page = state
        .store
        .get_page(page_id)
        .await?
        .ok_or_else(|| CoreError::not_found("page", page_id))?;
    let children = state
        .store
        .list_children(page.workspace_id, Some(page_id))
        .await?;
    Ok(Json(children))
}

async fn get_page_tree(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<PageTree>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    Ok(Json(state.store.get_page_tree(page_id).await?))
}

async fn share_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
    Json(req): Json<SharePageRequest>,
) -> Result<(StatusCode, Json<PageShare>), CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    let share = state
        .store
        .share_page(page_id, &req.user_id, req.permission, &actor)
        .await?;

    // Post-commit hook: a failed notification never unwinds the share.
    if let Some(page) = state.store.get_page(page_id).await? {
        state.collab.dispatcher().page_shared(&share, &page.title).await;
    }
    Ok((StatusCode::CREATED, Json(share)))
}

async fn list_shares(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Vec<PageShare>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    Ok(Json(state.store.list_shares(page_id).await?))
}

async fn revoke_share(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((page_id, user_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    state.store.revoke_share(page_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_page_blocks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
) -> Result<Json<Vec<Block>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Read).await?;
    Ok(Json(state.store.list_blocks(page_id).await?))
}

async fn create_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
    Json(req): Json<CreateBlockRequest>,
) -> Result<(StatusCode, Json<Block>), CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    let block = state
        .store
        .create_block(page_id, req.payload, req.after_block_id, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(block)))
}

async fn reorder_blocks(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(page_id): Path<Uuid>,
    Json(req): Json<ReorderBlocksRequest>,
) -> Result<Json<Vec<Block>>, CoreError> {
    let actor = actor_id(&headers);
    state.gate.require_page(&actor, page_id, Action::Edit).await?;
    Ok(Json(state.store.reorder_blocks(page_id, req.block_ids).await?))
}

async fn get_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(block_id): Path<Uuid>,
) -> Result<Json<Block>, CoreError> {
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
    Ok(Json(block))
}

async fn update_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(block_id): Path<Uuid>,
    Json(patch): Json<BlockPatch>,
) -> Result<Json<Block>, CoreError> {
    let actor = actor_id(&headers);
    let block = state
        .store
        .get_block(block_id)
        .await?
        .ok_or_else(|| CoreError::not_found("block", block_id))?;
    state
        .gate
        .require_page(&actor, block.page_id, Action::Edit)
        .await?;
    Ok(Json(state.store.update_block(block_id, patch).await?))
}

async fn convert_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(block_id): Path<Uuid>,
    Json(payload): Json<BlockPayload>,
) -> Result<Json<Block>, CoreError> {
    let actor = actor_id(&headers);
    let block = state
        .store
        .get_block(block_id)
        .await?
        .ok_or_else(|| CoreError::not_found("block", block_id))?;
    state
        .gate
        .require_page(&actor, block.page_id, Action::Edit)
        .await?;
    Ok(Json(state.store.convert_block(block_id, payload).await?))
}

async fn delete_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(block_id): Path<Uuid>,
) -> Result<StatusCode, CoreError> {
    let actor = actor_id(&headers);
    let block = state
        .store
        .get_block(block_id)
        .await?
        .ok_or_else(|| CoreError::not_found("block", block_id))?;
    state
        .gate
        .require_page(&actor, block.page_id, Action::Edit)
        .await?;
    state.store.delete_block(block_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_documents_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workspaces", get(list_workspaces).post(create_workspace))
        .route(
            "/api/workspaces/:workspace_id",
            get(get_workspace).put(update_workspace),
        )
        .route(
            "/api/workspaces/:workspace_id/members",
            get(list_members).post(add_member),
        )
        .route(
            "/api/workspaces/:workspace_id/members/:user_id",
            axum::routing::delete(remove_member),
        )
        .route(
            "/api/workspaces/:workspace_id/pages",
            get(list_workspace_pages),
        )
        .route("/api/workspaces/:workspace_id/search", get(search_workspace))
        .route("/api/pages", post(create_page))
        .route(
            "/api/pages/:page_id",
            get(get_page).put(update_page).delete(delete_page),
        )
        .route("/api/pages/:page_id/move", post(move_page))
        .route("/api/pages/:page_id/children", get(list_children))
        .route("/api/pages/:page_id/tree", get(get_page_tree))
        .route(
            "/api/pages/:page_id/share",
            post(share_page).get(list_shares),
        )
        .route(
            "/api/pages/:page_id/share/:user_id",
            axum::routing::delete(revoke_share),
        )
        .route(
            "/api/pages/:page_id/blocks",
            get(list_page_blocks).post(create_block),
        )
        .route("/api/pages/:page_id/blocks/reorder", put(reorder_blocks))
        .route(
            "/api/blocks/:block_id",
            get(get_block).put(update_block).delete(delete_block),
        )
        .route("/api/blocks/:block_id/convert", post(convert_block))
}
