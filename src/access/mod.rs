//! The access control gate. Every inbound operation resolves its
//! (actor, resource, action) triple here before touching the document
//! store. The gate reads membership, page, and share state fresh on each
//! call; nothing is cached across calls, so a revoked share or a flipped
//! privacy flag takes effect immediately.

use std::sync::Arc;

use uuid::Uuid;

use crate::documents::{MemberRole, Page, PageShare, SharePermission, WorkspaceMember};
use crate::shared::error::{CoreError, CoreResult};
use crate::storage::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Comment,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

fn share_covers(permission: SharePermission, action: Action) -> bool {
    match permission {
        SharePermission::View => action == Action::Read,
        SharePermission::Comment => matches!(action, Action::Read | Action::Comment),
        SharePermission::Edit => true,
    }
}

#[derive(Clone)]
pub struct AccessGate {
    members: Arc<dyn Collection<WorkspaceMember>>,
    pages: Arc<dyn Collection<Page>>,
    shares: Arc<dyn Collection<PageShare>>,
}

impl AccessGate {
    pub fn new(
        members: Arc<dyn Collection<WorkspaceMember>>,
        pages: Arc<dyn Collection<Page>>,
        shares: Arc<dyn Collection<PageShare>>,
    ) -> Self {
        Self {
            members,
            pages,
            shares,
        }
    }

    /// Page policy: owners and admins act unconditionally; an explicit
    /// share grants up to its permission level; plain members act on
    /// pages they created and on non-private pages; everyone else is
    /// denied. Private pages are invisible to plain members who neither
    /// created them nor hold a share.
    pub async fn check_page(
        &self,
        user_id: &str,
        page_id: Uuid,
        action: Action,
    ) -> CoreResult<Decision> {
        let page = self
            .pages
            .get(&page_id.to_string())
            .await?
            .ok_or_else(|| CoreError::not_found("page", page_id))?;

        let role = self
            .members
            .get(&WorkspaceMember::storage_key(page.workspace_id, user_id))
            .await?
            .map(|m| m.role);

        if matches!(role, Some(MemberRole::Owner) | Some(MemberRole::Admin)) {
            return Ok(Decision::Allowed);
        }

        if let Some(share) = self
            .shares
            .get(&PageShare::storage_key(page_id, user_id))
            .await?
        {
            if share_covers(share.permission, action) {
                return Ok(Decision::Allowed);
            }
        }

        if role.is_none() {
            return Ok(Decision::Denied);
        }
        if page.created_by == user_id {
            return Ok(Decision::Allowed);
        }
        if page.is_private {
            return Ok(Decision::Denied);
        }
        Ok(Decision::Allowed)
    }

    pub async fn require_page(
        &self,
        user_id: &str,
        page_id: Uuid,
        action: Action,
    ) -> CoreResult<()> {
        match self.check_page(user_id, page_id, action).await? {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(CoreError::PermissionDenied),
        }
    }

    pub async fn can_read_page(&self, user_id: &str, page_id: Uuid) -> CoreResult<bool> {
        Ok(self.check_page(user_id, page_id, Action::Read).await? == Decision::Allowed)
    }

    /// Workspace policy: any member may read; management (settings,
    /// membership changes) takes owner or admin.
    pub async fn check_workspace(
        &self,
        user_id: &str,
        workspace_id: Uuid,
        manage: bool,
    ) -> CoreResult<Decision> {
        let role = self
            .members
            .get(&WorkspaceMember::storage_key(workspace_id, user_id))
            .await?
            .map(|m| m.role);

        let decision = match role {
            Some(MemberRole::Owner) | Some(MemberRole::Admin) => Decision::Allowed,
            Some(MemberRole::Member) if !manage => Decision::Allowed,
            _ => Decision::Denied,
        };
        Ok(decision)
    }

    pub async fn require_workspace(
        &self,
        user_id: &str,
        workspace_id: Uuid,
        manage: bool,
    ) -> CoreResult<()> {
        match self.check_workspace(user_id, workspace_id, manage).await? {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(CoreError::PermissionDenied),
        }
    }
}
