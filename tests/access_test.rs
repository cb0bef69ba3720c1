//! Access control gate policy.

use noteserver::access::{Action, Decision};
use noteserver::documents::{CreatePage, MemberRole, SharePermission};
use noteserver::shared::error::CoreError;
use noteserver::shared::state::AppState;
use uuid::Uuid;

async fn private_page_setup(state: &AppState) -> (Uuid, Uuid) {
    let workspace = state
        .store
        .create_workspace("Team", "owner", None)
        .await
        .unwrap();
    state
        .store
        .add_member(workspace.id, "author", MemberRole::Member)
        .await
        .unwrap();
    state
        .store
        .add_member(workspace.id, "member", MemberRole::Member)
        .await
        .unwrap();
    let page = state
        .store
        .create_page(
            CreatePage {
                workspace_id: workspace.id,
                title: "Secret plans".into(),
                is_private: true,
                ..Default::default()
            },
            "author",
        )
        .await
        .unwrap();
    (workspace.id, page.id)
}

#[tokio::test]
async fn test_private_page_hidden_from_plain_members() {
    let state = AppState::in_memory();
    let (_, page_id) = private_page_setup(&state).await;

    for action in [Action::Read, Action::Edit] {
        let decision = state.gate.check_page("member", page_id, action).await.unwrap();
        assert_eq!(decision, Decision::Denied);
    }

    // The owner overrides privacy unconditionally.
    for action in [Action::Read, Action::Edit] {
        let decision = state.gate.check_page("owner", page_id, action).await.unwrap();
        assert_eq!(decision, Decision::Allowed);
    }

    // So does the page's creator.
    let decision = state
        .gate
        .check_page("author", page_id, Action::Edit)
        .await
        .unwrap();
    assert_eq!(decision, Decision::Allowed);
}

#[tokio::test]
async fn test_share_grants_up_to_its_level() {
    let state = AppState::in_memory();
    let (_, page_id) = private_page_setup(&state).await;

    state
        .store
        .share_page(page_id, "member", SharePermission::Comment, "author")
        .await
        .unwrap();

    assert_eq!(
        state.gate.check_page("member", page_id, Action::Read).await.unwrap(),
        Decision::Allowed
    );
    assert_eq!(
        state
            .gate
            .check_page("member", page_id, Action::Comment)
            .await
            .unwrap(),
        Decision::Allowed
    );
    assert_eq!(
        state.gate.check_page("member", page_id, Action::Edit).await.unwrap(),
        Decision::Denied
    );
}

#[tokio::test]
async fn test_revoking_a_share_takes_effect_immediately() {
    let state = AppState::in_memory();
    let (_, page_id) = private_page_setup(&state).await;

    state
        .store
        .share_page(page_id, "member", SharePermission::View, "author")
        .await
        .unwrap();
    assert!(state.gate.can_read_page("member", page_id).await.unwrap());

    state.store.revoke_share(page_id, "member").await.unwrap();
    assert!(!state.gate.can_read_page("member", page_id).await.unwrap());
}

#[tokio::test]
async fn test_non_members_are_denied_public_pages() {
    let state = AppState::in_memory();
    let workspace = state
        .store
        .create_workspace("Team", "owner", None)
        .await
        .unwrap();
    let page = state
        .store
        .create_page(
            CreatePage {
                workspace_id: workspace.id,
                title: "Public within the workspace".into(),
                ..Default::default()
            },
            "owner",
        )
        .await
        .unwrap();

    let decision = state
        .gate
        .check_page("stranger", page.id, Action::Read)
        .await
        .unwrap();
    assert_eq!(decision, Decision::Denied);
}

#[tokio::test]
async fn test_members_act_on_non_private_pages() {
    let state = AppState::in_memory();
    let workspace = state
        .store
        .create_workspace("Team", "owner", None)
        .await
        .unwrap();
    state
        .store
        .add_member(workspace.id, "member", MemberRole::Member)
        .await
        .unwrap();
    let page = state
        .store
        .create_page(
            CreatePage {
                workspace_id: workspace.id,
                title: "Shared notes".into(),
                ..Default::default()
            },
            "owner",
        )
        .await
        .unwrap();

    for action in [Action::Read, Action::Comment, Action::Edit] {
        assert_eq!(
            state.gate.check_page("member", page.id, action).await.unwrap(),
            Decision::Allowed
        );
    }
}

#[tokio::test]
async fn test_gate_surfaces_missing_page() {
    let state = AppState::in_memory();
    let missing = state
        .gate
        .check_page("anyone", Uuid::new_v4(), Action::Read)
        .await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_workspace_management_requires_admin_role() {
    let state = AppState::in_memory();
    let workspace = state
        .store
        .create_workspace("Team", "owner", None)
        .await
        .unwrap();
    state
        .store
        .add_member(workspace.id, "member", MemberRole::Member)
        .await
        .unwrap();
    state
        .store
        .add_member(workspace.id, "admin", MemberRole::Admin)
        .await
        .unwrap();

    assert_eq!(
        state
            .gate
            .check_workspace("member", workspace.id, true)
            .await
            .unwrap(),
        Decision::Denied
    );
    assert_eq!(
        state
            .gate
            .check_workspace("member", workspace.id, false)
            .await
            .unwrap(),
        Decision::Allowed
    );
    assert_eq!(
        state
            .gate
            .check_workspace("admin", workspace.id, true)
            .await
            .unwrap(),
        Decision::Allowed
    );
}
