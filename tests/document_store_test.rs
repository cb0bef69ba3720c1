//! Tree and ordering behavior of the document store.

use futures::future::join_all;
use uuid::Uuid;

use noteserver::documents::{BlockPatch, BlockPayload, CreatePage, Page, TextKind};
use noteserver::shared::error::CoreError;
use noteserver::shared::state::AppState;

fn paragraph(value: &str) -> BlockPayload {
    BlockPayload::Text {
        text_type: TextKind::Paragraph,
        value: value.to_string(),
    }
}

async fn workspace_with_page(state: &AppState) -> (Uuid, Page) {
    let workspace = state
        .store
        .create_workspace("Engineering", "alice", None)
        .await
        .unwrap();
    let page = state
        .store
        .create_page(
            CreatePage {
                workspace_id: workspace.id,
                title: "Root".into(),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
    (workspace.id, page)
}

#[tokio::test]
async fn test_sibling_orders_are_unique_and_increasing() {
    let state = AppState::in_memory();
    let (workspace_id, root) = workspace_with_page(&state).await;

    let mut last_order = root.order;
    for title in ["Second", "Third", "Fourth"] {
        let page = state
            .store
            .create_page(
                CreatePage {
                    workspace_id,
                    title: title.into(),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert!(page.order > last_order);
        last_order = page.order;
    }

    let roots = state.store.list_children(workspace_id, None).await.unwrap();
    let orders: Vec<i64> = roots.iter().map(|p| p.order).collect();
    let mut deduped = orders.clone();
    deduped.dedup();
    assert_eq!(orders.len(), 4);
    assert_eq!(orders, deduped);
}

#[tokio::test]
async fn test_create_page_requires_existing_parent_and_workspace() {
    let state = AppState::in_memory();
    let (workspace_id, _) = workspace_with_page(&state).await;

    let missing_workspace = state
        .store
        .create_page(
            CreatePage {
                workspace_id: Uuid::new_v4(),
                title: "Orphan".into(),
                ..Default::default()
            },
            "alice",
        )
        .await;
    assert!(matches!(missing_workspace, Err(CoreError::NotFound(_))));

    let missing_parent = state
        .store
        .create_page(
            CreatePage {
                workspace_id,
                title: "Orphan".into(),
                parent_page_id: Some(Uuid::new_v4()),
                ..Default::default()
            },
            "alice",
        )
        .await;
    assert!(matches!(missing_parent, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_move_page_rejects_descendant_cycles() {
    let state = AppState::in_memory();
    let (workspace_id, a) = workspace_with_page(&state).await;

    // Chain A -> B -> C -> D.
    let mut parent = a.id;
    let mut last = a.id;
    for title in ["B", "C", "D"] {
        let page = state
            .store
            .create_page(
                CreatePage {
                    workspace_id,
                    title: title.into(),
                    parent_page_id: Some(parent),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        parent = page.id;
        last = page.id;
    }

    let into_leaf = state.store.move_page(a.id, Some(last), 0, "alice").await;
    assert!(matches!(into_leaf, Err(CoreError::Validation(_))));

    let into_self = state.store.move_page(a.id, Some(a.id), 0, "alice").await;
    assert!(matches!(into_self, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_move_page_inserts_between_siblings() {
    let state = AppState::in_memory();
    let (workspace_id, _root) = workspace_with_page(&state).await;

    state
        .store
        .create_page(
            CreatePage {
                workspace_id,
                title: "Second".into(),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
    let third = state
        .store
        .create_page(
            CreatePage {
                workspace_id,
                title: "Third".into(),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();

    // Move "Third" to the front; existing siblings shift instead of
    // colliding with it.
    let moved = state.store.move_page(third.id, None, 0, "alice").await.unwrap();
    assert_eq!(moved.order, 0);

    let roots = state.store.list_children(workspace_id, None).await.unwrap();
    let titles: Vec<&str> = roots.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Third", "Root", "Second"]);

    let orders: Vec<i64> = roots.iter().map(|p| p.order).collect();
    let mut sorted = orders.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), orders.len());
}

#[tokio::test]
async fn test_delete_page_cascades_and_is_idempotent() {
    let state = AppState::in_memory();
    let (workspace_id, root) = workspace_with_page(&state).await;

    let child = state
        .store
        .create_page(
            CreatePage {
                workspace_id,
                title: "Child".into(),
                parent_page_id: Some(root.id),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();

    state
        .store
        .create_block(root.id, paragraph("on root"), None, "alice")
        .await
        .unwrap();
    state
        .store
        .create_block(child.id, paragraph("on child"), None, "alice")
        .await
        .unwrap();
    state
        .store
        .share_page(root.id, "bob", noteserver::documents::SharePermission::View, "alice")
        .await
        .unwrap();

    state.store.delete_page(root.id).await.unwrap();

    assert!(state.store.get_page(root.id).await.unwrap().is_none());
    assert!(state.store.get_page(child.id).await.unwrap().is_none());
    assert!(state.store.list_blocks(root.id).await.unwrap().is_empty());
    assert!(state.store.list_blocks(child.id).await.unwrap().is_empty());
    assert!(state.store.list_shares(root.id).await.unwrap().is_empty());

    // Re-running the cascade on an already-deleted page is a no-op.
    state.store.delete_page(root.id).await.unwrap();
}

#[tokio::test]
async fn test_block_insert_after_renumbers_following_blocks() {
    let state = AppState::in_memory();
    let (_, page) = workspace_with_page(&state).await;

    let first = state
        .store
        .create_block(page.id, paragraph("first"), None, "alice")
        .await
        .unwrap();
    let second = state
        .store
        .create_block(page.id, paragraph("second"), None, "alice")
        .await
        .unwrap();
    assert_eq!(first.order, 0);
    assert_eq!(second.order, 1);

    let inserted = state
        .store
        .create_block(page.id, paragraph("between"), Some(first.id), "alice")
        .await
        .unwrap();
    assert_eq!(inserted.order, 1);

    let blocks = state.store.list_blocks(page.id).await.unwrap();
    let values: Vec<&str> = blocks
        .iter()
        .filter_map(|b| b.payload.text_value())
        .collect();
    assert_eq!(values, ["first", "between", "second"]);

    let orders: Vec<i64> = blocks.iter().map(|b| b.order).collect();
    assert!(orders.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_reorder_blocks_renumbers_contiguously() {
    let state = AppState::in_memory();
    let (_, page) = workspace_with_page(&state).await;

    let mut ids = Vec::new();
    for value in ["a", "b", "c"] {
        let block = state
            .store
            .create_block(page.id, paragraph(value), None, "alice")
            .await
            .unwrap();
        ids.push(block.id);
    }

    ids.reverse();
    let reordered = state
        .store
        .reorder_blocks(page.id, ids.clone())
        .await
        .unwrap();
    let orders: Vec<i64> = reordered.iter().map(|b| b.order).collect();
    assert_eq!(orders, [0, 1, 2]);
    let values: Vec<&str> = reordered
        .iter()
        .filter_map(|b| b.payload.text_value())
        .collect();
    assert_eq!(values, ["c", "b", "a"]);

    // Dropping one id must fail: the set has to match exactly.
    let partial = state
        .store
        .reorder_blocks(page.id, ids[..2].to_vec())
        .await;
    assert!(matches!(partial, Err(CoreError::Validation(_))));

    let with_stranger = {
        let mut with_stranger = ids.clone();
        with_stranger[0] = Uuid::new_v4();
        state.store.reorder_blocks(page.id, with_stranger).await
    };
    assert!(matches!(with_stranger, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_block_type_is_immutable_outside_convert() {
    let state = AppState::in_memory();
    let (_, page) = workspace_with_page(&state).await;

    let block = state
        .store
        .create_block(page.id, paragraph("text"), None, "alice")
        .await
        .unwrap();

    let patch = BlockPatch {
        block_type: Some("image".into()),
        ..Default::default()
    };
    let err = state.store.update_block(block.id, patch).await;
    assert!(matches!(err, Err(CoreError::Validation(_))));

    let converted = state
        .store
        .convert_block(
            block.id,
            BlockPayload::Checkbox {
                checked: false,
                label: "now a checkbox".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(converted.id, block.id);
    assert_eq!(converted.order, block.order);
    assert_eq!(converted.payload.kind(), "checkbox");
}

#[tokio::test]
async fn test_concurrent_block_creation_yields_distinct_orders() {
    let state = AppState::in_memory();
    let (_, page) = workspace_with_page(&state).await;

    // With N writers each committing once, a loser's retry always finds
    // at most N-1 foreign commits, so N within the retry budget can
    // never surface a conflict.
    let writers = 4;
    let tasks: Vec<_> = (0..writers)
        .map(|i| {
            let store = state.store.clone();
            let page_id = page.id;
            tokio::spawn(async move {
                store
                    .create_block(page_id, paragraph(&format!("block {i}")), None, "alice")
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
        created += 1;
    }
    assert_eq!(created, writers);

    let blocks = state.store.list_blocks(page.id).await.unwrap();
    assert_eq!(blocks.len(), writers);
    let mut orders: Vec<i64> = blocks.iter().map(|b| b.order).collect();
    orders.sort_unstable();
    orders.dedup();
    assert_eq!(orders.len(), writers);
}

#[tokio::test]
async fn test_member_management_guards() {
    let state = AppState::in_memory();
    let workspace = state
        .store
        .create_workspace("Team", "alice", None)
        .await
        .unwrap();

    // Creation seeded the owner membership.
    let members = state.store.list_members(workspace.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, "alice");

    state
        .store
        .add_member(workspace.id, "bob", noteserver::documents::MemberRole::Member)
        .await
        .unwrap();
    let duplicate = state
        .store
        .add_member(workspace.id, "bob", noteserver::documents::MemberRole::Member)
        .await;
    assert!(matches!(duplicate, Err(CoreError::Validation(_))));

    let last_owner = state.store.remove_member(workspace.id, "alice").await;
    assert!(matches!(last_owner, Err(CoreError::Validation(_))));

    state.store.remove_member(workspace.id, "bob").await.unwrap();
    assert_eq!(state.store.list_members(workspace.id).await.unwrap().len(), 1);
}
