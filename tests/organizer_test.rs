//! Favorites and templates, the thin managers on top of the store.

use uuid::Uuid;

use noteserver::documents::{BlockPayload, CreatePage, TextKind};
use noteserver::shared::error::CoreError;
use noteserver::shared::state::AppState;
use noteserver::templates::CreateTemplate;

fn paragraph(value: &str) -> BlockPayload {
    BlockPayload::Text {
        text_type: TextKind::Paragraph,
        value: value.to_string(),
    }
}

async fn workspace_pages(state: &AppState, count: usize) -> (Uuid, Vec<Uuid>) {
    let workspace = state
        .store
        .create_workspace("Team", "alice", None)
        .await
        .unwrap();
    let mut pages = Vec::new();
    for i in 0..count {
        let page = state
            .store
            .create_page(
                CreatePage {
                    workspace_id: workspace.id,
                    title: format!("Page {i}"),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        pages.push(page.id);
    }
    (workspace.id, pages)
}

#[tokio::test]
async fn test_favorites_keep_insertion_order() {
    let state = AppState::in_memory();
    let (_, pages) = workspace_pages(&state, 3).await;

    for page_id in &pages {
        state.favorites.add("alice", *page_id).await.unwrap();
    }

    let listed = state.favorites.list("alice").await.unwrap();
    let listed_pages: Vec<Uuid> = listed.iter().map(|f| f.page_id).collect();
    assert_eq!(listed_pages, pages);
    let orders: Vec<i64> = listed.iter().map(|f| f.order).collect();
    assert_eq!(orders, [0, 1, 2]);
}

#[tokio::test]
async fn test_favorite_add_is_idempotent_and_remove_strict() {
    let state = AppState::in_memory();
    let (_, pages) = workspace_pages(&state, 2).await;

    let first = state.favorites.add("alice", pages[0]).await.unwrap();
    let again = state.favorites.add("alice", pages[0]).await.unwrap();
    assert_eq!(first.order, again.order);
    assert_eq!(state.favorites.list("alice").await.unwrap().len(), 1);

    state.favorites.remove("alice", pages[0]).await.unwrap();
    let twice = state.favorites.remove("alice", pages[0]).await;
    assert!(matches!(twice, Err(CoreError::NotFound(_))));

    let missing_page = state.favorites.add("alice", Uuid::new_v4()).await;
    assert!(matches!(missing_page, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_favorites_are_per_user() {
    let state = AppState::in_memory();
    let (_, pages) = workspace_pages(&state, 2).await;

    state.favorites.add("alice", pages[0]).await.unwrap();
    state.favorites.add("bob", pages[1]).await.unwrap();

    assert_eq!(state.favorites.list("alice").await.unwrap().len(), 1);
    assert_eq!(state.favorites.list("bob").await.unwrap().len(), 1);
    assert_eq!(
        state.favorites.list("bob").await.unwrap()[0].page_id,
        pages[1]
    );
}

#[tokio::test]
async fn test_template_category_listing() {
    let state = AppState::in_memory();

    for (name, category) in [
        ("Meeting notes", "meetings"),
        ("Retro board", "meetings"),
        ("Roadmap", "planning"),
    ] {
        state
            .templates
            .create(
                CreateTemplate {
                    name: name.into(),
                    description: String::new(),
                    category: category.into(),
                    icon: None,
                    content: Vec::new(),
                    is_public: true,
                },
                "alice",
            )
            .await
            .unwrap();
    }

    assert_eq!(state.templates.list().await.unwrap().len(), 3);
    let meetings = state.templates.list_by_category("meetings").await.unwrap();
    assert_eq!(meetings.len(), 2);
    assert!(meetings.iter().all(|t| t.category == "meetings"));

    let nameless = state
        .templates
        .create(
            CreateTemplate {
                name: "  ".into(),
                description: String::new(),
                category: "misc".into(),
                icon: None,
                content: Vec::new(),
                is_public: false,
            },
            "alice",
        )
        .await;
    assert!(matches!(nameless, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn test_template_instantiation_materializes_blocks() {
    let state = AppState::in_memory();
    let (workspace_id, _) = workspace_pages(&state, 1).await;

    let template = state
        .templates
        .create(
            CreateTemplate {
                name: "Standup".into(),
                description: "Daily standup notes".into(),
                category: "meetings".into(),
                icon: None,
                content: vec![
                    paragraph("Yesterday"),
                    paragraph("Today"),
                    BlockPayload::Divider,
                    BlockPayload::Checkbox {
                        checked: false,
                        label: "blockers cleared".into(),
                    },
                ],
                is_public: true,
            },
            "alice",
        )
        .await
        .unwrap();

    let (page, blocks) = state
        .templates
        .instantiate(template.id, workspace_id, None, Some("Monday standup".into()), "bob")
        .await
        .unwrap();

    assert_eq!(page.title, "Monday standup");
    assert_eq!(page.created_by, "bob");
    assert_eq!(blocks.len(), 4);
    let orders: Vec<i64> = blocks.iter().map(|b| b.order).collect();
    assert_eq!(orders, [0, 1, 2, 3]);
    assert!(blocks.iter().all(|b| b.page_id == page.id));

    // The template snapshot stays detached from the live blocks.
    let template_after = state.templates.get(template.id).await.unwrap().unwrap();
    assert_eq!(template_after.content.len(), 4);

    let missing = state
        .templates
        .instantiate(Uuid::new_v4(), workspace_id, None, None, "bob")
        .await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}
