//! Substring search over a live read of the document store. No index is
//! maintained; correctness only needs a consistent pass over the
//! workspace's pages and their text blocks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::shared::error::CoreResult;

use super::DocumentStore;

pub const PREVIEW_LIMIT: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchHitKind {
    Page,
    Block,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: SearchHitKind,
    pub id: Uuid,
    pub page_id: Uuid,
    pub title: Option<String>,
    pub preview: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl DocumentStore {
    /// Case-insensitive substring match against page titles and text
    /// block values within one workspace. Pages are visited in
    /// (created_at, id) order and blocks in page order, so identical
    /// queries always return identical result sequences.
    pub async fn search(&self, workspace_id: Uuid, query: &str) -> CoreResult<Vec<SearchHit>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let pages = self.list_by_workspace(workspace_id).await?;
        let mut hits = Vec::new();

        for page in &pages {
            if page.title.to_lowercase().contains(&needle) {
                hits.push(SearchHit {
                    kind: SearchHitKind::Page,
                    id: page.id,
                    page_id: page.id,
                    title: Some(page.title.clone()),
                    preview: page.title.clone(),
                    created_at: page.created_at,
                    created_by: page.created_by.clone(),
                });
            }

            for block in self.list_blocks(page.id).await? {
                let Some(value) = block.payload.text_value() else {
                    continue;
                };
                if value.to_lowercase().contains(&needle) {
                    hits.push(SearchHit {
                        kind: SearchHitKind::Block,
                        id: block.id,
                        page_id: page.id,
                        title: Some(page.title.clone()),
                        preview: preview_of(value),
                        created_at: block.created_at,
                        created_by: block.created_by.clone(),
                    });
                }
            }
        }

        Ok(hits)
    }
}

fn preview_of(value: &str) -> String {
    if value.chars().count() <= PREVIEW_LIMIT {
        return value.to_string();
    }
    let clipped: String = value.chars().take(PREVIEW_LIMIT).collect();
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_value_untouched() {
        assert_eq!(preview_of("short"), "short");
    }

    #[test]
    fn test_preview_clips_on_char_boundary() {
        let long = "é".repeat(PREVIEW_LIMIT + 20);
        let preview = preview_of(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_LIMIT + 3);
    }
}
