//! Block payload variants and the typed patch/convert machinery.
//!
//! A block's discriminant is immutable through plain updates; only
//! `convert` may change it, and conversion re-validates the new payload
//! shape instead of merging properties blindly.

use serde::{Deserialize, Serialize};

use crate::shared::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    H1,
    H2,
    H3,
    Paragraph,
    Bullet,
    Numbered,
    Todo,
    Toggle,
    Quote,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedKind {
    Pdf,
    GoogleMaps,
    Figma,
    Youtube,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockPayload {
    #[serde(rename_all = "camelCase")]
    Text { text_type: TextKind, value: String },
    Image {
        src: String,
        width: Option<u32>,
        height: Option<u32>,
        caption: Option<String>,
    },
    Video {
        src: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    Embed { url: String, embed_type: EmbedKind },
    Divider,
    Checkbox { checked: bool, label: String },
}

/// Partial update for a block. Fields that do not belong to the block's
/// current variant are rejected rather than silently dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatch {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub text_type: Option<TextKind>,
    pub value: Option<String>,
    pub src: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub caption: Option<String>,
    pub url: Option<String>,
    pub embed_type: Option<EmbedKind>,
    pub checked: Option<bool>,
    pub label: Option<String>,
}

impl BlockPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
            Self::Embed { .. } => "embed",
            Self::Divider => "divider",
            Self::Checkbox { .. } => "checkbox",
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Self::Text { .. } | Self::Divider | Self::Checkbox { .. } => Ok(()),
            Self::Image { src, .. } | Self::Video { src, .. } => validate_media_source(src),
            Self::Embed { url, .. } => validate_media_source(url),
        }
    }

    /// Applies a partial update in place. Attempting to change the
    /// discriminant or set a field of another variant fails with a
    /// validation error and leaves the payload untouched.
    pub fn apply(&mut self, patch: &BlockPatch) -> CoreResult<()> {
        if patch.block_type.is_some() {
            return Err(CoreError::Validation(
                "block type cannot change through an update; use convert".into(),
            ));
        }

        let mut next = self.clone();
        match &mut next {
            Self::Text { text_type, value } => {
                reject_foreign_fields(
                    "text",
                    &[
                        ("src", patch.src.is_some()),
                        ("width", patch.width.is_some()),
                        ("height", patch.height.is_some()),
                        ("caption", patch.caption.is_some()),
                        ("url", patch.url.is_some()),
                        ("embedType", patch.embed_type.is_some()),
                        ("checked", patch.checked.is_some()),
                        ("label", patch.label.is_some()),
                    ],
                )?;
                if let Some(kind) = patch.text_type {
                    *text_type = kind;
                }
                if let Some(v) = &patch.value {
                    *value = v.clone();
                }
            }
            Self::Image {
                src,
                width,
                height,
                caption,
            } => {
                reject_foreign_fields(
                    "image",
                    &[
                        ("textType", patch.text_type.is_some()),
                        ("value", patch.value.is_some()),
                        ("url", patch.url.is_some()),
                        ("embedType", patch.embed_type.is_some()),
                        ("checked", patch.checked.is_some()),
                        ("label", patch.label.is_some()),
                    ],
                )?;
                if let Some(s) = &patch.src {
                    *src = s.clone();
                }
                if patch.width.is_some() {
                    *width = patch.width;
                }
                if patch.height.is_some() {
                    *height = patch.height;
                }
                if patch.caption.is_some() {
                    *caption = patch.caption.clone();
                }
            }
            Self::Video { src, width, height } => {
                reject_foreign_fields(
                    "video",
                    &[
                        ("textType", patch.text_type.is_some()),
                        ("value", patch.value.is_some()),
                        ("caption", patch.caption.is_some()),
                        ("url", patch.url.is_some()),
                        ("embedType", patch.embed_type.is_some()),
                        ("checked", patch.checked.is_some()),
                        ("label", patch.label.is_some()),
                    ],
                )?;
                if let Some(s) = &patch.src {
                    *src = s.clone();
                }
                if patch.width.is_some() {
                    *width = patch.width;
                }
                if patch.height.is_some() {
                    *height = patch.height;
                }
            }
            Self::Embed { url, embed_type } => {
                reject_foreign_fields(
                    "embed",
                    &[
                        ("textType", patch.text_type.is_some()),
                        ("value", patch.value.is_some()),
                        ("src", patch.src.is_some()),
                        ("width", patch.width.is_some()),
                        ("height", patch.height.is_some()),
                        ("caption", patch.caption.is_some()),
                        ("checked", patch.checked.is_some()),
                        ("label", patch.label.is_some()),
                    ],
                )?;
                if let Some(u) = &patch.url {
                    *url = u.clone();
                }
                if let Some(kind) = patch.embed_type {
                    *embed_type = kind;
                }
            }
            Self::Divider => {
                reject_foreign_fields(
                    "divider",
                    &[
                        ("textType", patch.text_type.is_some()),
                        ("value", patch.value.is_some()),
                        ("src", patch.src.is_some()),
                        ("width", patch.width.is_some()),
                        ("height", patch.height.is_some()),
                        ("caption", patch.caption.is_some()),
                        ("url", patch.url.is_some()),
                        ("embedType", patch.embed_type.is_some()),
                        ("checked", patch.checked.is_some()),
                        ("label", patch.label.is_some()),
                    ],
                )?;
            }
            Self::Checkbox { checked, label } => {
                reject_foreign_fields(
                    "checkbox",
                    &[
                        ("textType", patch.text_type.is_some()),
                        ("value", patch.value.is_some()),
                        ("src", patch.src.is_some()),
                        ("width", patch.width.is_some()),
                        ("height", patch.height.is_some()),
                        ("caption", patch.caption.is_some()),
                        ("url", patch.url.is_some()),
                        ("embedType", patch.embed_type.is_some()),
                    ],
                )?;
                if let Some(c) = patch.checked {
                    *checked = c;
                }
                if let Some(l) = &patch.label {
                    *label = l.clone();
                }
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Plain-text content of the payload, used by search.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            Self::Text { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// The core stores media locations but never uploads; URLs and data URIs
/// are accepted as-is.
fn validate_media_source(src: &str) -> CoreResult<()> {
    let src = src.trim();
    if src.is_empty() {
        return Err(CoreError::Validation("media source must not be empty".into()));
    }
    if src.starts_with("http://") || src.starts_with("https://") || src.starts_with("data:") {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "media source must be an http(s) URL or data URI, got `{src}`"
        )))
    }
}

fn reject_foreign_fields(kind: &str, fields: &[(&str, bool)]) -> CoreResult<()> {
    for (name, present) in fields {
        if *present {
            return Err(CoreError::Validation(format!(
                "field `{name}` does not apply to {kind} blocks"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(value: &str) -> BlockPayload {
        BlockPayload::Text {
            text_type: TextKind::Paragraph,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_payload_serde_shape() {
        let json = serde_json::to_value(paragraph("hello")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["textType"], "paragraph");
        assert_eq!(json["value"], "hello");

        let embed = BlockPayload::Embed {
            url: "https://maps.example.com".into(),
            embed_type: EmbedKind::GoogleMaps,
        };
        let json = serde_json::to_value(embed).unwrap();
        assert_eq!(json["embedType"], "google-maps");
    }

    #[test]
    fn test_divider_roundtrip() {
        let parsed: BlockPayload = serde_json::from_str(r#"{"type":"divider"}"#).unwrap();
        assert_eq!(parsed, BlockPayload::Divider);
    }

    #[test]
    fn test_validate_rejects_bad_media_source() {
        let image = BlockPayload::Image {
            src: "ftp://example.com/pic.png".into(),
            width: None,
            height: None,
            caption: None,
        };
        assert!(image.validate().is_err());

        let image = BlockPayload::Image {
            src: "data:image/png;base64,AAAA".into(),
            width: None,
            height: None,
            caption: None,
        };
        assert!(image.validate().is_ok());
    }

    #[test]
    fn test_patch_updates_own_fields() {
        let mut payload = paragraph("before");
        let patch = BlockPatch {
            value: Some("after".into()),
            text_type: Some(TextKind::Quote),
            ..Default::default()
        };
        payload.apply(&patch).unwrap();
        assert_eq!(
            payload,
            BlockPayload::Text {
                text_type: TextKind::Quote,
                value: "after".into()
            }
        );
    }

    #[test]
    fn test_patch_rejects_type_change() {
        let mut payload = paragraph("text");
        let patch = BlockPatch {
            block_type: Some("image".into()),
            ..Default::default()
        };
        let err = payload.apply(&patch).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(payload, paragraph("text"));
    }

    #[test]
    fn test_patch_rejects_foreign_fields() {
        let mut payload = paragraph("text");
        let patch = BlockPatch {
            src: Some("https://example.com/pic.png".into()),
            ..Default::default()
        };
        assert!(payload.apply(&patch).is_err());
        assert_eq!(payload, paragraph("text"));
    }

    #[test]
    fn test_checkbox_patch() {
        let mut payload = BlockPayload::Checkbox {
            checked: false,
            label: "buy milk".into(),
        };
        let patch = BlockPatch {
            checked: Some(true),
            ..Default::default()
        };
        payload.apply(&patch).unwrap();
        assert_eq!(
            payload,
            BlockPayload::Checkbox {
                checked: true,
                label: "buy milk".into()
            }
        );
    }
}
