use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Wire tag of the only real-time message type.
pub const CONTENT_UPDATE: &str = "CONTENT_UPDATE";

/// Message pushed to real-time subscribers after a content mutation.
///
/// Serializes as `{"type": "CONTENT_UPDATE", "content": ...}` where
/// `content` is either the whole document or a single-section subtree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentEvent {
    #[serde(rename = "CONTENT_UPDATE")]
    ContentUpdate { content: Value },
}

impl ContentEvent {
    pub fn content_update(content: Value) -> Self {
        Self::ContentUpdate { content }
    }

    /// Event carrying only `{section: subtree}`.
    pub fn section_update(section: &str, subtree: Value) -> Self {
        let mut map = serde_json::Map::new();
        map.insert(section.to_string(), subtree);
        Self::ContentUpdate {
            content: Value::Object(map),
        }
    }

    pub fn content(&self) -> &Value {
        match self {
            Self::ContentUpdate { content } => content,
        }
    }

    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
