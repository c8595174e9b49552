use serde::{Deserialize, Serialize};

// Opaque handle the target catalog hands out for a library item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetItemId(pub String);

impl std::fmt::Display for TargetItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

/// One playlist entry as the source catalog reported it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceItem {
    pub sequence_index: usize,
    pub title: String,
    pub absolute_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetItem {
    pub id: TargetItemId,
    pub absolute_path: String,
    pub title: String,
    pub kind: MediaKind,
}

/// The source playlist together with the name it carries in the source catalog
#[derive(Debug, Clone)]
pub struct SourcePlaylist {
    pub id: String,
    pub name: String,
    pub items: Vec<SourceItem>,
}
