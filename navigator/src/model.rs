use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// External parameters that scope a hierarchy fetch, e.g. `["rooms", "europe"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HierarchyKey {
    segments: Vec<String>,
}

impl HierarchyKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Serialized form used for fetch bookkeeping and cache entries.
    ///
    /// Segments are joined with `:`. A literal `:` or `\` inside a segment is
    /// escaped with `\`, and an empty segment is written as `\0`, so distinct
    /// keys never share a cache key. [`HierarchyKey::parse`] reverses it.
    pub fn cache_key(&self) -> String {
        self.segments
            .iter()
            .map(String::as_str)
            .map(escape_segment)
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Rebuilds a key from its [`HierarchyKey::cache_key`] form.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some('0') => {}
                    Some(escaped) => current.push(escaped),
                    None => current.push('\\'),
                },
                ':' => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);
        Self { segments }
    }

    /// Grandparent context flattened onto every leaf fetched under this key.
    pub fn context_label(&self) -> Option<&str> {
        self.segments
            .last()
            .map(String::as_str)
            .filter(|segment| !segment.is_empty())
    }
}

fn escape_segment(segment: &str) -> String {
    if segment.is_empty() {
        return "\\0".to_string();
    }
    let mut escaped = String::with_capacity(segment.len());
    for ch in segment.chars() {
        if matches!(ch, '\\' | ':') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl fmt::Display for HierarchyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Mid-level node (a city, a country, a category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// Unique within the parent scope.
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub leaves: Vec<Leaf>,
}

impl Entity {
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// Terminal record (a room, an item) owned by exactly one [`Entity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub secondary_contact: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorContext {
    pub entity_id: String,
    pub entity_name: String,
    #[serde(default)]
    pub entity_label: String,
    #[serde(default)]
    pub scope: Option<String>,
}

/// A leaf denormalized with its ancestors so one lower-cased string can be
/// searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatLeaf {
    pub leaf: Leaf,
    pub context: AncestorContext,
    #[serde(skip)]
    haystack: String,
}

impl FlatLeaf {
    pub fn new(leaf: Leaf, context: AncestorContext) -> Self {
        let haystack = build_haystack(&leaf, &context);
        Self {
            leaf,
            context,
            haystack,
        }
    }

    /// Lower-cased space join of every searchable field.
    pub fn haystack(&self) -> &str {
        &self.haystack
    }

    /// Recomputes the search string, e.g. after deserializing a remote
    /// result where it was skipped.
    pub fn reindex(mut self) -> Self {
        self.haystack = build_haystack(&self.leaf, &self.context);
        self
    }
}

fn build_haystack(leaf: &Leaf, context: &AncestorContext) -> String {
    [
        leaf.name.as_str(),
        leaf.contact.as_str(),
        leaf.secondary_contact.as_deref().unwrap_or_default(),
        leaf.notes.as_deref().unwrap_or_default(),
        context.entity_name.as_str(),
        context.entity_label.as_str(),
        context.scope.as_deref().unwrap_or_default(),
    ]
    .join(" ")
    .to_lowercase()
}

/// Projects every entity's leaves, in hierarchy order, with ancestor context
/// attached.
pub fn flatten_leaves(key: &HierarchyKey, entities: &[Entity]) -> Vec<FlatLeaf> {
    let scope = key.context_label().map(str::to_string);
    entities
        .iter()
        .flat_map(|entity| {
            let context = AncestorContext {
                entity_id: entity.id.clone(),
                entity_name: entity.name.clone(),
                entity_label: entity.label.clone(),
                scope: scope.clone(),
            };
            entity
                .leaves
                .iter()
                .map(move |leaf| FlatLeaf::new(leaf.clone(), context.clone()))
        })
        .collect()
}
