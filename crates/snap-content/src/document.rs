//! Structural helpers over the site-content document.
//!
//! The document is a free-form JSON tree. Only the root and a few
//! well-known sections have a required shape; everything else is
//! preserved verbatim.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use snap_types::ImageUrl;

use crate::error::{ContentError, ContentResult};

/// One step of a location inside the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Render a path as dot-joined segments, e.g. `gallery.images.0`.
pub fn render_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Callback for [`walk`]. Called once per node, parents before children.
pub trait Visitor {
    fn visit(&mut self, path: &[PathSegment], value: &Value);
}

impl<F> Visitor for F
where
    F: FnMut(&[PathSegment], &Value),
{
    fn visit(&mut self, path: &[PathSegment], value: &Value) {
        self(path, value)
    }
}

/// Depth-first traversal of every node in `doc`.
pub fn walk<V: Visitor + ?Sized>(doc: &Value, visitor: &mut V) {
    let mut path = Vec::new();
    walk_node(doc, &mut path, visitor);
}

fn walk_node<V: Visitor + ?Sized>(value: &Value, path: &mut Vec<PathSegment>, visitor: &mut V) {
    visitor.visit(path, value);
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                walk_node(item, path, visitor);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                path.push(PathSegment::Key(key.clone()));
                walk_node(child, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Check the structural rules of a whole document.
///
/// `null` counts as absent. Otherwise this is stricter than a truthiness
/// check: the root must be an object, and a present `brand` or
/// `navigation` must be an object, so `""`, `false`, `0` and arrays are
/// rejected for them instead of being let through.
pub fn validate(doc: &Value) -> ContentResult<()> {
    let root = doc
        .as_object()
        .ok_or_else(|| ContentError::Validation("Content must be an object".into()))?;

    if let Some(brand) = present(root.get("brand")) {
        if !brand.is_object() {
            return Err(ContentError::Validation("Brand must be an object".into()));
        }
    }

    if let Some(navigation) = present(root.get("navigation")) {
        if !navigation.is_object() {
            return Err(ContentError::Validation(
                "Navigation must be an object".into(),
            ));
        }
        if let Some(links) = present(navigation.get("links")) {
            if !links.is_array() {
                return Err(ContentError::Validation(
                    "Navigation links must be an array".into(),
                ));
            }
        }
    }

    Ok(())
}

/// Treat explicit `null` the same as an absent key.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Set the value at `path`, creating intermediate objects as needed.
///
/// Any non-object value met along the way (including the root) is
/// replaced by an empty object. An empty path replaces the whole document.
pub fn set_nested_value(doc: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *doc = value;
        return;
    };

    let mut current = doc;
    for key in parents {
        current = ensure_object(current)
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.clone(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .expect("value was just replaced by an object")
}

/// A local image URL found in the document, with where it was found.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ImageRef {
    pub path: String,
    pub url: String,
}

/// Every string leaf that points into the local uploads area, in
/// document order. Typed image nodes (`{"type": "image", "value": ...}`)
/// show up through their `value` leaf.
pub fn local_image_candidates(doc: &Value) -> Vec<ImageRef> {
    let mut found = Vec::new();
    walk(doc, &mut |path: &[PathSegment], value: &Value| {
        if let Value::String(s) = value {
            if let ImageUrl::Local(url) = ImageUrl::classify(s) {
                found.push(ImageRef {
                    path: render_path(path),
                    url: url.to_string(),
                });
            }
        }
    });
    found
}

/// Distinct local image URLs referenced anywhere in the document.
pub fn collect_image_references(doc: &Value) -> BTreeSet<String> {
    local_image_candidates(doc)
        .into_iter()
        .map(|candidate| candidate.url)
        .collect()
}

/// Full path for a section update. A path already rooted at `section`
/// is used as-is; anything else is taken relative to the section.
pub fn section_path(section: &str, path: &[String]) -> Vec<String> {
    if section.is_empty() || path.first().map(String::as_str) == Some(section) {
        return path.to_vec();
    }
    std::iter::once(section.to_string())
        .chain(path.iter().cloned())
        .collect()
}
