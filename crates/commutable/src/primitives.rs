//! Shared codecs used by every notebook version: multiline strings, media
//! bundles and cell identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of a cell, used as the key into a notebook's cell map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CellId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<uuid::Uuid> for CellId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

/// Source of fresh cell identifiers.
///
/// Every operation that has to invent an id takes one of these, so callers
/// that need reproducible ids (tests, snapshot tooling) can swap in
/// [`SequentialCellIds`].
pub trait CellIdGenerator {
    fn generate(&self) -> CellId;
}

/// Random UUID v4 identifiers. This is what [`create_cell_id`] uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCellIds;

impl CellIdGenerator for UuidCellIds {
    fn generate(&self) -> CellId {
        uuid::Uuid::new_v4().into()
    }
}

/// Deterministic identifiers of the form `{prefix}-{n}`, counting from 0.
#[derive(Debug)]
pub struct SequentialCellIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialCellIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialCellIds {
    fn default() -> Self {
        Self::new("cell")
    }
}

impl CellIdGenerator for SequentialCellIds {
    fn generate(&self) -> CellId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        CellId(format!("{}-{}", self.prefix, n))
    }
}

/// Generate a fresh, globally unique cell id.
pub fn create_cell_id() -> CellId {
    UuidCellIds.generate()
}

/// On-disk text that is either a single string or a list of line fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultilineString {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineString {
    fn default() -> Self {
        MultilineString::Lines(Vec::new())
    }
}

impl From<String> for MultilineString {
    fn from(text: String) -> Self {
        MultilineString::Single(text)
    }
}

impl From<&str> for MultilineString {
    fn from(text: &str) -> Self {
        MultilineString::Single(text.to_string())
    }
}

impl From<Vec<String>> for MultilineString {
    fn from(lines: Vec<String>) -> Self {
        MultilineString::Lines(lines)
    }
}

/// Join line fragments into the single in-memory string.
///
/// Fragments already carry their own line terminators, so nothing is added
/// between them.
pub fn demultiline(value: &MultilineString) -> String {
    match value {
        MultilineString::Single(text) => text.clone(),
        MultilineString::Lines(lines) => lines.concat(),
    }
}

/// Convert to the on-disk list of line fragments.
///
/// Lists pass through untouched; strings are split with [`split_lines`].
pub fn remultiline(value: impl Into<MultilineString>) -> Vec<String> {
    match value.into() {
        MultilineString::Single(text) => split_lines(&text),
        MultilineString::Lines(lines) => lines,
    }
}

/// Split after every `\n` (which also covers `\r\n`). Never yields an empty
/// fragment, so `""` becomes `[]` and `"a\n"` becomes `["a\n"]`.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// Well-known mimetypes found in output bundles. Bundles are not limited to
/// these; any key read from disk is kept.
pub mod mimetypes {
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const TEXT_HTML: &str = "text/html";
    pub const TEXT_MARKDOWN: &str = "text/markdown";
    pub const TEXT_LATEX: &str = "text/latex";
    pub const IMAGE_PNG: &str = "image/png";
    pub const IMAGE_JPEG: &str = "image/jpeg";
    pub const IMAGE_GIF: &str = "image/gif";
    pub const IMAGE_SVG: &str = "image/svg+xml";
    pub const APPLICATION_JAVASCRIPT: &str = "application/javascript";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_PDF: &str = "application/pdf";
    pub const DATA_RESOURCE: &str = "application/vnd.dataresource+json";
    pub const PLOTLY: &str = "application/vnd.plotly.v1+json";
    pub const GEOJSON: &str = "application/geo+json";
    pub const WIDGET_VIEW: &str = "application/vnd.jupyter.widget-view+json";
    pub const VEGA_V5: &str = "application/vnd.vega.v5+json";
    pub const VEGALITE_V4: &str = "application/vnd.vegalite.v4+json";
}

/// `application/json` and every `application/*+json` mimetype.
pub fn is_json_mimetype(mimetype: &str) -> bool {
    match mimetype.strip_prefix("application/") {
        Some(rest) => rest == "json" || rest.ends_with("+json"),
        None => false,
    }
}

/// Any Vega or Vega-Lite version, e.g. `application/vnd.vega.v5+json` or
/// `application/vnd.vegalite.v4+json`.
pub fn is_vega_mimetype(mimetype: &str) -> bool {
    mimetype
        .strip_prefix("application/vnd.vega")
        .is_some_and(|rest| rest.contains("json"))
}

/// Mimetype-keyed alternative renderings of a single output value.
///
/// Text payloads are held as one string. Vega-family payloads are held as
/// JSON text rather than as structured values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaBundle(Map<String, Value>);

impl MediaBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mimetype: &str) -> Option<&Value> {
        self.0.get(mimetype)
    }

    /// The payload for `mimetype` when it is stored as text.
    pub fn text(&self, mimetype: &str) -> Option<&str> {
        self.0.get(mimetype).and_then(Value::as_str)
    }

    pub fn contains(&self, mimetype: &str) -> bool {
        self.0.contains_key(mimetype)
    }

    pub fn insert(&mut self, mimetype: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(mimetype.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MediaBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Normalize an on-disk `data` bundle into its in-memory form.
pub fn create_frozen_media_bundle(bundle: &Map<String, Value>) -> MediaBundle {
    let data = bundle
        .iter()
        .map(|(mimetype, value)| {
            let value = if is_vega_mimetype(mimetype) {
                Value::String(value.to_string())
            } else {
                match value {
                    Value::String(_) => value.clone(),
                    Value::Array(lines) if !is_json_mimetype(mimetype) => {
                        join_string_array(lines).unwrap_or_else(|| value.clone())
                    }
                    _ => value.clone(),
                }
            };
            (mimetype.clone(), value)
        })
        .collect();
    MediaBundle(data)
}

/// Inverse of [`create_frozen_media_bundle`]: text payloads become line lists
/// and Vega payloads become JSON values again.
pub fn media_bundle_to_js(bundle: &MediaBundle) -> Map<String, Value> {
    bundle
        .iter()
        .map(|(mimetype, value)| {
            let value = match value {
                Value::String(text) if is_vega_mimetype(mimetype) => {
                    serde_json::from_str(text).unwrap_or_else(|_| value.clone())
                }
                Value::String(text) if !is_json_mimetype(mimetype) => {
                    Value::from(split_lines(text))
                }
                _ => value.clone(),
            };
            (mimetype.clone(), value)
        })
        .collect()
}

fn join_string_array(lines: &[Value]) -> Option<Value> {
    lines
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()
        .map(|parts| Value::String(parts.concat()))
}
