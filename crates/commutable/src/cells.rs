//! Code, markdown and raw cells, and their conversion to and from the v4
//! on-disk shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{NotebookError, Result};
use crate::outputs::{create_immutable_output, output_to_js, OnDiskOutput, Output};
use crate::primitives::{demultiline, remultiline, MultilineString};

/// Cell type tags as written in notebooks.
pub mod cell_types {
    pub const CODE: &str = "code";
    pub const MARKDOWN: &str = "markdown";
    pub const RAW: &str = "raw";
}

/// Metadata path of the editor's pending-deletion flag.
pub const DELETING_PATH: [&str; 3] = ["nteract", "transient", "deleting"];

/// Insertion-ordered set of cell tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the tag was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags from an on-disk value. Anything but an array yields no tags, and
    /// non-string entries are dropped.
    fn from_js(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Self::default(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

impl From<Vec<String>> for Tags {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<Tags> for Vec<String> {
    fn from(tags: Tags) -> Self {
        tags.0
    }
}

static NO_TAGS: Tags = Tags(Vec::new());

/// Cell metadata: the `tags` set plus every other key as free-form JSON.
///
/// `tags` is `None` when the cell never had a `tags` key, so an explicit
/// empty list survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl CellMetadata {
    pub fn from_js(mut metadata: Map<String, Value>) -> Self {
        let tags = metadata
            .remove("tags")
            .map(|value| Tags::from_js(Some(&value)));
        Self {
            tags,
            additional: metadata,
        }
    }

    /// On-disk metadata. `tags` is written whenever it was read or set.
    pub fn to_js(&self) -> Map<String, Value> {
        let mut metadata = self.additional.clone();
        if let Some(tags) = &self.tags {
            metadata.insert("tags".into(), Value::from(Vec::from(tags.clone())));
        }
        metadata
    }

    pub fn tags(&self) -> &Tags {
        self.tags.as_ref().unwrap_or(&NO_TAGS)
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        self.tags.get_or_insert_with(Tags::new)
    }

    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.additional.get(*first)?, |value, key| value.get(*key))
    }

    /// Set a nested value, creating (or replacing non-object) intermediate
    /// maps along the way.
    pub fn set_in(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut map = &mut self.additional;
        for key in parents {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(inner) = entry else {
                return;
            };
            map = inner;
        }
        map.insert(last.to_string(), value);
    }

    /// Whether the cell is flagged for deletion by the editor.
    pub fn is_deleting(&self) -> bool {
        self.get_in(&DELETING_PATH)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn seeded(additional: Value) -> Self {
        match additional {
            Value::Object(additional) => Self {
                tags: None,
                additional,
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(MarkdownCell),
    Raw(RawCell),
}

impl Cell {
    pub fn cell_type(&self) -> &'static str {
        match self {
            Cell::Code(_) => cell_types::CODE,
            Cell::Markdown(_) => cell_types::MARKDOWN,
            Cell::Raw(_) => cell_types::RAW,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Cell::Code(cell) => &cell.source,
            Cell::Markdown(cell) => &cell.source,
            Cell::Raw(cell) => &cell.source,
        }
    }

    pub fn metadata(&self) -> &CellMetadata {
        match self {
            Cell::Code(cell) => &cell.metadata,
            Cell::Markdown(cell) => &cell.metadata,
            Cell::Raw(cell) => &cell.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut CellMetadata {
        match self {
            Cell::Code(cell) => &mut cell.metadata,
            Cell::Markdown(cell) => &mut cell.metadata,
            Cell::Raw(cell) => &mut cell.metadata,
        }
    }
}

impl From<CodeCell> for Cell {
    fn from(cell: CodeCell) -> Self {
        Cell::Code(cell)
    }
}

impl From<MarkdownCell> for Cell {
    fn from(cell: MarkdownCell) -> Self {
        Cell::Markdown(cell)
    }
}

impl From<RawCell> for Cell {
    fn from(cell: RawCell) -> Self {
        Cell::Raw(cell)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCell {
    pub source: String,
    pub outputs: Vec<Output>,
    pub execution_count: Option<i64>,
    pub metadata: CellMetadata,
}

impl CodeCell {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

impl Default for CodeCell {
    fn default() -> Self {
        Self {
            source: String::new(),
            outputs: Vec::new(),
            execution_count: None,
            metadata: CellMetadata::seeded(json!({
                "collapsed": true,
                "jupyter": {"source_hidden": false, "outputs_hidden": false},
                "nteract": {"transient": {"deleting": false}},
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownCell {
    pub source: String,
    pub metadata: CellMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

impl MarkdownCell {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

impl Default for MarkdownCell {
    fn default() -> Self {
        Self {
            source: String::new(),
            metadata: CellMetadata::seeded(json!({
                "nteract": {"transient": {"deleting": false}},
            })),
            attachments: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCell {
    pub source: String,
    pub metadata: CellMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Value>,
}

impl RawCell {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

impl Default for RawCell {
    fn default() -> Self {
        Self {
            source: String::new(),
            metadata: CellMetadata::seeded(json!({
                "nteract": {"transient": {"deleting": false}},
            })),
            attachments: None,
        }
    }
}

/// A cell exactly as it appears in a v4 notebook file.
///
/// Outputs are read as raw JSON (`OnDiskCell<Value>`) so unknown output
/// types are reported by [`create_immutable_output`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "cell_type",
    rename_all = "lowercase",
    bound(deserialize = "O: Deserialize<'de>")
)]
pub enum OnDiskCell<O = OnDiskOutput> {
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
        #[serde(default)]
        execution_count: Option<i64>,
        #[serde(default)]
        outputs: Vec<O>,
    },
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
}

impl<O> OnDiskCell<O> {
    pub fn id(&self) -> Option<&str> {
        match self {
            OnDiskCell::Code { id, .. }
            | OnDiskCell::Markdown { id, .. }
            | OnDiskCell::Raw { id, .. } => id.as_deref(),
        }
    }
}

/// Convert a v4 on-disk cell into its in-memory form. The cell's `id` is not
/// part of the result; callers decide how identifiers are assigned.
pub fn create_immutable_cell(value: &Value) -> Result<Cell> {
    match value.get("cell_type").and_then(Value::as_str) {
        Some(cell_types::CODE | cell_types::MARKDOWN | cell_types::RAW) => {}
        Some(other) => return Err(NotebookError::UnknownCellType(other.to_string())),
        None => return Err(NotebookError::UnknownCellType(String::new())),
    }

    let cell = match OnDiskCell::<Value>::deserialize(value)? {
        OnDiskCell::Code {
            metadata,
            source,
            execution_count,
            outputs,
            ..
        } => Cell::Code(CodeCell {
            source: demultiline(&source),
            outputs: outputs
                .iter()
                .map(create_immutable_output)
                .collect::<Result<_>>()?,
            execution_count,
            metadata: CellMetadata::from_js(metadata),
        }),
        OnDiskCell::Markdown {
            metadata,
            source,
            attachments,
            ..
        } => Cell::Markdown(MarkdownCell {
            source: demultiline(&source),
            metadata: CellMetadata::from_js(metadata),
            attachments,
        }),
        OnDiskCell::Raw {
            metadata,
            source,
            attachments,
            ..
        } => Cell::Raw(RawCell {
            source: demultiline(&source),
            metadata: CellMetadata::from_js(metadata),
            attachments,
        }),
    };
    Ok(cell)
}

/// Convert an in-memory cell back to the v4 on-disk shape. `id` is written
/// only when given.
pub fn cell_to_js(cell: &Cell, id: Option<&str>) -> OnDiskCell {
    let id = id.map(str::to_string);
    match cell {
        Cell::Code(cell) => OnDiskCell::Code {
            id,
            metadata: cell.metadata.to_js(),
            source: MultilineString::Lines(remultiline(cell.source.as_str())),
            execution_count: cell.execution_count,
            outputs: cell.outputs.iter().map(output_to_js).collect(),
        },
        Cell::Markdown(cell) => OnDiskCell::Markdown {
            id,
            metadata: cell.metadata.to_js(),
            source: MultilineString::Lines(remultiline(cell.source.as_str())),
            attachments: cell.attachments.clone(),
        },
        Cell::Raw(cell) => OnDiskCell::Raw {
            id,
            metadata: cell.metadata.to_js(),
            source: MultilineString::Lines(remultiline(cell.source.as_str())),
            attachments: cell.attachments.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::{StreamName, StreamOutput};

    #[test]
    fn test_code_cell_defaults() {
        let cell = CodeCell::default();
        assert_eq!(cell.source, "");
        assert!(cell.outputs.is_empty());
        assert_eq!(cell.execution_count, None);
        assert_eq!(cell.metadata.additional.get("collapsed"), Some(&json!(true)));
        assert_eq!(
            cell.metadata.get_in(&["jupyter", "outputs_hidden"]),
            Some(&json!(false))
        );
        assert!(!cell.metadata.is_deleting());
    }

    #[test]
    fn test_markdown_cell_defaults_have_no_jupyter_map() {
        let cell = MarkdownCell::default();
        assert!(cell.metadata.additional.get("jupyter").is_none());
        assert_eq!(
            cell.metadata.get_in(&DELETING_PATH),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_code_cell_from_disk() {
        let cell = create_immutable_cell(&json!({
            "cell_type": "code",
            "execution_count": 1,
            "metadata": {"collapsed": false, "tags": ["parameters", "slow", "slow"]},
            "outputs": [{"name": "stdout", "output_type": "stream", "text": ["hello\n"]}],
            "source": ["print(\"hello\")"]
        }))
        .unwrap();

        let Cell::Code(code) = cell else {
            panic!("Expected code cell, got {:?}", cell);
        };
        assert_eq!(code.source, "print(\"hello\")");
        assert_eq!(code.execution_count, Some(1));
        assert_eq!(
            code.outputs,
            vec![Output::Stream(StreamOutput::new(StreamName::Stdout, "hello\n"))]
        );
        assert_eq!(
            code.metadata.tags().iter().collect::<Vec<_>>(),
            ["parameters", "slow"]
        );
        assert_eq!(code.metadata.additional.get("collapsed"), Some(&json!(false)));
        assert!(code.metadata.additional.get("tags").is_none());
    }

    #[test]
    fn test_malformed_tags_become_empty() {
        let cell = create_immutable_cell(&json!({
            "cell_type": "markdown",
            "metadata": {"tags": "not-a-list"},
            "source": "# Title"
        }))
        .unwrap();
        assert!(cell.metadata().tags().is_empty());
    }

    #[test]
    fn test_unknown_cell_type_is_rejected() {
        let err = create_immutable_cell(&json!({"cell_type": "heading", "source": ""}))
            .unwrap_err();
        assert!(err.to_string().contains("Cell type unknown"));

        let err = create_immutable_cell(&json!({"source": ""})).unwrap_err();
        assert!(matches!(err, NotebookError::UnknownCellType(_)));
    }

    #[test]
    fn test_unknown_output_in_cell_is_rejected() {
        let err = create_immutable_cell(&json!({
            "cell_type": "code",
            "metadata": {},
            "source": "",
            "outputs": [{"output_type": "pyout"}]
        }))
        .unwrap_err();
        assert!(matches!(err, NotebookError::UnknownOutputType(ref t) if t == "pyout"));
    }

    #[test]
    fn test_markdown_to_js_has_no_outputs() {
        let cell = Cell::Markdown(MarkdownCell {
            source: "# Title\n\nSome text\n".into(),
            metadata: CellMetadata::default(),
            attachments: None,
        });
        let value = serde_json::to_value(cell_to_js(&cell, None)).unwrap();
        assert_eq!(
            value,
            json!({
                "cell_type": "markdown",
                "metadata": {},
                "source": ["# Title\n", "\n", "Some text\n"]
            })
        );
    }

    #[test]
    fn test_code_to_js_round_trip() {
        let original = json!({
            "cell_type": "code",
            "execution_count": null,
            "id": "abc",
            "metadata": {"tags": ["a"]},
            "outputs": [],
            "source": ["x = 1\n", "y = 2"]
        });
        let cell = create_immutable_cell(&original).unwrap();
        let value = serde_json::to_value(cell_to_js(&cell, Some("abc"))).unwrap();
        assert_eq!(value, original);
    }

    #[test]
    fn test_empty_tags_survive_round_trip() {
        let original = json!({
            "cell_type": "markdown",
            "metadata": {"tags": []},
            "source": ["# Title"]
        });
        let cell = create_immutable_cell(&original).unwrap();
        assert_eq!(cell.metadata().tags, Some(Tags::new()));
        let value = serde_json::to_value(cell_to_js(&cell, None)).unwrap();
        assert_eq!(value, original);

        let cell = create_immutable_cell(&json!({
            "cell_type": "markdown",
            "metadata": {},
            "source": ["# Title"]
        }))
        .unwrap();
        assert_eq!(cell.metadata().tags, None);
        assert!(cell.metadata().tags().is_empty());
    }

    #[test]
    fn test_set_in_creates_intermediate_maps() {
        let mut metadata = CellMetadata::default();
        metadata.set_in(&DELETING_PATH, json!(true));
        assert!(metadata.is_deleting());
        assert_eq!(
            Value::Object(metadata.to_js()),
            json!({"nteract": {"transient": {"deleting": true}}})
        );
    }
}
