//! nbformat 3 adapter.
//!
//! v3 notebooks nest their cells in worksheets, have a `heading` cell type,
//! name code cell fields differently (`input`, `prompt_number`) and store
//! output payloads as flat, non-MIME keys (`text`, `png`, ...). Everything is
//! upgraded to the v4-shaped [`Notebook`].

use log::{debug, trace};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::cells::{Cell, CellMetadata, CodeCell, MarkdownCell, RawCell};
use crate::error::{NotebookError, Result};
use crate::outputs::{DisplayData, ErrorOutput, ExecuteResult, Output, StreamName, StreamOutput};
use crate::primitives::{
    create_frozen_media_bundle, demultiline, mimetypes, CellIdGenerator, MediaBundle,
    MultilineString, UuidCellIds,
};
use crate::structure::Notebook;
use crate::v4::detect_version;

/// v3 output keys and the mimetypes they stand for.
const LEGACY_MIMETYPES: [(&str, &str); 9] = [
    ("text", mimetypes::TEXT_PLAIN),
    ("latex", mimetypes::TEXT_LATEX),
    ("png", mimetypes::IMAGE_PNG),
    ("jpeg", mimetypes::IMAGE_JPEG),
    ("svg", mimetypes::IMAGE_SVG),
    ("html", mimetypes::TEXT_HTML),
    ("javascript", mimetypes::APPLICATION_JAVASCRIPT),
    ("json", mimetypes::APPLICATION_JSON),
    ("pdf", mimetypes::APPLICATION_PDF),
];

#[derive(Deserialize, Debug)]
#[serde(tag = "output_type")]
enum OnDiskOutputV3 {
    #[serde(rename = "pyout")]
    PyOut {
        #[serde(default)]
        prompt_number: Option<i64>,
        #[serde(default)]
        metadata: Map<String, Value>,
        /// The media payload: `text`, `html`, `png`, ...
        #[serde(flatten)]
        media: Map<String, Value>,
    },
    #[serde(rename = "display_data")]
    DisplayData {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(flatten)]
        media: Map<String, Value>,
    },
    #[serde(rename = "stream")]
    Stream {
        #[serde(default)]
        stream: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        text: MultilineString,
    },
    #[serde(rename = "pyerr")]
    PyErr {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
enum OnDiskCellV3 {
    Heading {
        #[serde(default = "default_heading_level")]
        level: i64,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
    },
    Markdown {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
    },
    Code {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        input: MultilineString,
        #[serde(default)]
        prompt_number: Option<i64>,
        #[serde(default)]
        collapsed: Option<bool>,
        #[serde(default)]
        outputs: Vec<Value>,
    },
    Raw {
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        source: MultilineString,
    },
}

fn default_heading_level() -> i64 {
    1
}

pub fn is_notebook_v3(value: &Value) -> bool {
    value.is_object()
        && matches!(
            detect_version(value),
            (Some(3), Some(minor)) if minor >= 0
        )
}

pub fn from_js(value: &Value) -> Result<Notebook> {
    from_js_with(value, &UuidCellIds)
}

/// Parse a v3 notebook, drawing every cell id from `ids`.
///
/// Cells from all worksheets are concatenated in order.
pub fn from_js_with(value: &Value, ids: &dyn CellIdGenerator) -> Result<Notebook> {
    let (major, minor) = detect_version(value);
    if !is_notebook_v3(value) {
        return Err(NotebookError::NotV3 {
            major: major.unwrap_or(-1),
            minor: minor.unwrap_or(-1),
        });
    }
    let minor = minor.unwrap_or_default();

    let metadata = value
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut notebook = Notebook::new()
        .with_nbformat(4, minor)
        .with_metadata(metadata);

    let worksheets = value
        .get("worksheets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for worksheet in worksheets {
        let cells = worksheet
            .get("cells")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for cell_value in cells {
            let cell = create_immutable_cell(cell_value)?;
            let id = ids.generate();
            trace!("[commutable] assigned cell id {} to v3 cell", id);
            notebook.push_cell(id, cell);
        }
    }

    debug!(
        "[commutable] upgraded nbformat v3.{} notebook ({} worksheets, {} cells)",
        minor,
        worksheets.len(),
        notebook.len()
    );
    Ok(notebook)
}

/// Convert a v3 cell. Heading cells become markdown cells.
pub fn create_immutable_cell(value: &Value) -> Result<Cell> {
    match value.get("cell_type").and_then(Value::as_str) {
        Some("heading" | "markdown" | "code" | "raw") => {}
        other => {
            return Err(NotebookError::UnknownCellType(
                other.unwrap_or_default().to_string(),
            ))
        }
    }

    let cell = match OnDiskCellV3::deserialize(value)? {
        OnDiskCellV3::Heading {
            level,
            metadata,
            source,
        } => Cell::Markdown(MarkdownCell {
            source: heading_to_markdown(level, &source),
            metadata: CellMetadata::from_js(metadata),
            attachments: None,
        }),
        OnDiskCellV3::Markdown { metadata, source } => Cell::Markdown(MarkdownCell {
            source: demultiline(&source),
            metadata: CellMetadata::from_js(metadata),
            attachments: None,
        }),
        OnDiskCellV3::Code {
            mut metadata,
            input,
            prompt_number,
            collapsed,
            outputs,
        } => {
            if let Some(collapsed) = collapsed {
                metadata
                    .entry("collapsed")
                    .or_insert(Value::Bool(collapsed));
            }
            Cell::Code(CodeCell {
                source: demultiline(&input),
                outputs: outputs
                    .iter()
                    .map(create_immutable_output)
                    .collect::<Result<_>>()?,
                execution_count: prompt_number,
                metadata: CellMetadata::from_js(metadata),
            })
        }
        OnDiskCellV3::Raw { metadata, source } => Cell::Raw(RawCell {
            source: demultiline(&source),
            metadata: CellMetadata::from_js(metadata),
            attachments: None,
        }),
    };
    Ok(cell)
}

/// Convert a v3 output (`pyout`, `display_data`, `stream`, `pyerr`).
pub fn create_immutable_output(value: &Value) -> Result<Output> {
    let Some(object) = value.as_object() else {
        return Err(NotebookError::OutputStructureUnknown);
    };
    match object.get("output_type").and_then(Value::as_str) {
        Some("pyout" | "display_data" | "stream" | "pyerr") => {}
        Some(other) => return Err(NotebookError::UnknownOutputType(other.to_string())),
        None => return Err(NotebookError::OutputStructureUnknown),
    }

    let output = match OnDiskOutputV3::deserialize(value)? {
        OnDiskOutputV3::PyOut {
            prompt_number,
            metadata,
            media,
        } => Output::ExecuteResult(ExecuteResult {
            execution_count: prompt_number,
            data: create_v3_media_bundle(&media),
            metadata,
        }),
        OnDiskOutputV3::DisplayData { metadata, media } => Output::DisplayData(DisplayData {
            data: create_v3_media_bundle(&media),
            metadata,
        }),
        OnDiskOutputV3::Stream { stream, name, text } => {
            let name = match stream.or(name).as_deref() {
                Some("stderr") => StreamName::Stderr,
                _ => StreamName::Stdout,
            };
            Output::Stream(StreamOutput {
                name,
                text: demultiline(&text),
            })
        }
        OnDiskOutputV3::PyErr {
            ename,
            evalue,
            traceback,
        } => Output::Error(ErrorOutput {
            ename,
            evalue,
            traceback,
        }),
    };
    Ok(output)
}

/// Map legacy payload keys to mimetypes and normalize the result.
///
/// Keys that already look like mimetypes are kept; other keys (leftover
/// fields such as `language`) are dropped. v3 stored JSON payloads as text,
/// which is parsed here.
fn create_v3_media_bundle(fields: &Map<String, Value>) -> MediaBundle {
    let mut bundle = Map::new();
    for (key, value) in fields {
        let mimetype = match LEGACY_MIMETYPES.iter().find(|(legacy, _)| *legacy == key.as_str()) {
            Some((_, mimetype)) => mimetype.to_string(),
            None if key.contains('/') => key.clone(),
            None => continue,
        };
        let value = if mimetype == mimetypes::APPLICATION_JSON {
            parse_json_payload(value)
        } else {
            value.clone()
        };
        bundle.insert(mimetype, value);
    }
    create_frozen_media_bundle(&bundle)
}

fn parse_json_payload(value: &Value) -> Value {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Array(lines) if lines.iter().all(Value::is_string) => {
            lines.iter().filter_map(Value::as_str).collect()
        }
        _ => return value.clone(),
    };
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Prefix every source line with `level` hashes. Levels below 1 count as 1.
fn heading_to_markdown(level: i64, source: &MultilineString) -> String {
    let prefix = format!("{} ", "#".repeat(level.max(1) as usize));
    match source {
        MultilineString::Single(text) => format!("{}{}", prefix, text),
        MultilineString::Lines(lines) => lines
            .iter()
            .map(|line| format!("{}{}", prefix, line))
            .collect(),
    }
}
