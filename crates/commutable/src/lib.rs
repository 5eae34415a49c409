//! # commutable
//!
//! Reads Jupyter notebooks in any of the nbformat 3 or 4 on-disk layouts,
//! normalizes them into one in-memory [`Notebook`], and writes them back out
//! as nbformat 4.
//!
//! The in-memory notebook keeps the display order of its cells
//! ([`Notebook::cell_order`]) separately from the cells themselves, which are
//! keyed by a stable [`CellId`]. Cells read from formats that predate cell
//! ids (v3 and v4.0 through v4.4) are assigned fresh ids on load.
//!
//! | On disk | In memory |
//! |---------|-----------|
//! | `["line 1\n", "line 2"]` sources and text | one `String` |
//! | `worksheets[*].cells` (v3) | one flat cell order |
//! | `heading` cells (v3) | markdown cells with `#` prefixes |
//! | `pyout` / `pyerr` (v3) | [`Output::ExecuteResult`] / [`Output::Error`] |
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | *(default)* | Parsing, normalization, editing and serialization |
//! | `kernel` | Map `jupyter-protocol` IOPub messages onto notebook outputs |
//!
//! ## Example
//!
//! ```rust
//! use commutable::{from_js, parse_notebook, stringify_notebook, to_js, CodeCell};
//!
//! let text = r#"{"cells": [], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;
//! let notebook = from_js(parse_notebook(text)?)?;
//!
//! let notebook = notebook.append_cell(CodeCell::new("print('hi')"), None);
//! let saved = stringify_notebook(&to_js(&notebook)?)?;
//! assert!(saved.contains("print('hi')"));
//! # Ok::<(), commutable::NotebookError>(())
//! ```

pub mod cells;
pub mod config;
pub mod error;
pub mod outputs;
pub mod primitives;
pub mod structure;
pub mod v3;
pub mod v4;

#[cfg(feature = "kernel")]
pub mod output_mapping;

use log::debug;
use serde::Serialize as _;
use serde_json::Value;

pub use cells::{cell_types, Cell, CellMetadata, CodeCell, MarkdownCell, RawCell, Tags};
pub use config::SerializeConfig;
pub use error::{NotebookError, Result};
pub use outputs::{
    create_immutable_output, output_to_js, DisplayData, ErrorOutput, ExecuteResult, Output,
    StreamName, StreamOutput,
};
pub use primitives::{
    create_cell_id, create_frozen_media_bundle, demultiline, remultiline, CellId,
    CellIdGenerator, MediaBundle, MultilineString, SequentialCellIds, UuidCellIds,
};
pub use structure::{monocell_notebook, Notebook};
pub use v4::NotebookV4;

#[cfg(feature = "kernel")]
pub use output_mapping::{message_to_kernel_output, KernelOutput};

/// Anything [`from_js`] accepts: an on-disk notebook or an already
/// normalized one.
#[derive(Debug, Clone)]
pub enum NotebookInput {
    OnDisk(Value),
    Normalized(Notebook),
}

impl From<Value> for NotebookInput {
    fn from(value: Value) -> Self {
        NotebookInput::OnDisk(value)
    }
}

impl From<Notebook> for NotebookInput {
    fn from(notebook: Notebook) -> Self {
        NotebookInput::Normalized(notebook)
    }
}

/// Parse notebook JSON text. The result is the on-disk shape, ready for
/// [`from_js`].
pub fn parse_notebook(text: &str) -> Result<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Normalize a notebook of any supported version.
///
/// A [`Notebook`] is handed back untouched. On-disk values are dispatched on
/// their `nbformat`.
pub fn from_js(input: impl Into<NotebookInput>) -> Result<Notebook> {
    from_js_with(input, &UuidCellIds)
}

/// [`from_js`] with cell ids drawn from `ids`.
pub fn from_js_with(
    input: impl Into<NotebookInput>,
    ids: &dyn CellIdGenerator,
) -> Result<Notebook> {
    let value = match input.into() {
        NotebookInput::Normalized(notebook) => return Ok(notebook),
        NotebookInput::OnDisk(value) => value,
    };

    if Notebook::is_record(&value) {
        return Notebook::from_record(&value);
    }

    match v4::detect_version(&value) {
        (Some(4), _) => {
            let well_formed = value.get("cells").is_some_and(Value::is_array)
                && value.get("metadata").is_some_and(Value::is_object);
            if well_formed {
                v4::from_js_with(&value, ids)
            } else {
                Err(NotebookError::FormatNotSupported)
            }
        }
        (Some(3), _) => v3::from_js_with(&value, ids),
        (Some(major), minor) if major != 0 => Err(NotebookError::VersionNotRecognized {
            major,
            minor: minor.unwrap_or_default(),
        }),
        _ => Err(NotebookError::FormatNotSupported),
    }
}

/// Convert a notebook to the nbformat 4 on-disk shape.
pub fn to_js(notebook: &Notebook) -> Result<NotebookV4> {
    if notebook.nbformat() == 4 && notebook.nbformat_minor() >= 0 {
        debug!(
            "[commutable] writing nbformat v4.{} notebook with {} cells",
            notebook.nbformat_minor(),
            notebook.len()
        );
        Ok(v4::to_js(notebook))
    } else {
        Err(NotebookError::UnsupportedWriteVersion {
            major: notebook.nbformat(),
            minor: notebook.nbformat_minor(),
        })
    }
}

/// JSON text with two-space indentation.
pub fn stringify_notebook(notebook: &NotebookV4) -> Result<String> {
    stringify_notebook_with(notebook, &SerializeConfig::default())
}

/// JSON text laid out according to `config`. Keys are written in sorted
/// order, as Jupyter does.
pub fn stringify_notebook_with(notebook: &NotebookV4, config: &SerializeConfig) -> Result<String> {
    let value = sort_keys(serde_json::to_value(notebook)?);
    let indent = " ".repeat(config.indent);
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;

    if config.trailing_newline {
        buf.push(b'\n');
    }

    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Rebuild every object with its keys in sorted order. A no-op unless some
/// crate in the build enables serde_json's `preserve_order`.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// `from_js(parse_notebook(text))`.
pub fn load_notebook(text: &str) -> Result<Notebook> {
    from_js(parse_notebook(text)?)
}

/// `stringify_notebook(to_js(notebook))`.
pub fn save_notebook(notebook: &Notebook) -> Result<String> {
    stringify_notebook(&to_js(notebook)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_js_passes_notebooks_through() {
        let notebook = monocell_notebook();
        let again = from_js(notebook.clone()).unwrap();
        assert_eq!(again, notebook);
    }

    #[test]
    fn test_from_js_rejects_non_notebooks() {
        let err = from_js(json!("")).unwrap_err();
        assert!(err.to_string().contains("This notebook format is not supported"));

        let err = from_js(json!({"cells": []})).unwrap_err();
        assert!(matches!(err, NotebookError::FormatNotSupported));
    }

    #[test]
    fn test_from_js_rejects_unknown_versions() {
        let err = from_js(json!({"nbformat": 5, "nbformat_minor": 1})).unwrap_err();
        assert_eq!(err.to_string(), "nbformat v5.1 not recognized");
    }

    #[test]
    fn test_from_js_requires_v4_structure() {
        let err = from_js(json!({
            "nbformat": 4, "nbformat_minor": 5, "cells": {}, "metadata": {}
        }))
        .unwrap_err();
        assert!(matches!(err, NotebookError::FormatNotSupported));
    }

    #[test]
    fn test_from_js_record_missing_map() {
        let err = from_js(json!({"cellOrder": ["a"]})).unwrap_err();
        assert!(matches!(err, NotebookError::NotANotebookRecord(_)));
    }

    #[test]
    fn test_to_js_only_writes_v4() {
        let err = to_js(&Notebook::new().with_nbformat(5, 0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Only notebook formats 3 and 4 are supported! Notebooks are written as format 4 \
             (got nbformat v5.0)"
        );

        let err = to_js(&Notebook::new().with_nbformat(4, -1)).unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedWriteVersion { .. }));
    }

    #[test]
    fn test_stringify_layouts() {
        let notebook = to_js(&Notebook::new()).unwrap();

        let text = stringify_notebook(&notebook).unwrap();
        assert_eq!(
            text,
            concat!(
                "{\n  \"cells\": [],\n  \"metadata\": {},\n",
                "  \"nbformat\": 4,\n  \"nbformat_minor\": 0\n}"
            )
        );

        let text = stringify_notebook_with(&notebook, &SerializeConfig::nbformat()).unwrap();
        assert_eq!(
            text,
            concat!(
                "{\n \"cells\": [],\n \"metadata\": {},\n",
                " \"nbformat\": 4,\n \"nbformat_minor\": 0\n}\n"
            )
        );
    }
}
