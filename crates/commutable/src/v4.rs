//! nbformat 4 adapter.
//!
//! Cell ids only exist on disk from v4.5 onwards. Older minor versions get
//! fresh ids on the way in and have them stripped on the way out.

use std::collections::HashSet;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cells::{cell_to_js, create_immutable_cell, OnDiskCell};
use crate::error::{NotebookError, Result};
use crate::primitives::{CellId, CellIdGenerator, UuidCellIds};
use crate::structure::Notebook;

/// First minor version whose cells carry an `id`.
pub const CELL_ID_MINOR_VERSION: i64 = 5;

/// A v4 notebook exactly as it appears on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotebookV4 {
    pub cells: Vec<OnDiskCell>,
    pub metadata: Map<String, Value>,
    pub nbformat: i64,
    pub nbformat_minor: i64,
}

/// `nbformat` and `nbformat_minor` of an on-disk value, if present.
pub(crate) fn detect_version(value: &Value) -> (Option<i64>, Option<i64>) {
    (
        value.get("nbformat").and_then(Value::as_i64),
        value.get("nbformat_minor").and_then(Value::as_i64),
    )
}

pub fn is_notebook_v4(value: &Value) -> bool {
    value.is_object()
        && matches!(
            detect_version(value),
            (Some(4), Some(minor)) if minor >= 0
        )
}

pub fn from_js(value: &Value) -> Result<Notebook> {
    from_js_with(value, &UuidCellIds)
}

/// Parse a v4 notebook, drawing any missing cell ids from `ids`.
pub fn from_js_with(value: &Value, ids: &dyn CellIdGenerator) -> Result<Notebook> {
    let (major, minor) = detect_version(value);
    if !is_notebook_v4(value) {
        return Err(NotebookError::NotV4 {
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

    let cells = value
        .get("cells")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    for cell_value in cells {
        let cell = create_immutable_cell(cell_value)?;
        let on_disk_id = cell_value
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());

        let id = match on_disk_id {
            Some(id) if minor >= CELL_ID_MINOR_VERSION => CellId::from(id),
            _ => {
                let id = ids.generate();
                trace!("[commutable] assigned cell id {}", id);
                id
            }
        };
        if !seen.insert(id.clone()) {
            return Err(NotebookError::DuplicateCellId(id));
        }
        notebook.push_cell(id, cell);
    }

    debug!(
        "[commutable] parsed nbformat v4.{} notebook with {} cells",
        minor,
        notebook.len()
    );
    Ok(notebook)
}

/// Convert a notebook to the v4 on-disk shape. Cell ids are written only for
/// minor version 5 and later.
pub fn to_js(notebook: &Notebook) -> NotebookV4 {
    let write_ids = notebook.nbformat_minor() >= CELL_ID_MINOR_VERSION;
    let cells = notebook
        .cells()
        .map(|(id, cell)| cell_to_js(cell, write_ids.then(|| id.as_str())))
        .collect();

    NotebookV4 {
        cells,
        metadata: notebook.metadata().clone(),
        nbformat: 4,
        nbformat_minor: notebook.nbformat_minor(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::Cell;
    use crate::primitives::SequentialCellIds;
    use serde_json::json;

    fn two_cell_notebook(minor: i64) -> Value {
        json!({
            "cells": [
                {
                    "cell_type": "markdown",
                    "id": "2fcdfa53",
                    "metadata": {},
                    "source": ["# Title"]
                },
                {
                    "cell_type": "code",
                    "execution_count": 1,
                    "id": "38f37a24",
                    "metadata": {},
                    "outputs": [
                        {"name": "stdout", "output_type": "stream", "text": ["hello\n"]}
                    ],
                    "source": ["print(\"hello\")"]
                }
            ],
            "metadata": {"kernelspec": {"name": "python3", "display_name": "Python 3"}},
            "nbformat": 4,
            "nbformat_minor": minor
        })
    }

    #[test]
    fn test_is_notebook_v4() {
        assert!(is_notebook_v4(&two_cell_notebook(5)));
        assert!(!is_notebook_v4(&json!({"nbformat": 3, "nbformat_minor": 0})));
        assert!(!is_notebook_v4(&json!({"nbformat": 4, "nbformat_minor": -1})));
        assert!(!is_notebook_v4(&json!({"nbformat": 4})));
        assert!(!is_notebook_v4(&json!("notebook")));
    }

    #[test]
    fn test_ids_are_kept_from_v4_5() {
        let notebook = from_js(&two_cell_notebook(5)).unwrap();
        let ids: Vec<&str> = notebook.cell_order().iter().map(CellId::as_str).collect();
        assert_eq!(ids, ["2fcdfa53", "38f37a24"]);
        assert_eq!(notebook.nbformat(), 4);
        assert_eq!(notebook.nbformat_minor(), 5);
    }

    #[test]
    fn test_ids_are_generated_before_v4_5() {
        let ids = SequentialCellIds::new("gen");
        let notebook = from_js_with(&two_cell_notebook(4), &ids).unwrap();
        let order: Vec<&str> = notebook.cell_order().iter().map(CellId::as_str).collect();
        assert_eq!(order, ["gen-0", "gen-1"]);
    }

    #[test]
    fn test_missing_id_is_backfilled_on_v4_5() {
        let mut value = two_cell_notebook(5);
        value["cells"][0].as_object_mut().unwrap().remove("id");
        value["cells"][1]["id"] = json!("");

        let ids = SequentialCellIds::new("gen");
        let notebook = from_js_with(&value, &ids).unwrap();
        let order: Vec<&str> = notebook.cell_order().iter().map(CellId::as_str).collect();
        assert_eq!(order, ["gen-0", "gen-1"]);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut value = two_cell_notebook(5);
        value["cells"][1]["id"] = json!("2fcdfa53");
        let err = from_js(&value).unwrap_err();
        assert!(matches!(
            err,
            NotebookError::DuplicateCellId(ref id) if id.as_str() == "2fcdfa53"
        ));
    }

    #[test]
    fn test_not_v4_reports_versions() {
        let err = from_js(&json!({"nbformat": 3, "nbformat_minor": 0})).unwrap_err();
        assert!(matches!(err, NotebookError::NotV4 { major: 3, minor: 0 }));
        assert!(err.to_string().contains("v3.0"));
    }

    #[test]
    fn test_cells_keep_their_content() {
        let notebook = from_js(&two_cell_notebook(5)).unwrap();
        let Some(Cell::Code(code)) = notebook.cell(&"38f37a24".into()) else {
            panic!("Expected code cell");
        };
        assert_eq!(code.source, "print(\"hello\")");
        assert_eq!(code.outputs.len(), 1);
    }

    #[test]
    fn test_round_trip_v4_5() {
        let original = two_cell_notebook(5);
        let notebook = from_js(&original).unwrap();
        assert_eq!(serde_json::to_value(to_js(&notebook)).unwrap(), original);
    }

    #[test]
    fn test_typed_notebook_reads_from_disk() {
        let original = two_cell_notebook(5);
        let typed = NotebookV4::deserialize(&original).unwrap();
        assert_eq!(typed.cells.len(), 2);
        assert_eq!(typed.cells[1].id(), Some("38f37a24"));
        assert_eq!(serde_json::to_value(&typed).unwrap(), original);

        let notebook = from_js(&original).unwrap();
        assert_eq!(to_js(&notebook), typed);
    }

    #[test]
    fn test_round_trip_v4_4_drops_ids() {
        let original = two_cell_notebook(4);
        let notebook = from_js(&original).unwrap();
        let written = serde_json::to_value(to_js(&notebook)).unwrap();

        let mut expected = original.clone();
        for cell in expected["cells"].as_array_mut().unwrap() {
            cell.as_object_mut().unwrap().remove("id");
        }
        assert_eq!(written, expected);
    }
}
