//! The normalized notebook: an ordered list of cell ids plus a map from id to
//! cell, kept in lockstep by every operation.
//!
//! Editing operations borrow the notebook and return a new one. Cells are
//! reference counted, so the copy shares every cell it did not touch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cells::{Cell, CodeCell, DELETING_PATH};
use crate::error::{NotebookError, Result};
use crate::outputs::Output;
use crate::primitives::{create_cell_id, CellId, CellIdGenerator};

/// Record keys of a serialized [`Notebook`].
pub mod keys {
    pub const CELL_ORDER: &str = "cellOrder";
    pub const CELL_MAP: &str = "cellMap";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    #[serde(rename = "cellOrder")]
    cell_order: Vec<CellId>,
    #[serde(rename = "cellMap")]
    cell_map: HashMap<CellId, Arc<Cell>>,
    nbformat: i64,
    nbformat_minor: i64,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self {
            cell_order: Vec::new(),
            cell_map: HashMap::new(),
            nbformat: 4,
            nbformat_minor: 0,
            metadata: Map::new(),
        }
    }
}

impl Notebook {
    /// An empty v4.0 notebook.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_nbformat(mut self, nbformat: i64, nbformat_minor: i64) -> Self {
        self.nbformat = nbformat;
        self.nbformat_minor = nbformat_minor;
        self
    }

    pub fn nbformat(&self) -> i64 {
        self.nbformat
    }

    pub fn nbformat_minor(&self) -> i64 {
        self.nbformat_minor
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn cell_order(&self) -> &[CellId] {
        &self.cell_order
    }

    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cell_map.get(id).map(Arc::as_ref)
    }

    /// Cells in display order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellId, &Cell)> {
        self.cell_order
            .iter()
            .filter_map(|id| self.cell_map.get(id).map(|cell| (id, cell.as_ref())))
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.cell_map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cell_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_order.is_empty()
    }

    /// Append `cell` under `id`, or under a fresh id when `id` is `None`.
    pub fn append_cell(&self, cell: impl Into<Cell>, id: Option<CellId>) -> Self {
        let id = id.unwrap_or_else(create_cell_id);
        let mut notebook = self.clone();
        notebook.push_cell(id, cell.into());
        notebook
    }

    /// Append `cell` under an id drawn from `ids`.
    pub fn append_cell_with(&self, cell: impl Into<Cell>, ids: &dyn CellIdGenerator) -> Self {
        self.append_cell(cell, Some(ids.generate()))
    }

    /// Insert `cell` under `id` at `index`. An index past the end appends.
    pub fn insert_cell_at(&self, cell: impl Into<Cell>, id: CellId, index: usize) -> Self {
        let mut notebook = self.clone();
        notebook.detach(&id);
        let len = notebook.cell_order.len();
        if index > len {
            warn!(
                "[commutable] insert index {} is past the end ({} cells), appending",
                index, len
            );
        }
        notebook.cell_order.insert(index.min(len), id.clone());
        notebook.cell_map.insert(id, Arc::new(cell.into()));
        notebook
    }

    /// Insert `cell` under `id` directly after `prior_id`.
    ///
    /// When `prior_id` is not in the notebook the cell goes to the front.
    pub fn insert_cell_after(&self, cell: impl Into<Cell>, id: CellId, prior_id: &CellId) -> Self {
        let index = match self.position(prior_id) {
            Some(position) if prior_id != &id => position + 1,
            Some(position) => position,
            None => {
                warn!(
                    "[commutable] cell {} not found, inserting {} at the front",
                    prior_id, id
                );
                0
            }
        };
        // Re-inserting an existing id shifts everything after its old slot.
        let index = match self.position(&id) {
            Some(existing) if existing < index => index - 1,
            _ => index,
        };
        self.insert_cell_at(cell, id, index)
    }

    /// Remove the cell. Unknown ids are ignored.
    pub fn delete_cell(&self, id: &CellId) -> Self {
        let mut notebook = self.clone();
        notebook.detach(id);
        notebook
    }

    /// Flag the cell as pending deletion, leaving it in place.
    pub fn mark_cell_deleting(&self, id: &CellId) -> Result<Self> {
        self.set_deleting(id, true)
    }

    /// Clear the pending-deletion flag.
    pub fn mark_cell_not_deleting(&self, id: &CellId) -> Result<Self> {
        self.set_deleting(id, false)
    }

    /// Apply `edit` to a copy of the cell.
    pub fn update_cell(&self, id: &CellId, edit: impl FnOnce(&mut Cell)) -> Result<Self> {
        let mut notebook = self.clone();
        let cell = notebook
            .cell_map
            .get_mut(id)
            .ok_or_else(|| NotebookError::CellNotFound(id.clone()))?;
        edit(Arc::make_mut(cell));
        Ok(notebook)
    }

    /// Append an output to a code cell.
    pub fn append_output(&self, id: &CellId, output: Output) -> Result<Self> {
        self.update_code_cell(id, |cell| cell.outputs.push(output))
    }

    /// Remove every output from a code cell.
    pub fn clear_outputs(&self, id: &CellId) -> Result<Self> {
        self.update_code_cell(id, |cell| cell.outputs.clear())
    }

    /// Set or clear (`None`) the execution count of a code cell.
    pub fn set_execution_count(&self, id: &CellId, count: Option<i64>) -> Result<Self> {
        self.update_code_cell(id, |cell| cell.execution_count = count)
    }

    fn update_code_cell(&self, id: &CellId, edit: impl FnOnce(&mut CodeCell)) -> Result<Self> {
        match self.cell(id) {
            None => return Err(NotebookError::CellNotFound(id.clone())),
            Some(Cell::Code(_)) => {}
            Some(_) => return Err(NotebookError::NotACodeCell(id.clone())),
        }
        self.update_cell(id, |cell| {
            if let Cell::Code(code) = cell {
                edit(code);
            }
        })
    }

    fn set_deleting(&self, id: &CellId, deleting: bool) -> Result<Self> {
        self.update_cell(id, |cell| {
            cell.metadata_mut()
                .set_in(&DELETING_PATH, Value::Bool(deleting));
        })
    }

    fn position(&self, id: &CellId) -> Option<usize> {
        self.cell_order.iter().position(|existing| existing == id)
    }

    fn detach(&mut self, id: &CellId) {
        if self.cell_map.remove(id).is_some() {
            self.cell_order.retain(|existing| existing != id);
        }
    }

    /// In-place append used while building a notebook from disk.
    pub(crate) fn push_cell(&mut self, id: CellId, cell: Cell) {
        if self.contains(&id) {
            debug!("[commutable] replacing existing cell {}", id);
            self.detach(&id);
        }
        self.cell_order.push(id.clone());
        self.cell_map.insert(id, Arc::new(cell));
    }

    /// Whether `value` looks like a serialized notebook record rather than an
    /// on-disk notebook.
    pub(crate) fn is_record(value: &Value) -> bool {
        value.get(keys::CELL_ORDER).is_some() || value.get(keys::CELL_MAP).is_some()
    }

    /// Rebuild a notebook from its serialized record form.
    pub(crate) fn from_record(value: &Value) -> Result<Self> {
        for key in [keys::CELL_ORDER, keys::CELL_MAP] {
            if value.get(key).is_none() {
                return Err(NotebookError::NotANotebookRecord(format!("missing `{}`", key)));
            }
        }
        if let Some(cells) = value.get(keys::CELL_MAP).and_then(Value::as_object) {
            for cell in cells.values() {
                match cell.get("cell_type").and_then(Value::as_str) {
                    Some("code" | "markdown" | "raw") => {}
                    other => {
                        return Err(NotebookError::UnknownCellType(
                            other.unwrap_or_default().to_string(),
                        ))
                    }
                }
            }
        }

        let notebook = Notebook::deserialize(value)?;

        let unique: HashSet<&CellId> = notebook.cell_order.iter().collect();
        if unique.len() != notebook.cell_order.len() {
            return Err(NotebookError::NotANotebookRecord(
                "`cellOrder` lists a cell more than once".into(),
            ));
        }
        if unique.len() != notebook.cell_map.len()
            || !notebook.cell_map.keys().all(|id| unique.contains(id))
        {
            return Err(NotebookError::NotANotebookRecord(
                "`cellOrder` and `cellMap` disagree".into(),
            ));
        }
        Ok(notebook)
    }
}

/// A v4 notebook holding a single empty code cell.
pub fn monocell_notebook() -> Notebook {
    Notebook::new().append_cell(CodeCell::default(), None)
}
