//! Code cell outputs and their conversion to and from the v4 on-disk shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NotebookError, Result};
use crate::primitives::{
    create_frozen_media_bundle, demultiline, media_bundle_to_js, remultiline, MediaBundle,
    MultilineString,
};

/// Output type tags as written in v4 notebooks.
pub mod output_types {
    pub const EXECUTE_RESULT: &str = "execute_result";
    pub const DISPLAY_DATA: &str = "display_data";
    pub const STREAM: &str = "stream";
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    ExecuteResult(ExecuteResult),
    DisplayData(DisplayData),
    Stream(StreamOutput),
    Error(ErrorOutput),
}

impl Output {
    pub fn output_type(&self) -> &'static str {
        match self {
            Output::ExecuteResult(_) => output_types::EXECUTE_RESULT,
            Output::DisplayData(_) => output_types::DISPLAY_DATA,
            Output::Stream(_) => output_types::STREAM,
            Output::Error(_) => output_types::ERROR,
        }
    }
}

/// The value of the last expression in a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// `None` until the cell has been executed.
    pub execution_count: Option<i64>,
    pub data: MediaBundle,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayData {
    pub data: MediaBundle,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    #[default]
    Stdout,
    Stderr,
}

impl StreamName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamName::Stdout => "stdout",
            StreamName::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOutput {
    pub name: StreamName,
    pub text: String,
}

impl StreamOutput {
    pub fn new(name: StreamName, text: impl Into<String>) -> Self {
        Self {
            name,
            text: text.into(),
        }
    }
}

/// A raised exception. `traceback` is a list of independent lines and is
/// never joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorOutput {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

/// An output exactly as it appears in a v4 notebook file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum OnDiskOutput {
    ExecuteResult {
        execution_count: Option<i64>,
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Stream {
        #[serde(default)]
        name: StreamName,
        #[serde(default)]
        text: MultilineString,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Convert a v4 on-disk output into its in-memory form.
///
/// Anything that is not an object with a known `output_type` is rejected
/// rather than skipped.
pub fn create_immutable_output(value: &Value) -> Result<Output> {
    let Some(object) = value.as_object() else {
        return Err(NotebookError::OutputStructureUnknown);
    };

    match object.get("output_type").and_then(Value::as_str) {
        Some(
            output_types::EXECUTE_RESULT
            | output_types::DISPLAY_DATA
            | output_types::STREAM
            | output_types::ERROR,
        ) => {}
        Some(other) => return Err(NotebookError::UnknownOutputType(other.to_string())),
        None => return Err(NotebookError::OutputStructureUnknown),
    }

    let on_disk = OnDiskOutput::deserialize(value)?;
    Ok(Output::from(on_disk))
}

impl From<OnDiskOutput> for Output {
    fn from(output: OnDiskOutput) -> Self {
        match output {
            OnDiskOutput::ExecuteResult {
                execution_count,
                data,
                metadata,
            } => Output::ExecuteResult(ExecuteResult {
                execution_count,
                data: create_frozen_media_bundle(&data),
                metadata,
            }),
            OnDiskOutput::DisplayData { data, metadata } => Output::DisplayData(DisplayData {
                data: create_frozen_media_bundle(&data),
                metadata,
            }),
            OnDiskOutput::Stream { name, text } => Output::Stream(StreamOutput {
                name,
                text: demultiline(&text),
            }),
            OnDiskOutput::Error {
                ename,
                evalue,
                traceback,
            } => Output::Error(ErrorOutput {
                ename,
                evalue,
                traceback,
            }),
        }
    }
}

/// Convert an in-memory output back to the v4 on-disk shape.
pub fn output_to_js(output: &Output) -> OnDiskOutput {
    match output {
        Output::ExecuteResult(result) => OnDiskOutput::ExecuteResult {
            execution_count: result.execution_count,
            data: media_bundle_to_js(&result.data),
            metadata: result.metadata.clone(),
        },
        Output::DisplayData(display) => OnDiskOutput::DisplayData {
            data: media_bundle_to_js(&display.data),
            metadata: display.metadata.clone(),
        },
        Output::Stream(stream) => OnDiskOutput::Stream {
            name: stream.name,
            text: MultilineString::Lines(remultiline(stream.text.as_str())),
        },
        Output::Error(error) => OnDiskOutput::Error {
            ename: error.ename.clone(),
            evalue: error.evalue.clone(),
            traceback: error.traceback.clone(),
        },
    }
}
