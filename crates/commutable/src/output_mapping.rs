//! Mapping from kernel IOPub messages to notebook outputs.
//!
//! Media bundles coming off the wire go through the same normalization as
//! bundles read from disk, so a live output and a saved one compare equal.

use jupyter_protocol::media::Media;
use jupyter_protocol::{
    DisplayData as KernelDisplayData, ErrorOutput as KernelErrorOutput,
    ExecuteResult as KernelExecuteResult, JupyterMessageContent, Stdio, StreamContent,
};
use log::warn;
use serde_json::Value;

use crate::error::Result;
use crate::outputs::{DisplayData, ErrorOutput, ExecuteResult, Output, StreamName, StreamOutput};
use crate::primitives::{create_frozen_media_bundle, CellId, MediaBundle};
use crate::structure::Notebook;

/// A kernel message as it affects a code cell's outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelOutput {
    Output(Output),
    /// Clear the cell's outputs. With `wait` set, the kernel asks for the
    /// clear to be deferred until the next output arrives.
    ClearOutput { wait: bool },
}

/// Returns `None` for messages that do not touch outputs.
pub fn message_to_kernel_output(content: &JupyterMessageContent) -> Option<KernelOutput> {
    match content {
        JupyterMessageContent::StreamContent(stream) => {
            Some(KernelOutput::Output(stream_to_output(stream)))
        }
        JupyterMessageContent::DisplayData(display) => {
            Some(KernelOutput::Output(display_data_to_output(display)))
        }
        JupyterMessageContent::ExecuteResult(result) => {
            Some(KernelOutput::Output(execute_result_to_output(result)))
        }
        JupyterMessageContent::ErrorOutput(error) => {
            Some(KernelOutput::Output(error_to_output(error)))
        }
        JupyterMessageContent::ClearOutput(clear) => {
            Some(KernelOutput::ClearOutput { wait: clear.wait })
        }
        _ => None,
    }
}

pub fn stream_to_output(stream: &StreamContent) -> Output {
    let name = match stream.name {
        Stdio::Stdout => StreamName::Stdout,
        Stdio::Stderr => StreamName::Stderr,
    };
    Output::Stream(StreamOutput::new(name, stream.text.clone()))
}

pub fn display_data_to_output(display: &KernelDisplayData) -> Output {
    Output::DisplayData(DisplayData {
        data: media_to_bundle(&display.data),
        metadata: display.metadata.clone(),
    })
}

pub fn execute_result_to_output(result: &KernelExecuteResult) -> Output {
    Output::ExecuteResult(ExecuteResult {
        execution_count: serde_json::to_value(&result.execution_count)
            .ok()
            .and_then(|count| count.as_i64()),
        data: media_to_bundle(&result.data),
        metadata: result.metadata.clone(),
    })
}

pub fn error_to_output(error: &KernelErrorOutput) -> Output {
    Output::Error(ErrorOutput {
        ename: error.ename.clone(),
        evalue: error.evalue.clone(),
        traceback: error.traceback.clone(),
    })
}

pub fn is_output_message(content: &JupyterMessageContent) -> bool {
    matches!(
        content,
        JupyterMessageContent::StreamContent(_)
            | JupyterMessageContent::DisplayData(_)
            | JupyterMessageContent::ExecuteResult(_)
            | JupyterMessageContent::ErrorOutput(_)
            | JupyterMessageContent::ClearOutput(_)
    )
}

/// Apply a kernel output to the code cell `id`.
///
/// A deferred clear (`wait: true`) is applied immediately; there is no
/// pending-clear state in a [`Notebook`].
pub fn apply_kernel_output(
    notebook: &Notebook,
    id: &CellId,
    output: KernelOutput,
) -> Result<Notebook> {
    match output {
        KernelOutput::Output(output) => notebook.append_output(id, output),
        KernelOutput::ClearOutput { .. } => notebook.clear_outputs(id),
    }
}

fn media_to_bundle(media: &Media) -> MediaBundle {
    match serde_json::to_value(media) {
        Ok(Value::Object(data)) => create_frozen_media_bundle(&data),
        Ok(_) => MediaBundle::default(),
        Err(err) => {
            warn!("[commutable] dropping undecodable media bundle: {}", err);
            MediaBundle::default()
        }
    }
}
