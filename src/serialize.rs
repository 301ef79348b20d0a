//! Plain, transferable copies of a [`DebugSnapshot`].

use crate::store::{DebugSnapshot, FrameState, VariableRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFrame {
    pub depth: usize,
    pub name: String,
    pub source_file: Option<String>,
    pub line: usize,
    pub token: String,
}

impl From<&FrameState> for SerializedFrame {
    fn from(frame: &FrameState) -> Self {
        Self {
            depth: frame.identity.depth,
            name: frame.identity.name.clone(),
            source_file: frame.source_file.clone(),
            line: frame.line,
            token: frame.token().to_string(),
        }
    }
}

/// The state handed to presentation.
///
/// Maps are ordered so that serializing an unchanged snapshot twice gives identical output.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSnapshot {
    pub stop_reason: Option<String>,
    pub stack_frames: Vec<SerializedFrame>,
    pub frame_variables: BTreeMap<String, BTreeMap<String, VariableRecord>>,
}

impl SerializedSnapshot {
    pub fn variable(&self, token: &str, name: &str) -> Option<&VariableRecord> {
        self.frame_variables.get(token)?.get(name)
    }
}

pub fn serialize(snapshot: &DebugSnapshot) -> SerializedSnapshot {
    let frame_variables = snapshot
        .variables_by_frame()
        .map(|(token, variables)| {
            let variables = variables
                .iter()
                .map(|(name, record)| (name.clone(), record.clone()))
                .collect();
            (token.to_string(), variables)
        })
        .collect();

    SerializedSnapshot {
        stop_reason: snapshot.stop_reason().map(str::to_string),
        stack_frames: snapshot.frames().iter().map(SerializedFrame::from).collect(),
        frame_variables,
    }
}
