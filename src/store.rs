//! The diff engine.

use crate::{
    errors::EngineError,
    identity::{disambiguate, FrameIdentity, FrameToken},
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// The last two observed values of one variable in one frame.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableRecord {
    pub name: String,
    /// `None` on the first observation of this variable in this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub current: String,
    /// `true` iff there was a previous observation and it differs from `current`.
    pub changed: bool,
}

impl VariableRecord {
    /// Whether this is the first value seen for the variable, as opposed to an unchanged one.
    pub fn is_initial(&self) -> bool {
        self.previous.is_none()
    }
}

/// Collaborator-supplied reference to a frame, e.g. the DAP frame id.
///
/// It is only valid while the debuggee stays stopped and is never used for identity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FrameHandle(pub i64);

#[derive(Clone, Debug)]
pub struct FrameState {
    pub identity: FrameIdentity,
    pub source_file: Option<String>,
    pub line: usize,
    pub raw_handle: FrameHandle,
}

impl FrameState {
    pub fn token(&self) -> FrameToken {
        self.identity.token()
    }
}

type FrameVariables = FxHashMap<String, VariableRecord>;

/// Everything known about the current stop.
///
/// Only the [`VariableDiffStore`] can modify it; everyone else gets shared references.
#[derive(Debug, Default)]
pub struct DebugSnapshot {
    stop_reason: Option<String>,
    frames: Vec<FrameState>,
    variables_by_frame: FxHashMap<FrameToken, FrameVariables>,
}

impl DebugSnapshot {
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub fn frames(&self) -> &[FrameState] {
        &self.frames
    }

    pub fn variables(&self, token: &FrameToken) -> Option<&FxHashMap<String, VariableRecord>> {
        self.variables_by_frame.get(token)
    }

    pub fn variable(&self, token: &FrameToken, name: &str) -> Option<&VariableRecord> {
        self.variables(token)?.get(name)
    }

    pub fn variables_by_frame(
        &self,
    ) -> impl Iterator<Item = (&FrameToken, &FxHashMap<String, VariableRecord>)> {
        self.variables_by_frame.iter()
    }

    /// Number of (frame, variable) pairs with a history.
    pub fn tracked_variable_count(&self) -> usize {
        self.variables_by_frame.values().map(|it| it.len()).sum()
    }
}

/// Computes per-frame, per-variable change flags across stops.
#[derive(Debug, Default)]
pub struct VariableDiffStore {
    snapshot: DebugSnapshot,
}

impl VariableDiffStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` as the newest value of `name` in the given frame and returns the updated
    /// record.
    ///
    /// Recording the same value twice yields `changed == false` the second time.
    pub fn record_variable(
        &mut self,
        identity: &FrameIdentity,
        name: &str,
        value: &str,
    ) -> Result<VariableRecord, EngineError> {
        if name.is_empty() {
            error!("Rejected a variable without a name in frame {identity}.");
            return Err(EngineError::EmptyVariableName {
                frame: identity.token().to_string(),
            });
        }

        let variables = self
            .snapshot
            .variables_by_frame
            .entry(identity.token())
            .or_default();
        let previous = variables.get(name).map(|it| it.current.clone());
        let changed = previous.as_deref().map_or(false, |it| it != value);
        let record = VariableRecord {
            name: name.to_string(),
            previous,
            current: value.to_string(),
            changed,
        };
        variables.insert(name.to_string(), record.clone());
        Ok(record)
    }

    /// Replaces the tracked frames and forgets the history of every frame that is gone.
    ///
    /// A frame that reappears later starts over without a previous value.
    pub fn replace_frames(&mut self, frames: Vec<FrameState>) {
        let identities = disambiguate(frames.iter().map(|it| it.identity.clone()).collect());
        let frames: Vec<FrameState> = frames
            .into_iter()
            .zip(identities)
            .map(|(frame, identity)| FrameState { identity, ..frame })
            .collect();

        let live: FxHashSet<FrameToken> = frames.iter().map(FrameState::token).collect();
        self.snapshot.variables_by_frame.retain(|token, _| {
            let keep = live.contains(token);
            if !keep {
                debug!("Evicting the variables of frame {token}.");
            }
            keep
        });
        self.snapshot.frames = frames;
    }

    pub fn set_stop_reason(&mut self, reason: Option<String>) {
        self.snapshot.stop_reason = reason;
    }

    pub fn snapshot(&self) -> &DebugSnapshot {
        &self.snapshot
    }

    /// Forgets all variable histories but keeps the frames.
    pub fn clear_variables(&mut self) {
        self.snapshot.variables_by_frame.clear();
    }

    /// Drops the frames and sets the stop reason.
    ///
    /// Variable histories are kept; use [`clear_variables`](Self::clear_variables) for those.
    pub fn reset(&mut self, stop_reason: Option<String>) {
        self.snapshot.frames.clear();
        self.snapshot.stop_reason = stop_reason;
    }
}
