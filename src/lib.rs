//! Per-frame diffs of local variable state across the stops of a debug session.
//!
//! A [`DiffSession`] waits for the debuggee to stop, asks a [`SnapshotCollector`] for the stack
//! frames and their locals, and records every value in a [`VariableDiffStore`], which flags the
//! variables whose value changed since the same frame was last seen. Frames are recognized
//! across stops by their depth and name (see [`identity`]). After each stop the state is
//! published to presentation as a [`SerializedSnapshot`].

pub mod client;
pub mod collector;
pub mod config;
pub mod errors;
pub mod identity;
pub mod line_reader;
pub mod logging;

#[doc(hidden)]
mod macros;
pub mod presentation;
pub mod protocol;
pub mod serialize;
pub mod session;
pub mod store;
pub mod transport;

pub use crate::{
    client::{DapClient, DapCollector},
    collector::{RawFrame, RawVariable, SnapshotCollector, StopNotification},
    config::ObserverConfig,
    identity::{FrameIdentity, FrameOrder, FrameToken},
    presentation::{PresentationHandle, SnapshotPublisher},
    serialize::{serialize, SerializedSnapshot},
    session::DiffSession,
    store::{DebugSnapshot, FrameHandle, FrameState, VariableDiffStore, VariableRecord},
};
