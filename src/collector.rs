use crate::{errors::CollectError, identity::FrameOrder, store::FrameHandle};
use async_trait::async_trait;

/// The debuggee halted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StopNotification {
    /// E.g. `breakpoint`, `step` or `exception`.
    pub reason: Option<String>,
    pub thread_id: Option<i64>,
}

/// A stack frame as reported by the debugger.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawFrame {
    pub name: String,
    pub source_file: Option<String>,
    pub line: usize,
    pub handle: FrameHandle,
}

/// A local variable with a non-empty name and a value already rendered as text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawVariable {
    pub name: String,
    pub value: String,
}

impl RawVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Source of stop events and of the state of the stopped program.
///
/// A [`DiffSession`](crate::session::DiffSession) calls these strictly one after another: it
/// awaits a stop, asks for the frames, then for the locals of each frame, and only then waits
/// for the next stop. Implementations are responsible for dropping malformed variables.
#[async_trait]
pub trait SnapshotCollector: Send {
    /// Waits for the next stop. `None` means the debug session is over.
    async fn next_stop(&mut self) -> Result<Option<StopNotification>, CollectError>;

    /// The order in which [`stack_frames`](Self::stack_frames) lists frames. DAP adapters
    /// report the executing frame first.
    fn frame_order(&self) -> FrameOrder {
        FrameOrder::InnermostFirst
    }

    /// The frames of the thread of interest, in [`frame_order`](Self::frame_order).
    async fn stack_frames(&mut self) -> Result<Vec<RawFrame>, CollectError>;

    async fn locals(&mut self, frame: &RawFrame) -> Result<Vec<RawVariable>, CollectError>;

    /// Evaluates a watch expression in `frame` and returns the result text.
    async fn evaluate(
        &mut self,
        _frame: &RawFrame,
        _expression: &str,
    ) -> Result<String, CollectError> {
        Err(CollectError::Unsupported {
            operation: "evaluate",
        })
    }
}
