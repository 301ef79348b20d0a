//! The part of the Debug Adapter Protocol an observer needs.
//!
//! Only the client side is modeled: requests are serialized, responses and events are
//! deserialized.
//!
//! Specification: [Debug Adapter Protocol](https://microsoft.github.io/debug-adapter-protocol/specification)

use crate::errors::DeserializationError;
use crate::{fromstr_deser, tostr_ser};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt::{self, Display};
use std::str::FromStr;

/// A request sent to the debug adapter.
#[derive(Serialize, Debug, Clone)]
pub struct OutgoingRequest<'a> {
    /// Sequence number of the message. The first message has `seq` 1.
    pub seq: i64,
    /// Always "request".
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Any message received from the debug adapter.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProtocolMessage {
    /// A reverse request such as `runInTerminal`.
    Request(IncomingRequest),
    Response(IncomingResponse),
    Event(IncomingEvent),
}

#[derive(Deserialize, Debug, Clone)]
pub struct IncomingRequest {
    pub seq: i64,
    pub command: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IncomingResponse {
    pub seq: i64,
    /// Sequence number of the corresponding request.
    pub request_seq: i64,
    pub success: bool,
    pub command: String,
    /// The raw error in short form if `success` is false, e.g. `cancelled`.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IncomingEvent {
    pub seq: i64,
    pub event: String,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoppedEventReason {
    Step,
    Breakpoint,
    Exception,
    Pause,
    Entry,
    Goto,
    FunctionBreakpoint,
    DataBreakpoint,
    InstructionBreakpoint,
    String(String),
}

impl FromStr for StoppedEventReason {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(StoppedEventReason::Step),
            "breakpoint" => Ok(StoppedEventReason::Breakpoint),
            "exception" => Ok(StoppedEventReason::Exception),
            "pause" => Ok(StoppedEventReason::Pause),
            "entry" => Ok(StoppedEventReason::Entry),
            "goto" => Ok(StoppedEventReason::Goto),
            "function breakpoint" => Ok(StoppedEventReason::FunctionBreakpoint),
            "data breakpoint" => Ok(StoppedEventReason::DataBreakpoint),
            "instruction breakpoint" => Ok(StoppedEventReason::InstructionBreakpoint),
            other => Ok(StoppedEventReason::String(other.to_string())),
        }
    }
}

impl Display for StoppedEventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match &self {
            StoppedEventReason::Step => "step",
            StoppedEventReason::Breakpoint => "breakpoint",
            StoppedEventReason::Exception => "exception",
            StoppedEventReason::Pause => "pause",
            StoppedEventReason::Entry => "entry",
            StoppedEventReason::Goto => "goto",
            StoppedEventReason::FunctionBreakpoint => "function breakpoint",
            StoppedEventReason::DataBreakpoint => "data breakpoint",
            StoppedEventReason::InstructionBreakpoint => "instruction breakpoint",
            StoppedEventReason::String(other) => other,
        })
    }
}

fromstr_deser! { StoppedEventReason }
tostr_ser! { StoppedEventReason }

/// Body of the `stopped` event.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// The reason for the event.
    /// For backward compatibility this String is shown in the UI if the
    /// `description` attribute is missing (but it must not be translated).
    #[serde(default)]
    pub reason: Option<StoppedEventReason>,
    /// The full reason for the event, e.g. 'Paused on exception'.
    pub description: Option<String>,
    /// The thread which was stopped.
    pub thread_id: Option<i64>,
    pub preserve_focus_hint: Option<bool>,
    /// Additional information. E.g. if reason is `exception`, text contains the
    /// exception name.
    pub text: Option<String>,
    /// If `allThreadsStopped` is true, a debug adapter can announce that all
    /// threads have stopped.
    pub all_threads_stopped: Option<bool>,
}

/// Body of the `exited` event.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    /// The exit code returned from the debuggee.
    pub exit_code: i64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    /// Retrieve the stacktrace for this thread.
    pub thread_id: i64,
    /// The index of the first frame to return, if omitted frames start at 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<usize>,
    /// The maximum number of frames to return. If levels is not specified or 0,
    /// all frames are returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<usize>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    /// Retrieve the scopes for this stackframe.
    pub frame_id: i64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    pub variables_reference: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluateArgumentsContext {
    Variables,
    Watch,
    Repl,
    Hover,
}

impl Display for EvaluateArgumentsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvaluateArgumentsContext::Variables => "variables",
            EvaluateArgumentsContext::Watch => "watch",
            EvaluateArgumentsContext::Repl => "repl",
            EvaluateArgumentsContext::Hover => "hover",
        })
    }
}

tostr_ser! { EvaluateArgumentsContext }

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    pub expression: String,
    /// Evaluate the expression in the scope of this stack frame. If not specified,
    /// the expression is evaluated in the global scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<EvaluateArgumentsContext>,
}

/// A thread.
///
/// Specification: [Thread](https://microsoft.github.io/debug-adapter-protocol/specification#Types_Thread)
#[derive(Deserialize, Debug, Clone)]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ThreadsResponse {
    #[serde(default)]
    pub threads: Vec<Thread>,
}

/// A Source is a descriptor for source code.
///
/// Specification: [Source](https://microsoft.github.io/debug-adapter-protocol/specification#Types_Source)
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Source {
    /// The short name of the source.
    pub name: Option<String>,
    /// The path of the source to be shown in the UI.
    pub path: Option<String>,
}

/// A Stackframe contains the source location.
///
/// Specification: [StackFrame](https://microsoft.github.io/debug-adapter-protocol/specification#Types_StackFrame)
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// An identifier for the stack frame. It is only valid while the thread is stopped.
    pub id: i64,
    /// The name of the stack frame, typically a method name.
    pub name: String,
    pub source: Option<Source>,
    /// If the source attribute is missing, `line` is 0 and should be ignored.
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    #[serde(default)]
    pub stack_frames: Vec<StackFrame>,
    pub total_frames: Option<usize>,
}

/// A Scope is a named container for variables.
///
/// Specification: [Scope](https://microsoft.github.io/debug-adapter-protocol/specification#Types_Scope)
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Name of the scope such as 'Arguments', 'Locals', or 'Registers'.
    pub name: String,
    /// Values: 'arguments', 'locals', 'registers', etc.
    pub presentation_hint: Option<String>,
    /// `0` if the scope has no variables.
    #[serde(default)]
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ScopesResponse {
    #[serde(default)]
    pub scopes: Vec<Scope>,
}

/// A Variable is a name/value pair.
///
/// Adapters don't always follow the specification here, so `name` and `value` are kept as raw
/// JSON and checked by the collector.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default)]
    pub type_field: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct VariablesResponse {
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub result: String,
    #[serde(rename = "type", default)]
    pub type_field: Option<String>,
    #[serde(default)]
    pub variables_reference: i64,
}
