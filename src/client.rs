//! Collecting stop snapshots from a debug adapter.

use crate::{
    collector::{RawFrame, RawVariable, SnapshotCollector, StopNotification},
    config::ObserverConfig,
    errors::{CollectError, TransportError},
    line_reader::LineReader,
    protocol::{
        EvaluateArguments, EvaluateArgumentsContext, EvaluateResponse, ExitedEventBody,
        IncomingEvent, ProtocolMessage, Scope, ScopesArguments, ScopesResponse,
        StackTraceArguments, StackTraceResponse, StoppedEventBody, ThreadsResponse, Variable,
        VariablesArguments, VariablesResponse,
    },
    store::FrameHandle,
    transport::{MessageReader, MessageWriter},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::io::AsyncWrite;
use tracing::{debug, info, trace, warn};

/// Request/response plumbing on top of a DAP connection.
///
/// Events that arrive while waiting for a response are queued and handed out by
/// [`next_event`](Self::next_event) in arrival order.
pub struct DapClient<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    pending_events: VecDeque<IncomingEvent>,
}

impl<R, W> DapClient<R, W>
where
    R: LineReader + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            reader: MessageReader::new(input),
            writer: MessageWriter::new(output),
            pending_events: VecDeque::new(),
        }
    }

    pub async fn request<A, B>(
        &mut self,
        command: &str,
        arguments: Option<A>,
    ) -> Result<B, CollectError>
    where
        A: Serialize + Send,
        B: DeserializeOwned,
    {
        let arguments = arguments
            .map(serde_json::to_value)
            .transpose()
            .map_err(|source| CollectError::InvalidBody {
                command: command.to_string(),
                source,
            })?;
        let seq = self.writer.send_request(command, arguments).await?;
        debug!("Sent request {seq}: {command}");

        loop {
            match self.reader.read_message().await? {
                ProtocolMessage::Response(response) if response.request_seq == seq => {
                    if !response.success {
                        return Err(CollectError::RequestFailed {
                            command: command.to_string(),
                            message: response.message.unwrap_or_default(),
                        });
                    }
                    let body = response
                        .body
                        .unwrap_or_else(|| Value::Object(Default::default()));
                    return serde_json::from_value(body).map_err(|source| {
                        CollectError::InvalidBody {
                            command: command.to_string(),
                            source,
                        }
                    });
                }
                ProtocolMessage::Response(response) => {
                    warn!(
                        "Ignoring response to request {} ({}) while waiting for {seq}.",
                        response.request_seq, response.command,
                    );
                }
                ProtocolMessage::Event(event) => {
                    trace!("Queueing event {} while waiting for {seq}.", event.event);
                    self.pending_events.push_back(event);
                }
                ProtocolMessage::Request(request) => {
                    debug!("Ignoring reverse request {}.", request.command);
                }
            }
        }
    }

    /// Returns the next event, reading from the adapter if none is queued.
    pub async fn next_event(&mut self) -> Result<IncomingEvent, TransportError> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(event);
        }
        loop {
            match self.reader.read_message().await? {
                ProtocolMessage::Event(event) => return Ok(event),
                ProtocolMessage::Response(response) => {
                    warn!(
                        "Ignoring unexpected response to request {} ({}).",
                        response.request_seq, response.command,
                    );
                }
                ProtocolMessage::Request(request) => {
                    debug!("Ignoring reverse request {}.", request.command);
                }
            }
        }
    }
}

/// A [`SnapshotCollector`] that asks a debug adapter for threads, stack traces, scopes and
/// variables.
pub struct DapCollector<R, W> {
    client: DapClient<R, W>,
    config: ObserverConfig,
    /// The thread that stopped most recently.
    stopped_thread: Option<i64>,
}

impl<R, W> DapCollector<R, W>
where
    R: LineReader + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(client: DapClient<R, W>, config: ObserverConfig) -> Self {
        Self {
            client,
            config,
            stopped_thread: None,
        }
    }

    pub fn client_mut(&mut self) -> &mut DapClient<R, W> {
        &mut self.client
    }

    async fn thread_of_interest(&mut self) -> Result<i64, CollectError> {
        if let Some(thread_id) = self.config.thread_id.or(self.stopped_thread) {
            return Ok(thread_id);
        }
        let response: ThreadsResponse = self.client.request("threads", None::<()>).await?;
        let thread = response.threads.first().ok_or(CollectError::NoThread)?;
        debug!("Inspecting the first thread, {} ({}).", thread.name, thread.id);
        Ok(thread.id)
    }

    fn locals_scope<'s>(&self, scopes: &'s [Scope]) -> Option<&'s Scope> {
        let hint = self.config.locals_scope_hint.to_lowercase();
        scopes
            .iter()
            .find(|it| it.name.to_lowercase().contains(&hint))
            .or_else(|| {
                scopes
                    .iter()
                    .find(|it| it.presentation_hint.as_deref() == Some("locals"))
            })
            .or_else(|| scopes.first())
    }

    fn to_raw_variable(&self, variable: Variable) -> Option<RawVariable> {
        let name = match variable.name {
            Value::String(name) if !name.is_empty() => name,
            other => {
                debug!("Dropping a variable with an invalid name: {other}");
                return None;
            }
        };
        let value = match variable.value {
            Value::String(value) => value,
            Value::Null => self.config.missing_value_placeholder.clone(),
            other => other.to_string(),
        };
        Some(RawVariable { name, value })
    }
}

#[async_trait]
impl<R, W> SnapshotCollector for DapCollector<R, W>
where
    R: LineReader + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_stop(&mut self) -> Result<Option<StopNotification>, CollectError> {
        loop {
            let event = match self.client.next_event().await {
                Ok(event) => event,
                Err(err) if err.is_disconnect() => {
                    info!("The debug adapter closed the connection.");
                    return Ok(None);
                }
                Err(TransportError::ParseError(err)) => {
                    warn!("Skipping a message that isn't valid DAP: {err}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let body = event.body.unwrap_or(Value::Null);
            match event.event.as_str() {
                "stopped" => {
                    let stop = match StoppedEventBody::deserialize(&body) {
                        Ok(body) => StopNotification {
                            reason: body.reason.map(|it| it.to_string()),
                            thread_id: body.thread_id,
                        },
                        Err(err) => {
                            warn!("Malformed stopped event ({err}), collecting it anyway.");
                            StopNotification {
                                reason: None,
                                thread_id: body.get("threadId").and_then(Value::as_i64),
                            }
                        }
                    };
                    if stop.thread_id.is_some() {
                        self.stopped_thread = stop.thread_id;
                    }
                    return Ok(Some(stop));
                }
                "exited" => match serde_json::from_value::<ExitedEventBody>(body) {
                    Ok(body) => info!("The debuggee exited with code {}.", body.exit_code),
                    Err(_) => info!("The debuggee exited."),
                },
                "terminated" => return Ok(None),
                other => trace!("Skipping event {other}."),
            }
        }
    }

    async fn stack_frames(&mut self) -> Result<Vec<RawFrame>, CollectError> {
        let thread_id = self.thread_of_interest().await?;
        let response: StackTraceResponse = self
            .client
            .request(
                "stackTrace",
                Some(StackTraceArguments {
                    thread_id,
                    start_frame: Some(0),
                    levels: self.config.stack_levels(),
                }),
            )
            .await?;
        Ok(response
            .stack_frames
            .into_iter()
            .map(|frame| RawFrame {
                name: frame.name,
                source_file: frame.source.and_then(|it| it.path),
                line: frame.line,
                handle: FrameHandle(frame.id),
            })
            .collect())
    }

    async fn locals(&mut self, frame: &RawFrame) -> Result<Vec<RawVariable>, CollectError> {
        let response: ScopesResponse = self
            .client
            .request(
                "scopes",
                Some(ScopesArguments {
                    frame_id: frame.handle.0,
                }),
            )
            .await?;
        let Some(scope) = self.locals_scope(&response.scopes) else {
            return Ok(vec![]);
        };
        if scope.variables_reference == 0 {
            return Ok(vec![]);
        }

        let variables_reference = scope.variables_reference;
        let response: VariablesResponse = self
            .client
            .request(
                "variables",
                Some(VariablesArguments {
                    variables_reference,
                }),
            )
            .await?;
        Ok(response
            .variables
            .into_iter()
            .filter_map(|it| self.to_raw_variable(it))
            .collect())
    }

    async fn evaluate(
        &mut self,
        frame: &RawFrame,
        expression: &str,
    ) -> Result<String, CollectError> {
        let response: EvaluateResponse = self
            .client
            .request(
                "evaluate",
                Some(EvaluateArguments {
                    expression: expression.to_string(),
                    frame_id: Some(frame.handle.0),
                    context: Some(EvaluateArgumentsContext::Watch),
                }),
            )
            .await?;
        Ok(response.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};

    type TestCollector = DapCollector<BufReader<ReadHalf<DuplexStream>>, WriteHalf<DuplexStream>>;

    /// Reads requests from the collector and answers each with the next scripted body.
    ///
    /// Events in the script are sent without waiting for a request.
    async fn fake_adapter(stream: DuplexStream, script: Vec<Value>) -> Vec<Value> {
        let (read, mut write) = tokio::io::split(stream);
        let mut reader = BufReader::new(read);
        let mut seq = 0;
        let mut requests = vec![];
        for message in script {
            seq += 1;
            let mut message = message;
            if message["type"] == "event" {
                message["seq"] = json!(seq);
            } else {
                let request = read_request(&mut reader).await;
                message["seq"] = json!(seq);
                message["type"] = json!("response");
                message["request_seq"] = request["seq"].clone();
                message["command"] = request["command"].clone();
                if message.get("success").is_none() {
                    message["success"] = json!(true);
                }
                requests.push(request);
            }
            write_message(&mut write, &message).await;
        }
        requests
    }

    async fn read_request(reader: &mut BufReader<ReadHalf<DuplexStream>>) -> Value {
        let header = LineReader::read_line(reader).await.unwrap();
        let length: usize = header
            .trim_end()
            .strip_prefix("Content-Length: ")
            .unwrap()
            .parse()
            .unwrap();
        LineReader::read_line(reader).await.unwrap();
        let mut body = bytes::BytesMut::new();
        reader.read_n_bytes(&mut body, length).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn write_message(write: &mut WriteHalf<DuplexStream>, message: &Value) {
        use tokio::io::AsyncWriteExt;
        let json = message.to_string();
        write
            .write_all(format!("Content-Length: {}\r\n\r\n{json}", json.len()).as_bytes())
            .await
            .unwrap();
    }

    fn collector(config: ObserverConfig) -> (TestCollector, DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (read, write) = tokio::io::split(ours);
        let client = DapClient::new(BufReader::new(read), write);
        (DapCollector::new(client, config), theirs)
    }

    #[tokio::test]
    async fn stops_come_from_stopped_events() {
        let (mut collector, adapter) = collector(ObserverConfig::default());
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![
                json!({ "type": "event", "event": "output", "body": { "output": "hi" } }),
                json!({ "type": "event", "event": "stopped", "body": { "reason": "breakpoint", "threadId": 3 } }),
                json!({ "type": "event", "event": "exited", "body": { "exitCode": 0 } }),
                json!({ "type": "event", "event": "terminated" }),
            ],
        ));

        assert_eq!(
            collector.next_stop().await.unwrap(),
            Some(StopNotification {
                reason: Some("breakpoint".to_string()),
                thread_id: Some(3),
            })
        );
        assert_eq!(collector.next_stop().await.unwrap(), None);
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_stops_are_still_collected() {
        let (mut collector, adapter) = collector(ObserverConfig::default());
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![
                json!({ "type": "event", "event": "stopped", "body": { "threadId": 1 } }),
                json!({ "type": "event", "event": "stopped", "body": { "reason": 7, "threadId": 2 } }),
                json!({ "type": "event", "event": "stopped", "body": { "reason": "step", "threadId": 1 } }),
            ],
        ));

        assert_eq!(
            collector.next_stop().await.unwrap(),
            Some(StopNotification {
                reason: None,
                thread_id: Some(1),
            })
        );
        assert_eq!(
            collector.next_stop().await.unwrap(),
            Some(StopNotification {
                reason: None,
                thread_id: Some(2),
            })
        );
        assert_eq!(
            collector.next_stop().await.unwrap(),
            Some(StopNotification {
                reason: Some("step".to_string()),
                thread_id: Some(1),
            })
        );
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_messages_are_skipped() {
        let (mut collector, adapter) = collector(ObserverConfig::default());
        let (_, mut write) = tokio::io::split(adapter);
        write_message(&mut write, &json!({ "seq": 1, "type": "gossip" })).await;
        write_message(
            &mut write,
            &json!({ "seq": 2, "type": "event", "event": "stopped", "body": { "reason": "pause" } }),
        )
        .await;

        let stop = collector.next_stop().await.unwrap().unwrap();
        assert_eq!(stop.reason.as_deref(), Some("pause"));
    }

    #[tokio::test]
    async fn closed_connections_end_the_session() {
        let (mut collector, adapter) = collector(ObserverConfig::default());
        drop(adapter);
        assert_eq!(collector.next_stop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn frames_come_from_the_first_thread_by_default() {
        let config = ObserverConfig {
            max_frames: Some(20),
            ..Default::default()
        };
        let (mut collector, adapter) = collector(config);
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![
                json!({ "body": { "threads": [{ "id": 7, "name": "main" }, { "id": 8, "name": "worker" }] } }),
                json!({ "body": { "stackFrames": [
                    { "id": 1000, "name": "foo", "line": 12, "column": 1, "source": { "path": "/src/foo.c" } },
                    { "id": 1001, "name": "main", "line": 30, "column": 1 }
                ] } }),
            ],
        ));

        let frames = collector.stack_frames().await.unwrap();
        assert_eq!(
            frames,
            vec![
                RawFrame {
                    name: "foo".to_string(),
                    source_file: Some("/src/foo.c".to_string()),
                    line: 12,
                    handle: FrameHandle(1000),
                },
                RawFrame {
                    name: "main".to_string(),
                    source_file: None,
                    line: 30,
                    handle: FrameHandle(1001),
                },
            ]
        );

        let requests = adapter.await.unwrap();
        assert_eq!(requests[0]["command"], "threads");
        assert_eq!(
            requests[1]["arguments"],
            json!({ "threadId": 7, "startFrame": 0, "levels": 20 })
        );
    }

    #[tokio::test]
    async fn failed_requests_are_reported() {
        let config = ObserverConfig {
            thread_id: Some(1),
            ..Default::default()
        };
        let (mut collector, adapter) = collector(config);
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![json!({ "success": false, "message": "notStopped" })],
        ));

        let error = collector.stack_frames().await.unwrap_err();
        assert!(matches!(
            error,
            CollectError::RequestFailed { command, message }
                if command == "stackTrace" && message == "notStopped"
        ));
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn locals_are_filtered_and_coerced() {
        let config = ObserverConfig {
            missing_value_placeholder: "<none>".to_string(),
            ..Default::default()
        };
        let (mut collector, adapter) = collector(config);
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![
                json!({ "body": { "scopes": [
                    { "name": "Registers", "variablesReference": 5, "expensive": false },
                    { "name": "Locals", "variablesReference": 6, "expensive": false }
                ] } }),
                json!({ "body": { "variables": [
                    { "name": "count", "value": "3", "variablesReference": 0 },
                    { "name": "", "value": "1", "variablesReference": 0 },
                    { "name": 17, "value": "1", "variablesReference": 0 },
                    { "name": "flag", "value": true, "variablesReference": 0 },
                    { "name": "ptr", "variablesReference": 0 }
                ] } }),
            ],
        ));

        let frame = RawFrame {
            name: "main".to_string(),
            source_file: None,
            line: 1,
            handle: FrameHandle(1000),
        };
        let locals = collector.locals(&frame).await.unwrap();
        assert_eq!(
            locals,
            vec![
                RawVariable::new("count", "3"),
                RawVariable::new("flag", "true"),
                RawVariable::new("ptr", "<none>"),
            ]
        );

        let requests = adapter.await.unwrap();
        assert_eq!(requests[0]["arguments"], json!({ "frameId": 1000 }));
        assert_eq!(requests[1]["arguments"], json!({ "variablesReference": 6 }));
    }

    #[tokio::test]
    async fn scopes_without_variables_yield_no_locals() {
        let (mut collector, adapter) = collector(ObserverConfig::default());
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![json!({ "body": { "scopes": [
                { "name": "Locals", "variablesReference": 0, "expensive": false }
            ] } })],
        ));

        let frame = RawFrame {
            name: "main".to_string(),
            source_file: None,
            line: 1,
            handle: FrameHandle(1),
        };
        assert!(collector.locals(&frame).await.unwrap().is_empty());
        adapter.await.unwrap();
    }

    #[tokio::test]
    async fn events_during_requests_are_not_lost() {
        let config = ObserverConfig {
            thread_id: Some(1),
            ..Default::default()
        };
        let (mut collector, adapter) = collector(config);
        let adapter = tokio::spawn(fake_adapter(
            adapter,
            vec![
                json!({ "type": "event", "event": "stopped", "body": { "reason": "step", "threadId": 1 } }),
                json!({ "body": { "stackFrames": [] } }),
            ],
        ));

        assert!(collector.stack_frames().await.unwrap().is_empty());
        let stop = collector.next_stop().await.unwrap().unwrap();
        assert_eq!(stop.reason.as_deref(), Some("step"));
        adapter.await.unwrap();
    }
}
