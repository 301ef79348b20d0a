use crate::errors::TransportError;
use crate::line_reader::LineReader;
use crate::protocol::{OutgoingRequest, ProtocolMessage};
use serde_json::Value;
use std::io::{Error as StdIoError, ErrorKind as StdIoErrorKind};
use tokio::io::{AsyncWrite, AsyncWriteExt};

fn escape_crlf(instr: &str) -> String {
    instr.replace('\n', "\\n").replace('\r', "\\r")
}

fn is_blank_line(line: &str) -> bool {
    line == "\r\n" || line == "\n"
}

/// Parses a `Content-Length: N` header line. Other headers aren't used by debug adapters.
fn parse_content_length(line: &str) -> Result<usize, TransportError> {
    let Some((name, value)) = line.trim_end().split_once(':') else {
        return Err(TransportError::HeaderParseError {
            line: line.to_string(),
        });
    };
    if name != "Content-Length" {
        return Err(TransportError::UnknownHeader {
            header: name.to_string(),
        });
    }
    value
        .trim()
        .parse()
        .map_err(|_| TransportError::HeaderParseError {
            line: line.to_string(),
        })
}

/// Reads `Content-Length` framed messages sent by a debug adapter.
pub struct MessageReader<R> {
    input: R,
}

impl<R: LineReader + Send> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Reads the next message and decodes it.
    ///
    /// A message that is framed correctly but doesn't decode is consumed completely, so reading
    /// can continue with the next one after a [`TransportError::ParseError`].
    pub async fn read_message(&mut self) -> Result<ProtocolMessage, TransportError> {
        let content_length = loop {
            let line = self.read_header_line().await?;
            if !is_blank_line(&line) {
                break parse_content_length(&line)?;
            }
        };
        if !is_blank_line(&self.read_header_line().await?) {
            return Err(TransportError::ProtocolError {
                reason: "expected an empty line after the headers".to_string(),
            });
        }

        let mut payload = bytes::BytesMut::with_capacity(content_length);
        self.input
            .read_n_bytes(&mut payload, content_length)
            .await?;
        let payload = String::from_utf8_lossy(&payload);
        tracing::trace!("CONTENT: {}", escape_crlf(&payload));
        Ok(serde_json::from_str(&payload)?)
    }

    async fn read_header_line(&mut self) -> Result<String, TransportError> {
        let line = self.input.read_line().await?;
        tracing::trace!("HEADER: {}", escape_crlf(&line));
        if line.is_empty() {
            return Err(TransportError::IoError(StdIoError::new(
                StdIoErrorKind::BrokenPipe,
                "the debug adapter closed its output",
            )));
        }
        Ok(line)
    }
}

/// Writes requests to a debug adapter, numbering them as it goes.
pub struct MessageWriter<W> {
    output: W,
    last_seq: i64,
}

impl<W: AsyncWrite + Unpin + Send> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            last_seq: 0,
        }
    }

    /// Sends a request and returns its sequence number.
    pub async fn send_request(
        &mut self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<i64, TransportError> {
        self.last_seq += 1;
        let request = OutgoingRequest {
            seq: self.last_seq,
            kind: "request",
            command,
            arguments,
        };
        let json = serde_json::to_string(&request)?;
        tracing::trace!("SEND: {json}");

        self.output
            .write_all(format!("Content-Length: {}\r\n\r\n", json.len()).as_bytes())
            .await?;
        self.output.write_all(json.as_bytes()).await?;
        self.output.flush().await?;
        Ok(self.last_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, BufReader};

    fn frame(json: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", json.len(), json)
    }

    #[tokio::test]
    async fn reads_consecutive_messages() {
        let input = [
            frame(r#"{"seq":1,"type":"event","event":"initialized"}"#),
            frame(r#"{"seq":2,"type":"response","request_seq":1,"success":true,"command":"threads","body":{"threads":[]}}"#),
        ]
        .concat();
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));

        let ProtocolMessage::Event(event) = reader.read_message().await.unwrap() else {
            panic!("expected an event");
        };
        assert_eq!(event.event, "initialized");
        let ProtocolMessage::Response(response) = reader.read_message().await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.command, "threads");

        let error = reader.read_message().await.unwrap_err();
        assert!(error.is_disconnect());
    }

    #[tokio::test]
    async fn continues_after_undecodable_messages() {
        let input = [
            frame(r#"{"seq":1,"type":"gossip"}"#),
            frame(r#"{"seq":2,"type":"event","event":"stopped"}"#),
        ]
        .concat();
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));

        assert!(matches!(
            reader.read_message().await,
            Err(TransportError::ParseError(_))
        ));
        let ProtocolMessage::Event(event) = reader.read_message().await.unwrap() else {
            panic!("expected an event");
        };
        assert_eq!(event.event, "stopped");
    }

    #[tokio::test]
    async fn rejects_unknown_headers() {
        let input = "Content-Type: application/json\r\n\r\n{}";
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));
        assert!(matches!(
            reader.read_message().await,
            Err(TransportError::UnknownHeader { header }) if header == "Content-Type"
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_lengths() {
        let input = "Content-Length: many\r\n\r\n{}";
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));
        assert!(matches!(
            reader.read_message().await,
            Err(TransportError::HeaderParseError { .. })
        ));
    }

    #[tokio::test]
    async fn requires_a_separator() {
        let input = "Content-Length: 2\r\n{}";
        let mut reader = MessageReader::new(BufReader::new(input.as_bytes()));
        assert!(matches!(
            reader.read_message().await,
            Err(TransportError::ProtocolError { .. })
        ));
    }

    #[tokio::test]
    async fn writes_numbered_requests() {
        let (client, mut adapter) = tokio::io::duplex(1024);
        let mut writer = MessageWriter::new(client);
        assert_eq!(writer.send_request("threads", None).await.unwrap(), 1);
        assert_eq!(
            writer
                .send_request("scopes", Some(json!({ "frameId": 7 })))
                .await
                .unwrap(),
            2
        );
        drop(writer);

        let mut written = String::new();
        adapter.read_to_string(&mut written).await.unwrap();
        let first = r#"{"seq":1,"type":"request","command":"threads"}"#;
        let second = r#"{"seq":2,"type":"request","command":"scopes","arguments":{"frameId":7}}"#;
        assert_eq!(written, [frame(first), frame(second)].concat());
    }
}
