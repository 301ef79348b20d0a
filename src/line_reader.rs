use async_trait::async_trait;
use bytes::BytesMut;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

#[async_trait]
pub trait LineReader {
    /// Read a single line and return it (terminator included). An empty string means the
    /// stream is exhausted.
    async fn read_line(&mut self) -> Result<String, IoError>;

    /// Read exactly `n` bytes and append them into `buffer`
    async fn read_n_bytes(&mut self, buffer: &mut BytesMut, n: usize) -> Result<usize, IoError>;
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineReader for BufReader<R> {
    async fn read_line(&mut self) -> Result<String, IoError> {
        use tokio::io::AsyncBufReadExt;

        let mut bytes = Vec::with_capacity(128);
        self.read_until(b'\n', &mut bytes).await?;
        String::from_utf8(bytes).map_err(|err| IoError::new(IoErrorKind::InvalidData, err))
    }

    /// read an additional `n` bytes from the stream and append them to `buffer`
    async fn read_n_bytes(&mut self, buffer: &mut BytesMut, n: usize) -> Result<usize, IoError> {
        let mut buf = vec![0; n];
        self.read_exact(&mut buf).await?;
        buffer.extend_from_slice(&buf);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    const DAP_STOPPED_EVENT: &str = r#"Content-Length: 112

{"seq":12,"type":"event","event":"stopped","body":{"reason":"breakpoint","threadId":1,"allThreadsStopped":true}}"#;

    use super::*;
    use tokio::fs::File;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_file_reader() -> Result<(), IoError> {
        let path = std::env::temp_dir().join(format!("vardiff-session-{}.txt", std::process::id()));
        {
            // prepare the input file
            let mut file = File::create(&path).await?;
            file.write_all(DAP_STOPPED_EVENT.as_bytes()).await?;
            file.flush().await?;
        }

        let mut reader = BufReader::new(File::open(&path).await?);
        {
            let line = reader.read_line().await?;
            assert_eq!(line, "Content-Length: 112\n");
        }
        {
            let line = reader.read_line().await?;
            assert_eq!(line, "\n");
        }
        {
            // read by length
            let mut buffer = BytesMut::with_capacity(112);
            reader.read_n_bytes(&mut buffer, 112).await?;
            assert_eq!(buffer.len(), 112);
        }
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_streams_read_empty_lines() -> Result<(), IoError> {
        let mut reader = BufReader::new("last\n".as_bytes());
        assert_eq!(reader.read_line().await?, "last\n");
        assert_eq!(reader.read_line().await?, "");
        Ok(())
    }
}
