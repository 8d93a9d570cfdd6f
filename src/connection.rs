use crate::error::{AvrError, Result};
use crate::protocol::TERMINATOR;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite};

/// The device ends lines with `\r`; some firmware adds `\n` as well
const DELIMITERS: &[u8] = b"\r\n";

/// Longest line accepted from the device. Real status lines are far shorter.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

fn line_codec() -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(
        DELIMITERS.to_vec(),
        TERMINATOR.as_bytes().to_vec(),
        MAX_LINE_LENGTH,
    )
}

/// Receiving half of a line transport
pub struct LineReader<R> {
    inner: FramedRead<R, AnyDelimiterCodec>,
}

/// Sending half of a line transport
pub struct LineWriter<W> {
    inner: FramedWrite<W, AnyDelimiterCodec>,
}

/// Open a TCP connection to the device
///
/// Only the connect itself is bounded by `connect_timeout`; reads wait for as
/// long as the device stays quiet.
pub async fn connect(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<(LineReader<OwnedReadHalf>, LineWriter<OwnedWriteHalf>)> {
    let addr = format!("{}:{}", host, port);
    tracing::info!("Connecting to {}", addr);

    let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(AvrError::Connect { addr, source }),
        Err(_) => {
            return Err(AvrError::Connect {
                addr,
                source: std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer within {:?}", connect_timeout),
                ),
            })
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not disable Nagle on {}: {}", addr, e);
    }

    let (read, write) = stream.into_split();
    Ok(split(read, write))
}

/// Wrap an already established byte stream
pub fn split<R, W>(read: R, write: W) -> (LineReader<R>, LineWriter<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (
        LineReader {
            inner: FramedRead::new(read, line_codec()),
        },
        LineWriter {
            inner: FramedWrite::new(write, line_codec()),
        },
    )
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wait for the next non-empty line
    ///
    /// Returns `ConnectionLost` once the peer closes or the socket fails.
    pub async fn receive_line(&mut self) -> Result<String> {
        loop {
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&chunk).into_owned();
                    tracing::debug!("Received: {}", line);
                    return Ok(line);
                }
                Some(Err(e)) => {
                    tracing::warn!("Read error: {}", e);
                    return Err(AvrError::ConnectionLost);
                }
                None => {
                    tracing::info!("Connection closed by peer");
                    return Err(AvrError::ConnectionLost);
                }
            }
        }
    }
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Write one line followed by the terminator
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        tracing::debug!("Sending: {}", line);
        self.inner
            .send(line)
            .await
            .map_err(|_| AvrError::ConnectionLost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_partial_lines_are_buffered() {
        let (device, client) = duplex(256);
        let (client_read, client_write) = tokio::io::split(client);
        let (mut reader, _writer) = split(client_read, client_write);
        let (_device_read, mut device_write) = tokio::io::split(device);

        device_write.write_all(b"PW").await.unwrap();
        device_write.write_all(b"ON\rMV5").await.unwrap();
        device_write.write_all(b"0\r\n").await.unwrap();

        assert_eq!(reader.receive_line().await.unwrap(), "PWON");
        assert_eq!(reader.receive_line().await.unwrap(), "MV50");
    }

    #[tokio::test]
    async fn test_closed_peer_is_connection_lost() {
        let (device, client) = duplex(256);
        let (client_read, client_write) = tokio::io::split(client);
        let (mut reader, _writer) = split(client_read, client_write);
        drop(device);

        let err = reader.receive_line().await.unwrap_err();
        assert!(matches!(err, AvrError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_unterminated_flood_is_connection_lost() {
        let (device, client) = duplex(4 * MAX_LINE_LENGTH);
        let (client_read, client_write) = tokio::io::split(client);
        let (mut reader, _writer) = split(client_read, client_write);
        let (_device_read, mut device_write) = tokio::io::split(device);

        device_write
            .write_all(&vec![b'A'; MAX_LINE_LENGTH + 1])
            .await
            .unwrap();

        let err = reader.receive_line().await.unwrap_err();
        assert!(matches!(err, AvrError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_send_line_appends_terminator() {
        let (device, client) = duplex(256);
        let (client_read, client_write) = tokio::io::split(client);
        let (_reader, mut writer) = split(client_read, client_write);
        let (mut device_read, _device_write) = tokio::io::split(device);

        writer.send_line("MV50").await.unwrap();

        let mut buf = [0u8; 5];
        device_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"MV50\r");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AvrError::Connect { .. })));
    }
}
