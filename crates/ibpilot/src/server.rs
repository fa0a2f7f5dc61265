//! TCP command channel: one task per connection, commands executed in order.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::errors::AutomationError;
use crate::protocol::{format_response, Command, ProtocolError, ResponseKind, MAX_LINE_LEN};
use crate::tasks::{self, EnableApi, InfoSink, TaskContext};

/// Response side of one client connection.
pub struct CommandChannel<W> {
    writer: W,
    prompt: String,
}

impl<W: AsyncWrite + Unpin> CommandChannel<W> {
    pub fn new(writer: W, prompt: impl Into<String>) -> Self {
        Self {
            writer,
            prompt: prompt.into(),
        }
    }

    pub async fn write_info(&mut self, text: &str) -> io::Result<()> {
        self.write_line(ResponseKind::Info, text).await
    }

    pub async fn write_ack(&mut self, text: &str) -> io::Result<()> {
        self.write_line(ResponseKind::Ok, text).await
    }

    pub async fn write_nack(&mut self, text: &str) -> io::Result<()> {
        self.write_line(ResponseKind::Error, text).await
    }

    /// Writes the configured prompt, without a newline. No-op when empty.
    pub async fn write_prompt(&mut self) -> io::Result<()> {
        if self.prompt.is_empty() {
            return Ok(());
        }
        self.writer.write_all(self.prompt.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn write_line(&mut self, kind: ResponseKind, text: &str) -> io::Result<()> {
        let line = format_response(kind, text);
        debug!(response = line.trim_end(), "sending");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await
    }
}

#[derive(Error, Debug)]
enum LineError {
    #[error("line longer than {0} bytes")]
    TooLong(usize),

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Reads one `\n`-terminated line of at most `max` bytes. An over-long line is
/// consumed entirely so the connection stays in sync. `None` means EOF.
async fn read_line_bounded<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max: usize,
) -> Result<Option<String>, LineError> {
    let mut bytes = Vec::new();
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if bytes.is_empty() && !overflow {
                return Ok(None);
            }
            break;
        }

        let newline = available.iter().position(|&b| b == b'\n');
        let take = newline.map(|pos| pos + 1).unwrap_or(available.len());
        if !overflow {
            if bytes.len() + take > max {
                overflow = true;
                bytes.clear();
            } else {
                bytes.extend_from_slice(&available[..take]);
            }
        }
        reader.consume(take);

        if newline.is_some() {
            break;
        }
    }

    if overflow {
        return Err(LineError::TooLong(max));
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| LineError::InvalidUtf8)
}

struct Shared {
    config: ServerConfig,
    ctx: TaskContext,
}

pub struct CommandServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl CommandServer {
    pub async fn bind(config: ServerConfig, ctx: TaskContext) -> io::Result<Self> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "command server listening");
        Ok(Self {
            listener,
            shared: Arc::new(Shared { config, ctx }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            if !self.shared.config.is_peer_allowed(peer.ip()) {
                warn!(%peer, "connection refused: peer not in IbControlFrom");
                drop(stream);
                continue;
            }

            let shared = self.shared.clone();
            let span = info_span!("connection", id = %Uuid::new_v4(), %peer);
            let cancel = shutdown.child_token();
            tokio::spawn(
                async move {
                    info!("client connected");
                    tokio::select! {
                        _ = cancel.cancelled() => debug!("connection cancelled by shutdown"),
                        result = handle_connection(stream, &shared) => match result {
                            Ok(()) => info!("client disconnected"),
                            Err(e) => debug!(error = %e, "connection closed"),
                        },
                    }
                }
                .instrument(span),
            );
        }
        info!("command server stopped");
    }
}

async fn handle_connection(stream: TcpStream, shared: &Shared) -> io::Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut channel = CommandChannel::new(writer, shared.config.prompt.clone());
    channel.write_prompt().await?;

    loop {
        let line = match read_line_bounded(&mut reader, MAX_LINE_LEN).await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(LineError::Io(e)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "rejecting command line");
                channel.write_nack(&ProtocolError::InvalidLine.to_string()).await?;
                channel.write_prompt().await?;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                info!(line = line.trim(), error = %e, "rejected command");
                channel.write_nack(&e.to_string()).await?;
                channel.write_prompt().await?;
                continue;
            }
        };

        if command == Command::Exit {
            channel.write_ack("Goodbye").await?;
            return Ok(());
        }
        execute(command, &mut channel, shared).await?;
        channel.write_prompt().await?;
    }
}

/// Runs one command, streaming its INFO lines, then writes the terminal line.
async fn execute<W: AsyncWrite + Unpin>(
    command: Command,
    channel: &mut CommandChannel<W>,
    shared: &Shared,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = if shared.config.suppress_info {
        InfoSink::disabled()
    } else {
        InfoSink::new(tx)
    };

    info!(%command, "executing command");
    let task = run_command(&command, &shared.ctx, sink);
    tokio::pin!(task);
    let result = loop {
        tokio::select! {
            biased;
            Some(text) = rx.recv() => channel.write_info(&text).await?,
            result = &mut task => break result,
        }
    };
    while let Ok(text) = rx.try_recv() {
        channel.write_info(&text).await?;
    }

    match result {
        Ok(text) => {
            info!(%command, response = %text, "command succeeded");
            channel.write_ack(&text).await
        }
        Err(e) => {
            error!(%command, error = %e, "command failed");
            channel.write_nack(&e.to_string()).await
        }
    }
}

async fn run_command(
    command: &Command,
    ctx: &TaskContext,
    info: InfoSink,
) -> Result<String, AutomationError> {
    match command {
        Command::EnableApi => tasks::run_configuration_action(ctx, &info, EnableApi).await,
        Command::ReconnectAccount => tasks::reconnect_account(ctx, &info)
            .await
            .map(|()| String::new()),
        Command::ReconnectData => tasks::reconnect_data(ctx, &info).await.map(|()| String::new()),
        Command::Stop => tasks::stop(ctx, &info)
            .await
            .map(|()| "Shutting down".to_string()),
        Command::Exit => Ok("Goodbye".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_bounded_splits_lines() {
        let mut reader = BufReader::new(&b"ENABLEAPI\nSTOP\n"[..]);
        assert_eq!(
            read_line_bounded(&mut reader, 64).await.unwrap().as_deref(),
            Some("ENABLEAPI\n")
        );
        assert_eq!(
            read_line_bounded(&mut reader, 64).await.unwrap().as_deref(),
            Some("STOP\n")
        );
        assert!(read_line_bounded(&mut reader, 64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_line_bounded_skips_over_long_line() {
        let mut input = vec![b'A'; 100];
        input.extend_from_slice(b"\nSTOP\n");
        let mut reader = BufReader::with_capacity(16, &input[..]);
        assert!(matches!(
            read_line_bounded(&mut reader, 32).await,
            Err(LineError::TooLong(32))
        ));
        assert_eq!(
            read_line_bounded(&mut reader, 32).await.unwrap().as_deref(),
            Some("STOP\n")
        );
    }

    #[tokio::test]
    async fn test_read_line_bounded_rejects_invalid_utf8() {
        let mut reader = BufReader::new(&b"\xff\xfe\n"[..]);
        assert!(matches!(
            read_line_bounded(&mut reader, 32).await,
            Err(LineError::InvalidUtf8)
        ));
    }

    #[tokio::test]
    async fn test_channel_writes_prompt_without_newline() {
        let mut channel = CommandChannel::new(Vec::new(), "> ");
        channel.write_prompt().await.unwrap();
        channel.write_info("waiting").await.unwrap();
        channel.write_ack("").await.unwrap();
        assert_eq!(String::from_utf8(channel.writer).unwrap(), "> INFO waiting\nOK\n");
    }
}
