//! Minimal command-channel client.

use std::time::Duration;

use anyhow::{bail, Context};
use ibpilot::protocol::{parse_response, ResponseKind};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Sends `line` and collects responses up to and including the terminal one.
pub async fn send(
    host: &str,
    port: u16,
    line: &str,
    prompt: &str,
    timeout: Duration,
) -> anyhow::Result<Vec<(ResponseKind, String)>> {
    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("cannot connect to {host}:{port}"))?;
    info!(%host, port, command = line, "connected");

    let (reader, mut writer) = stream.into_split();
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    tokio::time::timeout(timeout, read_responses(&mut reader, prompt))
        .await
        .with_context(|| format!("no response within {}s", timeout.as_secs()))?
}

async fn read_responses<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    prompt: &str,
) -> anyhow::Result<Vec<(ResponseKind, String)>> {
    let mut responses = Vec::new();
    let mut raw = String::new();
    loop {
        raw.clear();
        if reader.read_line(&mut raw).await? == 0 {
            bail!("connection closed before a terminal response");
        }
        let text = strip_prompt(&raw, prompt);
        debug!(line = text.trim_end(), "received");
        let Some((kind, body)) = parse_response(text) else {
            bail!("unexpected response line: {}", text.trim_end());
        };
        responses.push((kind, body.to_string()));
        if kind.is_terminal() {
            return Ok(responses);
        }
    }
}

/// Prompts are written without a newline, so they lead the next response line.
fn strip_prompt<'a>(line: &'a str, prompt: &str) -> &'a str {
    let mut rest = line;
    if !prompt.is_empty() {
        while let Some(stripped) = rest.strip_prefix(prompt) {
            rest = stripped;
        }
    }
    rest
}
