//! The bridge loop: one JSON command per stdin line, one or more JSON
//! lines on stdout in response.

use std::io;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use pchat::ChatSession;

use crate::protocol::{BridgeCommand, CommandOutcome, StreamEvent};

/// Runs the command loop until the input side closes. A malformed or
/// failed line is answered on the output side and the loop keeps going;
/// only I/O failure on the bridge's own pipes ends it early.
pub async fn run<R, W>(session: &mut ChatSession, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<BridgeCommand>(line) {
            Ok(command) => {
                debug!(?command, "dispatching command");
                dispatch(session, command, &mut output).await?;
            }
            Err(error) => {
                warn!(%error, "discarding malformed input line");
                let outcome = CommandOutcome::failure(format!("invalid command: {error}"));
                write_line(&mut output, &outcome).await?;
            }
        }
    }
    Ok(())
}

async fn dispatch<W>(
    session: &mut ChatSession,
    command: BridgeCommand,
    output: &mut W,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match command {
        BridgeCommand::Chat { message } => {
            let outcome = match session.generate(Some(message)).await {
                Ok(response) => CommandOutcome::reply(response),
                Err(error) => CommandOutcome::failure(error.to_string()),
            };
            write_line(output, &outcome).await
        }
        BridgeCommand::StreamChat { message } => stream_chat(session, message, output).await,
        BridgeCommand::Reset => {
            session.clear_history(true);
            write_line(output, &CommandOutcome::notice("history cleared")).await
        }
        BridgeCommand::History => {
            write_line(output, &CommandOutcome::history(session.history())).await
        }
    }
}

/// Streams one turn as chunk lines, each flushed as it arrives so the
/// supervising process renders incrementally. Ends with exactly one
/// `done` or `error` line.
async fn stream_chat<W>(session: &mut ChatSession, message: String, output: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = match session.stream(Some(message)) {
        Ok(stream) => stream,
        Err(error) => {
            return write_line(
                output,
                &StreamEvent::Error {
                    error: error.to_string(),
                },
            )
            .await;
        }
    };

    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => write_line(output, &StreamEvent::Chunk { text }).await?,
            Err(error) => {
                return write_line(
                    output,
                    &StreamEvent::Error {
                        error: error.to_string(),
                    },
                )
                .await;
            }
        }
    }

    write_line(output, &StreamEvent::Done).await
}

async fn write_line<W, T>(output: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value).map_err(io::Error::other)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    output.flush().await
}
