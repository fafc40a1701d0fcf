// WebSocket server: one task per client, one response frame per request.

use std::fmt::Display;
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::app;
use crate::state::AppState;

/// Accept clients on `listener` until the task is cancelled.
///
/// Each connection gets its own task. Requests on one connection are handled
/// in arrival order; connections proceed independently.
pub async fn run(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr = addr.to_string();
        info!("Accepted TCP connection from {addr}");

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };
            let (write, read) = ws_stream.split();
            serve_connection(read, write, &state, &addr).await;
            info!("Client {addr} disconnected");
        });
    }
}

/// Answer every text frame from `stream` on `sink` until the client closes,
/// the stream errors, or a response can't be delivered.
///
/// Generic over the stream and sink so it can be driven by in-memory
/// messages in tests.
pub async fn serve_connection<St, Si>(mut stream: St, mut sink: Si, state: &AppState, addr: &str)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let response = app::handle_frame(state, text.as_str()).await;
                let encoded = match serde_json::to_string(&response) {
                    Ok(encoded) => encoded,
                    Err(e) => {
                        warn!("Failed to encode response for {addr}: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(encoded.into())).await {
                    warn!("Failed to send response to {addr}: {e}");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            Ok(other) => {
                // Binary, Ping, Pong and raw frames carry no requests.
                debug!("Ignoring non-text frame from {addr}: {} bytes", other.len());
            }
        }
    }
}
