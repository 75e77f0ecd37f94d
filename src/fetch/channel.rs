use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Invalid live update request. ({0})")]
    Request(String),
    #[error("Could not connect to the live update channel. ({0})")]
    Connect(String),
    #[error("Live update channel failed. ({0})")]
    Transport(String),
}

/// Notification produced by a [`Channel`]. A failed connection reports `Error` followed by `Closed`.
#[derive(Debug, PartialEq)]
pub enum ChannelEvent {
    Opened,
    Message(String),
    Closed,
    Error(ChannelError),
}

/// One WebSocket connection to the live update stream.
///
/// The payloads are forwarded untouched. A closed channel is never reopened,
/// a new one has to be created instead.
pub struct Channel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    token: CancellationToken,
}

impl Channel {
    /// Starts connecting to `url` in the background and returns immediately.
    pub fn open(url: &Url, api_key: &str, connect_timeout: Duration) -> Self {
        let (sender, events) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(run(
            url.clone(),
            api_key.to_owned(),
            connect_timeout,
            sender,
            token.clone(),
        ));
        Self { events, token }
    }

    /// Waits for the next notification. Returns [`None`] once the connection task has finished
    /// and every notification was consumed.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    pub fn close(&self) {
        self.token.cancel();
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_request(url: &Url, api_key: &str) -> Result<Request, ChannelError> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|err| ChannelError::Request(err.to_string()))?;
    let auth_value = HeaderValue::from_str(format!("Bearer {api_key}").as_str())
        .map_err(|_| {
            ChannelError::Request(
                "invalid API key format for the Authorization header".to_owned(),
            )
        })?;
    request.headers_mut().insert(AUTHORIZATION, auth_value);
    Ok(request)
}

async fn run(
    url: Url,
    api_key: String,
    connect_timeout: Duration,
    sender: mpsc::UnboundedSender<ChannelEvent>,
    token: CancellationToken,
) {
    let request = match build_request(&url, &api_key) {
        Ok(request) => request,
        Err(err) => return fail(&sender, err),
    };

    let connect = tokio::time::timeout(connect_timeout, connect_async(request));
    let mut stream = tokio::select! {
        _ = token.cancelled() => return,
        result = connect => match result {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(err)) => return fail(&sender, ChannelError::Connect(err.to_string())),
            Err(_) => {
                let msg = format!("handshake timed out after {}ms", connect_timeout.as_millis());
                return fail(&sender, ChannelError::Connect(msg));
            }
        }
    };
    debug!("Live update channel connected to {url}");
    _ = sender.send(ChannelEvent::Opened);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                _ = stream.send(Message::Close(None)).await;
                debug!("Live update channel to {url} closed by the client");
                return;
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    _ = sender.send(ChannelEvent::Message(text));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        _ = sender.send(ChannelEvent::Message(text));
                    }
                    Err(_) => {
                        let err = ChannelError::Transport(
                            "binary frame is not valid UTF-8".to_owned(),
                        );
                        _ = sender.send(ChannelEvent::Error(err));
                    }
                },
                // The close reply is flushed by the next read, which then ends the stream.
                Some(Ok(Message::Close(frame))) => {
                    debug!("Live update channel received close frame {frame:?}")
                }
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    debug!("Live update channel to {url} closed by the server");
                    _ = sender.send(ChannelEvent::Closed);
                    return;
                }
                Some(Err(err)) => return fail(&sender, ChannelError::Transport(err.to_string())),
            }
        }
    }
}

fn fail(sender: &mpsc::UnboundedSender<ChannelEvent>, err: ChannelError) {
    _ = sender.send(ChannelEvent::Error(err));
    _ = sender.send(ChannelEvent::Closed);
}
