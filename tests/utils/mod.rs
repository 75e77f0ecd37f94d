use futures_util::{SinkExt, StreamExt};
use log::kv::Key;
use log::{set_max_level, Level, Log, Metadata, Record};
use mockito::{Mock, ServerGuard};
use rand::distr::{Alphanumeric, SampleString};
use std::cell::RefCell;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::Receiver;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use flagsync::{ChannelState, Client, ClientBuilder, Event};

pub const API_KEY: &str = "api-key";
pub const TOGGLE_ID: &str = "toggle";
pub const WAIT: Duration = Duration::from_secs(5);

pub fn rand_project_id() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 12)
}

pub fn client_builder(base_url: &str, project_id: &str) -> ClientBuilder {
    Client::builder()
        .base_url(base_url)
        .api_key(API_KEY)
        .project_id(project_id)
        .toggle_id(TOGGLE_ID)
}

pub async fn mock_validate(server: &mut ServerGuard, project_id: &str, valid: bool) -> Mock {
    server
        .mock("POST", "/validate")
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .match_body(mockito::Matcher::PartialJsonString(format!(
            r#"{{"projectId": "{project_id}", "toggleId": "{TOGGLE_ID}"}}"#
        )))
        .with_status(200)
        .with_body(format!(r#"{{"valid": {valid}}}"#))
        .create_async()
        .await
}

pub async fn mock_flags(server: &mut ServerGuard, project_id: &str, body: &str) -> Mock {
    server
        .mock("GET", format!("/projects/{project_id}/feature-flags").as_str())
        .match_header("authorization", format!("Bearer {API_KEY}").as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await
}

pub async fn next_event(events: &mut Receiver<Event>) -> Event {
    timeout(WAIT, events.recv())
        .await
        .expect("no event arrived in time")
        .unwrap()
}

pub async fn wait_for_state(client: &Client, state: ChannelState) {
    timeout(WAIT, async {
        while client.channel_state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("channel state was not reached in time");
}

/// In-process WebSocket server standing in for the live update endpoint.
pub struct UpdateServer {
    url: String,
    connections: mpsc::UnboundedReceiver<Connection>,
}

pub struct Connection {
    ws: WebSocketStream<TcpStream>,
    pub auth: Option<String>,
    pub path: String,
}

impl UpdateServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sender, connections) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut auth = None;
                let mut path = String::new();
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    auth = req
                        .headers()
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    path = req.uri().path().to_owned();
                    Ok(resp)
                };
                let accepted = accept_hdr_async(stream, callback).await;
                if let Ok(ws) = accepted {
                    if sender.send(Connection { ws, auth, path }).is_err() {
                        break;
                    }
                }
            }
        });
        Self {
            url: format!("http://{addr}"),
            connections,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn next_connection(&mut self, wait: Duration) -> Option<Connection> {
        timeout(wait, self.connections.recv()).await.ok().flatten()
    }
}

impl Connection {
    pub async fn send_text(&mut self, text: &str) {
        self.ws.send(Message::Text(text.to_owned())).await.unwrap();
    }

    pub async fn close(mut self) {
        _ = self.ws.close(None).await;
        while self.ws.next().await.is_some() {}
    }

    /// Waits until the client sends a close frame.
    pub async fn wait_closed(mut self) -> bool {
        timeout(WAIT, async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if msg.is_close() {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }
}

pub struct RecordingLogger {}

impl RecordingLogger {
    thread_local!(pub static LOGS: RefCell<String> = RefCell::new(String::default()));
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().contains("flagsync")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARNING",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };
        let event_id = record
            .key_values()
            .get(Key::from("event_id"))
            .and_then(|v| v.to_i64())
            .unwrap_or(0);
        Self::LOGS.with_borrow_mut(|l| {
            l.push_str(format!("{level} [{event_id}] {}\n", record.args()).as_str())
        });
    }

    fn flush(&self) {}
}

pub fn log_record_init() {
    set_max_level(log::LevelFilter::Warn);
    _ = log::set_logger(&RecordingLogger {});
}
