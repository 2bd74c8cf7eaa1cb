//! Live chat over STOMP on a plain WebSocket.
//!
//! Only the client side the chat screen needs is implemented: `CONNECT`,
//! a subscription to the member's room-summary topic, one room topic at a
//! time, and one `SEND` to `/publish/{roomId}` per message. Heart-beats are
//! disabled in the handshake.

use std::fmt::Write as _;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, HeaderValue, InvalidHeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use url::Url;

use crate::api::models::{ChatMessageDto, ChatMessageRequest, ChatRoomSummary};
use crate::chat::models::ConversationId;
use crate::chat::state::{MessageSender, SendRequest};

const SUMMARY_SUBSCRIPTION: &str = "room-summary";
const ROOM_SUBSCRIPTION: &str = "room";

#[derive(Debug, Error)]
pub enum StompError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("broker refused connection: {0}")]
    Refused(String),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => return Err(StompError::Frame(format!("bad escape \\{}", other.unwrap_or(' ')))),
        }
    }
    Ok(out)
}

impl Frame {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // CONNECT and CONNECTED headers are sent raw.
    fn escapes_headers(command: &str) -> bool {
        command != "CONNECT" && command != "CONNECTED"
    }

    pub fn encode(&self) -> String {
        let raw = !Self::escapes_headers(&self.command);
        let mut out = String::new();
        out.push_str(&self.command);
        out.push('\n');
        for (k, v) in &self.headers {
            if raw {
                let _ = writeln!(out, "{k}:{v}");
            } else {
                let _ = writeln!(out, "{}:{}", escape(k), escape(v));
            }
        }
        if !self.body.is_empty() {
            let _ = writeln!(out, "content-length:{}", self.body.len());
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Leading end-of-line heart-beats are skipped.
    pub fn parse(raw: &str) -> Result<Self, StompError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        let raw = raw.strip_suffix('\0').unwrap_or(raw);
        let (head, body) = raw
            .split_once("\n\n")
            .or_else(|| raw.split_once("\r\n\r\n"))
            .ok_or_else(|| StompError::Frame("missing header terminator".into()))?;

        let mut lines = head.lines();
        let command = lines
            .next()
            .map(str::trim_end)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StompError::Frame("missing command".into()))?
            .to_string();

        let unescaped = Self::escapes_headers(&command);
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| StompError::Frame(format!("bad header line `{line}`")))?;
            if unescaped {
                headers.push((unescape(k)?, unescape(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }
}

/// Plain WebSocket endpoint of the broker at `base_url` (`http` becomes `ws`).
/// `/connect` on the same server is SockJS only.
pub fn ws_endpoint(base_url: &str) -> Result<Url, StompError> {
    let mut url = Url::parse(base_url.trim())?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| StompError::Frame(format!("cannot use scheme {scheme} for {base_url}")))?;
    Ok(url.join("ws-stomp")?)
}

pub fn room_topic(room: ConversationId) -> String {
    format!("/topic/chat/room/{room}")
}

pub fn summary_topic(member_id: i64) -> String {
    format!("/topic/user.{member_id}.room-summary")
}

/// Work queued for the session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Publish(SendRequest),
    /// Follow live messages of one room, dropping the previously followed one.
    Watch(ConversationId),
}

/// A push from the broker, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StompEvent {
    Message(ChatMessageDto),
    RoomSummary(ChatRoomSummary),
}

impl StompEvent {
    /// Decode a `MESSAGE` frame by the subscription it arrived on. Other
    /// frames and unknown subscriptions yield `None`.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, StompError> {
        if frame.command != "MESSAGE" {
            return Ok(None);
        }
        let event = match frame.get("subscription") {
            Some(ROOM_SUBSCRIPTION) => Self::Message(serde_json::from_str(&frame.body)?),
            Some(SUMMARY_SUBSCRIPTION) => Self::RoomSummary(serde_json::from_str(&frame.body)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[derive(Debug, Clone)]
pub struct StompConfig {
    pub url: Url,
    pub host: String,
    pub access_token: Option<String>,
    pub member_id: i64,
}

impl StompConfig {
    pub fn new(url: Url, access_token: Option<String>, member_id: i64) -> Self {
        let host = url.host_str().unwrap_or("localhost").to_string();
        Self { url, host, access_token, member_id }
    }

    fn bearer(&self) -> Option<String> {
        self.access_token.as_ref().map(|token| format!("Bearer {token}"))
    }

    /// The upgrade request carries the token too; the broker checks it
    /// before any STOMP frame is read.
    fn upgrade_request(&self) -> Result<Request, StompError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(bearer) = self.bearer() {
            request
                .headers_mut()
                .insert(AUTHORIZATION, HeaderValue::from_str(&bearer)?);
        }
        Ok(request)
    }

    fn connect_frame(&self) -> Frame {
        let mut frame = Frame::new("CONNECT")
            .header("accept-version", "1.2")
            .header("host", self.host.clone())
            .header("heart-beat", "0,0");
        if let Some(bearer) = self.bearer() {
            frame = frame.header("Authorization", bearer);
        }
        frame
    }

    fn subscribe_frame(&self, id: &str, destination: String) -> Frame {
        let mut frame = Frame::new("SUBSCRIBE")
            .header("id", id)
            .header("destination", destination);
        if let Some(bearer) = self.bearer() {
            frame = frame.header("Authorization", bearer);
        }
        frame
    }

    fn send_frame(&self, request: &SendRequest) -> Result<Frame, StompError> {
        let body = ChatMessageRequest::text(request.conversation_id, self.member_id, request.text.clone());
        Ok(Frame::new("SEND")
            .header("destination", format!("/publish/{}", request.conversation_id))
            .header("content-type", "application/json")
            .body(serde_json::to_string(&body)?))
    }
}

/// Connect, subscribe to the member's room summaries, then work through
/// `commands` until the channel closes or the socket fails. Decoded pushes
/// are handed to `on_event` from a background reader task.
pub async fn run_session<F>(
    config: StompConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    on_event: F,
) -> Result<(), StompError>
where
    F: Fn(StompEvent) + Send + 'static,
{
    let (ws, _) = connect_async(config.upgrade_request()?).await?;
    let (mut write, mut read) = ws.split();

    write.send(WsMessage::Text(config.connect_frame().encode())).await?;
    loop {
        match read.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                let frame = Frame::parse(&text)?;
                match frame.command.as_str() {
                    "CONNECTED" => break,
                    "ERROR" => {
                        let message = frame.get("message").unwrap_or(&frame.body).to_string();
                        return Err(StompError::Refused(message));
                    }
                    other => debug!("ignoring {other} frame before CONNECTED"),
                }
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(StompError::Refused("socket closed during handshake".into())),
        }
    }
    info!("STOMP session open at {}", config.url);

    let summaries = config.subscribe_frame(SUMMARY_SUBSCRIPTION, summary_topic(config.member_id));
    write.send(WsMessage::Text(summaries.encode())).await?;

    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    let frame = match Frame::parse(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("unreadable frame: {e}");
                            continue;
                        }
                    };
                    if frame.command == "ERROR" {
                        warn!("broker error: {}", frame.get("message").unwrap_or(&frame.body));
                        continue;
                    }
                    match StompEvent::from_frame(&frame) {
                        Ok(Some(event)) => on_event(event),
                        Ok(None) => debug!("received {} frame", frame.command),
                        Err(e) => warn!("undecodable push: {e}"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("STOMP read failed: {e}");
                    break;
                }
            }
        }
    });

    let mut watching: Option<ConversationId> = None;
    while let Some(command) = commands.recv().await {
        match command {
            Command::Publish(request) => {
                let frame = config.send_frame(&request)?;
                write.send(WsMessage::Text(frame.encode())).await?;
                debug!("published to conversation {}", request.conversation_id);
            }
            Command::Watch(room) if watching == Some(room) => {}
            Command::Watch(room) => {
                if watching.take().is_some() {
                    let unsubscribe = Frame::new("UNSUBSCRIBE").header("id", ROOM_SUBSCRIPTION);
                    write.send(WsMessage::Text(unsubscribe.encode())).await?;
                }
                let subscribe = config.subscribe_frame(ROOM_SUBSCRIPTION, room_topic(room));
                write.send(WsMessage::Text(subscribe.encode())).await?;
                watching = Some(room);
                debug!("watching conversation {room}");
            }
        }
    }

    let _ = write.send(WsMessage::Text(Frame::new("DISCONNECT").encode())).await;
    let _ = write.close().await;
    Ok(())
}

/// Handle to a background STOMP session on the shared runtime. Requests are
/// queued and delivered fire-and-forget; failures only reach the log.
#[derive(Debug, Clone)]
pub struct StompSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl StompSender {
    /// Start the session. Broker pushes arrive on the returned receiver,
    /// which the caller attaches to the GTK main loop.
    pub fn spawn(config: StompConfig) -> (Self, glib::Receiver<StompEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = crate::utils::glib_channel();
        crate::utils::spawn_async(async move {
            let on_event = move |event| {
                if events_tx.send(event).is_err() {
                    debug!("chat window is gone, push dropped");
                }
            };
            if let Err(e) = run_session(config, rx, on_event).await {
                warn!("STOMP session ended: {e}");
            }
        });
        (Self { tx }, events_rx)
    }

    pub fn watch(&self, room: ConversationId) {
        self.queue(Command::Watch(room));
    }

    fn queue(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("STOMP session is gone, command dropped");
        }
    }
}

impl MessageSender for StompSender {
    fn send(&mut self, request: SendRequest) {
        self.queue(Command::Publish(request));
    }
}
