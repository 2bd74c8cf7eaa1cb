use serde::{Deserialize, Serialize};

/// Envelope every Munglog endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<String>,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub token_info: Option<TokenInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub member_id: i64,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomSummary {
    pub room_id: i64,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message_preview: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    File,
    Audio,
    System,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageDto {
    #[serde(default)]
    pub seq: Option<i64>,
    pub room_id: i64,
    pub sender_id: i64,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One page of room history, newest page first.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSlice {
    #[serde(default)]
    pub content: Vec<ChatMessageDto>,
    #[serde(default)]
    pub has_next: bool,
}

impl MessageSlice {
    /// Cursor for the next (older) page, if there is one.
    pub fn next_before_seq(&self) -> Option<i64> {
        if self.has_next {
            self.content.first().and_then(|m| m.seq)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub before_seq: Option<i64>,
    pub size: Option<u32>,
}

/// Body published to `/publish/{roomId}` over STOMP.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    pub room_id: i64,
    pub sender_id: i64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
}

impl ChatMessageRequest {
    pub fn text(room_id: i64, sender_id: i64, content: impl Into<String>) -> Self {
        Self {
            room_id,
            sender_id,
            kind: MessageType::Text,
            content: content.into(),
            file_url: None,
            file_name: None,
            file_size: None,
        }
    }
}
