use serde::{Deserialize, Serialize};

use crate::api::models::{ChatMessageDto, ChatRoomSummary, MessageType};
use crate::render::surface::Color;

pub type ConversationId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub name: String,
    pub last_message: String,
    pub time_label: String,
    pub unread: u32,
    pub avatar_color: Color,
}

const AVATAR_PALETTE: [Color; 5] = [
    Color::rgb(0x22, 0xc5, 0x5e),
    Color::rgb(0x3b, 0x82, 0xf6),
    Color::rgb(0xf9, 0x73, 0x16),
    Color::rgb(0xec, 0x48, 0x99),
    Color::rgb(0x8b, 0x5c, 0xf6),
];

impl Conversation {
    /// Build a sidebar entry from a room summary. Rooms have no colour of
    /// their own, so one is picked from a fixed palette by id.
    pub fn from_summary(summary: &ChatRoomSummary) -> Self {
        let palette_index = summary.room_id.rem_euclid(AVATAR_PALETTE.len() as i64) as usize;
        Self {
            id: summary.room_id,
            name: summary
                .room_name
                .clone()
                .unwrap_or_else(|| format!("Room {}", summary.room_id)),
            last_message: summary.last_message_preview.clone().unwrap_or_default(),
            time_label: summary.last_message_at.clone().unwrap_or_default(),
            unread: summary.unread_count,
            avatar_color: AVATAR_PALETTE[palette_index],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Me,
    Them,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: Sender,
    pub name: String,
    pub text: String,
    pub time_label: String,
}

impl Message {
    pub fn new(
        id: i64,
        sender: Sender,
        name: impl Into<String>,
        text: impl Into<String>,
        time_label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            sender,
            name: name.into(),
            text: text.into(),
            time_label: time_label.into(),
        }
    }

    pub fn is_mine(&self) -> bool {
        self.sender == Sender::Me
    }

    /// Convert a history entry; non-text payloads become a short placeholder.
    pub fn from_dto(dto: &ChatMessageDto, my_member_id: i64, fallback_id: i64) -> Self {
        let sender = if dto.sender_id == my_member_id { Sender::Me } else { Sender::Them };
        let text = match dto.kind {
            MessageType::Text | MessageType::System => dto.content.clone().unwrap_or_default(),
            MessageType::Image => "[image]".to_string(),
            MessageType::Video => "[video]".to_string(),
            MessageType::Audio => "[audio]".to_string(),
            MessageType::File => match &dto.file_name {
                Some(name) => format!("[file] {name}"),
                None => "[file]".to_string(),
            },
        };
        let name = match sender {
            Sender::Me => "Me".to_string(),
            Sender::Them => format!("Member {}", dto.sender_id),
        };
        Self {
            id: dto.seq.unwrap_or(fallback_id),
            sender,
            name,
            text,
            time_label: dto.created_at.clone().unwrap_or_default(),
        }
    }
}
