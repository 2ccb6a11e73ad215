use serde::{Deserialize, Serialize};

/// Role of a conversation turn exchanged with the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    /// Instructions that frame the whole run.
    System,
    /// Observations and goal text sent by the agent.
    User,
    /// Replies produced by the model.
    Assistant,
}

impl ConversationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One typed part of a multimodal message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Image encoded as a `data:` URL.
    Image { data_url: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn png(bytes: &[u8]) -> Self {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::Image {
            data_url: format!("data:image/png;base64,{encoded}"),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// Message body: plain text, or typed parts for multimodal user turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl TurnContent {
    pub fn image_count(&self) -> usize {
        match self {
            Self::Text(_) => 0,
            Self::Parts(parts) => parts.iter().filter(|part| part.is_image()).count(),
        }
    }

    /// Number of characters across all text parts.
    pub fn text_chars(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.chars().count(),
                    ContentPart::Image { .. } => 0,
                })
                .sum(),
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Drop image parts, collapsing to plain text. Returns whether anything changed.
    pub fn strip_images(&mut self) -> bool {
        if self.image_count() == 0 {
            return false;
        }
        *self = Self::Text(self.text());
        true
    }
}

/// A single message of the conversation sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub content: TurnContent,
}

impl ConversationTurn {
    pub fn new(role: ConversationRole, content: TurnContent) -> Self {
        Self { role, content }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ConversationRole::System, TurnContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ConversationRole::User, TurnContent::Text(text.into()))
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self::new(ConversationRole::User, TurnContent::Parts(parts))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ConversationRole::Assistant, TurnContent::Text(text.into()))
    }
}
