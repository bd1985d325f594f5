use serde::{Deserialize, Serialize};

use crate::api::{ChatMessage, ChatToolCall, ChatToolCallFunction};
use crate::tools::ToolStatus;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_TOOL: &str = "tool";
pub const ROLE_SYSTEM: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => ROLE_USER,
            Role::Assistant => ROLE_ASSISTANT,
            Role::Tool => ROLE_TOOL,
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            ROLE_USER => Ok(Role::User),
            ROLE_ASSISTANT => Ok(Role::Assistant),
            ROLE_TOOL => Ok(Role::Tool),
            other => Err(format!("unknown message role: {other}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// One content fragment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    ToolResult {
        call_id: String,
        name: String,
        status: ToolStatus,
        content: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Complete,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub status: MessageStatus,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
            status: MessageStatus::Complete,
        }
    }

    pub fn assistant(text: impl Into<String>, status: MessageStatus) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::Text { text: text.into() }],
            status,
        }
    }

    /// A model tool round: optional lead-in text, the calls, then their results.
    pub fn tool_round(lead_in: &str, parts: Vec<Part>) -> Self {
        let mut all = Vec::with_capacity(parts.len() + 1);
        if !lead_in.is_empty() {
            all.push(Part::Text {
                text: lead_in.to_string(),
            });
        }
        all.extend(parts);
        Self {
            role: Role::Tool,
            parts: all,
            status: MessageStatus::Complete,
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn append_api_messages(&self, out: &mut Vec<ChatMessage>) {
        match self.role {
            Role::User => out.push(ChatMessage::new(ROLE_USER, self.text())),
            Role::Assistant => {
                let text = self.text();
                if text.is_empty() && self.status != MessageStatus::Complete {
                    return;
                }
                out.push(ChatMessage::new(ROLE_ASSISTANT, text));
            }
            Role::Tool => {
                let calls: Vec<ChatToolCall> = self
                    .parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::ToolCall {
                            id,
                            name,
                            arguments,
                        } => Some(ChatToolCall {
                            id: id.clone(),
                            kind: "function".to_string(),
                            function: ChatToolCallFunction {
                                name: name.clone(),
                                arguments: arguments.clone(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                if calls.is_empty() {
                    return;
                }
                let mut lead = ChatMessage::new(ROLE_ASSISTANT, self.text());
                lead.tool_calls = Some(calls);
                out.push(lead);

                for part in &self.parts {
                    if let Part::ToolResult {
                        call_id, content, ..
                    } = part
                    {
                        let mut result = ChatMessage::new(ROLE_TOOL, content.clone());
                        result.tool_call_id = Some(call_id.clone());
                        out.push(result);
                    }
                }
            }
        }
    }
}

/// Ordered message history owned by the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Swap in a loaded history wholesale.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn assistant_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|message| message.role == Role::Assistant)
    }

    /// Wire history: system prompt first, tool rounds expanded into an
    /// assistant `tool_calls` message followed by one tool message per result.
    pub fn to_api_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !system_prompt.trim().is_empty() {
            out.push(ChatMessage::new(ROLE_SYSTEM, system_prompt));
        }
        for message in &self.messages {
            message.append_api_messages(&mut out);
        }
        out
    }
}
