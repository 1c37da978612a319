//! WhatsApp Cloud API payloads

use serde::{Deserialize, Serialize};

// =============================================================================
// Outgoing template message
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TemplateMessage {
    pub messaging_product: &'static str,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub template: Template,
}

impl TemplateMessage {
    /// A body-only template with positional text parameters
    pub fn new(to: &str, name: &str, language: &str, params: &[&str]) -> Self {
        Self {
            messaging_product: "whatsapp",
            to: to.to_string(),
            kind: "template",
            template: Template {
                name: name.to_string(),
                language: Language {
                    code: language.to_string(),
                },
                components: vec![Component {
                    kind: "body",
                    parameters: params.iter().map(|text| Parameter::text(text)).collect(),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: String,
    pub language: Language,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Language {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl Parameter {
    pub fn text(text: &str) -> Self {
        Self {
            kind: "text",
            text: text.to_string(),
        }
    }
}

// =============================================================================
// Response
// =============================================================================

/// Body of a `/messages` response, success or error
#[derive(Debug, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub messages: Vec<SentMessage>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub id: Option<String>,
    pub message_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

impl SendResponse {
    /// The first message entry, when the provider accepted it
    pub fn accepted(&self) -> Option<&SentMessage> {
        self.messages
            .first()
            .filter(|m| m.message_status.as_deref() == Some("accepted"))
    }
}
