//! Encode-side canonical wire schema ("chara_card_v2").
//!
//! Every export path (JSON text, YAML text, PNG card chunk) renders a record
//! through this one tree. The legacy per-backend format switch
//! ("tavernai"/"sillytavern"/"pygmalion"/"neutral") routed to the same shape
//! in practice, so there is a single path here.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::character::Character;
use crate::error::CardError;

pub(crate) const SPEC_NAME: &str = "chara_card_v2";
pub(crate) const SPEC_VERSION: &str = "2.0";

/// Top-level canonical document.
#[derive(Debug, Serialize)]
pub(crate) struct CardDocument {
    pub spec: &'static str,
    pub spec_version: &'static str,
    pub data: CardData,
    pub metadata: CardMetadata,
}

#[derive(Debug, Serialize)]
pub(crate) struct CardData {
    pub name: String,
    pub description: String,
    pub personality: String,
    pub scenario: String,
    pub first_mes: String,
    pub mes_example: String,
    pub creator_notes: String,
    pub system_prompt: String,
    pub post_history_instructions: String,
    pub alternate_greetings: Vec<String>,
    pub tags: Vec<String>,
    pub creator: String,
    pub character_version: String,
    pub extensions: Map<String, Value>,
    /// `null` when absent; never serialized as `{}`.
    pub character_book: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CardMetadata {
    pub version: u32,
    pub created: i64,
    pub modified: i64,
    pub source: String,
    pub tool: ToolInfo,
}

#[derive(Debug, Serialize)]
pub(crate) struct ToolInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub url: &'static str,
}

impl CardDocument {
    /// Snapshot a record into the canonical tree. `modified` is stamped with
    /// the current time; `created` carries the record's own timestamp.
    pub(crate) fn from_character(character: &Character) -> Self {
        // Blank greetings are filtered at encode time, not decode time.
        let alternate_greetings: Vec<String> = character
            .alternate_greetings
            .iter()
            .filter(|greeting| !greeting.trim().is_empty())
            .cloned()
            .collect();

        let character_book = match &character.character_book {
            Some(Value::Object(entries)) if entries.is_empty() => None,
            other => other.clone(),
        };

        CardDocument {
            spec: SPEC_NAME,
            spec_version: SPEC_VERSION,
            data: CardData {
                name: character.name.clone(),
                description: character.summary.clone(),
                personality: character.personality.clone(),
                scenario: character.scenario.clone(),
                first_mes: character.first_greeting_message.clone(),
                mes_example: character.example_messages.clone(),
                creator_notes: String::new(),
                system_prompt: String::new(),
                post_history_instructions: String::new(),
                alternate_greetings,
                tags: character.tags.clone(),
                creator: character.creator.clone(),
                character_version: character.character_version.clone(),
                extensions: character.extensions.clone(),
                character_book,
            },
            metadata: CardMetadata {
                version: 1,
                created: character.created_time(),
                modified: chrono::Utc::now().timestamp(),
                source: String::new(),
                tool: ToolInfo {
                    name: env!("CARGO_PKG_NAME"),
                    version: env!("CARGO_PKG_VERSION"),
                    url: "",
                },
            },
        }
    }

    /// Render as pretty-printed JSON.
    pub(crate) fn to_json(&self) -> Result<String, CardError> {
        serde_json::to_string_pretty(self).map_err(|e| CardError::Serialize(e.to_string()))
    }

    /// Render the identical tree as block-style YAML. Unicode passes through
    /// unescaped; JSON and YAML exports are structurally interchangeable.
    pub(crate) fn to_yaml(&self) -> Result<String, CardError> {
        serde_yaml::to_string(self).map_err(|e| CardError::Serialize(e.to_string()))
    }
}
