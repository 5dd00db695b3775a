//! Decode-side normalization: maps heterogeneous parsed trees (JSON or YAML)
//! onto a [`Character`] using ordered alias tables.
//!
//! Years of community tooling produced incompatible field names for the same
//! data ("char_name" vs "name", "world_scenario" vs "scenario", ...). Each
//! canonical field consults its aliases in priority order and takes the first
//! value that is present and non-empty. An alias that resolves to `""` falls
//! through to the next one — that empty-string-is-falsy behavior is a
//! compatibility quirk of the ecosystem and is preserved on purpose.

use serde_json::{Map, Value};

use crate::character::Character;
use crate::error::CardError;

const NAME_ALIASES: &[&str] = &["char_name", "name"];
const SUMMARY_ALIASES: &[&str] = &["summary", "description"];
const PERSONALITY_ALIASES: &[&str] = &["char_persona", "personality"];
const SCENARIO_ALIASES: &[&str] = &["world_scenario", "scenario"];
const FIRST_GREETING_ALIASES: &[&str] = &["first_mes", "char_greeting"];
const GREETING_ALIASES: &[&str] = &["char_greeting", "greeting_message"];
const EXAMPLE_ALIASES: &[&str] = &["mes_example", "example_dialogue"];

/// Every key the normalizer consumes or deliberately ignores. Anything else
/// found in the payload is preserved losslessly inside `extensions`.
const RECOGNIZED_KEYS: &[&str] = &[
    // alias-table keys
    "char_name",
    "name",
    "summary",
    "description",
    "char_persona",
    "personality",
    "world_scenario",
    "scenario",
    "first_mes",
    "char_greeting",
    "greeting_message",
    "mes_example",
    "example_dialogue",
    // verbatim pass-through fields
    "alternate_greetings",
    "tags",
    "creator",
    "character_version",
    "extensions",
    "character_book",
    // wrapper and canonical-schema envelope keys
    "data",
    "chara",
    "metadata",
    "spec",
    "spec_version",
    // canonical-schema boilerplate, handled separately below
    "creator_notes",
    "system_prompt",
    "post_history_instructions",
];

/// Canonical-schema keys the record has no field for. Folded into
/// `extensions` only when non-empty, so that decoding our own canonical
/// output (which always emits them as `""`) leaves the record unchanged.
const BOILERPLATE_KEYS: &[&str] = &["creator_notes", "system_prompt", "post_history_instructions"];

/// Build a [`Character`] from a parsed JSON or YAML tree.
pub(crate) fn from_value(root: &Value) -> Result<Character, CardError> {
    let top = root
        .as_object()
        .ok_or_else(|| CardError::Format(format!("expected a map, got {}", value_kind(root))))?;

    // Accept a bare map, a {"data": {...}} wrapper, or a
    // {"data": {"chara": {...}, "metadata": {...}}} wrapper.
    let data = match top.get("data") {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            return Err(CardError::Format(format!(
                "\"data\" wrapper is not a map, got {}",
                value_kind(other)
            )))
        }
        None => top,
    };
    let chara = match data.get("chara") {
        Some(Value::Object(inner)) => inner,
        _ => data,
    };

    // The canonical export writes metadata as a sibling of "data", while some
    // legacy wrappers nest it inside. Check both so created_time survives a
    // round trip.
    let metadata = data
        .get("metadata")
        .and_then(Value::as_object)
        .or_else(|| top.get("metadata").and_then(Value::as_object));
    let created = metadata.and_then(|m| m.get("created")).and_then(Value::as_i64);

    let mut character = match created {
        Some(ts) => Character::with_created_time(ts),
        None => Character::new(),
    };

    character.name = resolve_alias(chara, NAME_ALIASES);
    character.summary = resolve_alias(chara, SUMMARY_ALIASES);
    character.personality = resolve_alias(chara, PERSONALITY_ALIASES);
    character.scenario = resolve_alias(chara, SCENARIO_ALIASES);
    character.first_greeting_message = resolve_alias(chara, FIRST_GREETING_ALIASES);
    character.greeting_message = resolve_alias(chara, GREETING_ALIASES);
    character.example_messages = resolve_alias(chara, EXAMPLE_ALIASES);

    character.alternate_greetings = string_seq(chara.get("alternate_greetings"));
    character.tags = string_seq(chara.get("tags"));
    character.creator = scalar_string(chara.get("creator"));
    character.character_version = scalar_string(chara.get("character_version"));
    character.extensions = chara
        .get("extensions")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    character.character_book = match chara.get("character_book") {
        None | Some(Value::Null) => None,
        Some(book) => Some(book.clone()),
    };

    fold_unrecognized(chara, &mut character);

    tracing::debug!(
        name = %character.name,
        created = character.created_time(),
        "normalized character payload"
    );
    Ok(character)
}

/// Preserve input keys the canonical record has no slot for.
fn fold_unrecognized(chara: &Map<String, Value>, character: &mut Character) {
    for (key, value) in chara {
        let keep = if BOILERPLATE_KEYS.contains(&key.as_str()) {
            // Always emitted as "" by the canonical encoder; only a real
            // value is worth carrying.
            !matches!(value, Value::Null) && !matches!(value, Value::String(s) if s.is_empty())
        } else {
            !RECOGNIZED_KEYS.contains(&key.as_str())
        };
        if keep {
            character
                .extensions
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// First alias that is present and non-empty wins; `""` and `null` fall
/// through. Scalars are coerced to their string form, containers are skipped.
fn resolve_alias(map: &Map<String, Value>, aliases: &[&str]) -> String {
    for alias in aliases {
        match map.get(*alias) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            Some(Value::Number(n)) => return n.to_string(),
            Some(Value::Bool(b)) => return b.to_string(),
            _ => continue,
        }
    }
    String::new()
}

fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Pass a sequence of strings through in order, dropping non-string entries.
fn string_seq(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a map",
    }
}
