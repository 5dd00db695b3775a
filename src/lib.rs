//! Character card codec for AI personas.
//!
//! One canonical in-memory record ([`Character`]) with decoders for the three
//! encodings the ecosystem uses — legacy/loose JSON, an equivalent YAML form,
//! and PNG "character cards" carrying base64 JSON in a `chara` text chunk —
//! and encoders back to a single canonical `chara_card_v2` schema.
//!
//! Decoding tolerates years of incompatible community field names via ordered
//! alias tables and never drops unrecognized input fields (they are kept in
//! the record's `extensions` map). Card encoding re-embeds the record into a
//! donor PNG without disturbing any other chunk or the pixel bitmap.
//!
//! ```no_run
//! use persona_cards::{load_from_card_file, export_to_json};
//!
//! let character = load_from_card_file("aria.card.png")?;
//! println!("{}", export_to_json(&character)?);
//! # Ok::<(), persona_cards::CardError>(())
//! ```
//!
//! All operations are synchronous, pure transformations; file I/O happens
//! only in the `*_file` facade functions. Calls are independently reentrant
//! and safe to run concurrently as long as each call owns its record and
//! image buffer.

mod card;
mod character;
mod error;
mod normalize;
mod schema;

use std::fs;
use std::path::Path;

use serde_json::Value;

pub use character::{CardImage, Character};
pub use error::CardError;

/// Decode a character from loose or canonical JSON text.
pub fn load_from_json(text: &str) -> Result<Character, CardError> {
    let tree: Value = serde_json::from_str(text)
        .map_err(|e| CardError::Format(format!("invalid JSON: {e}")))?;
    normalize::from_value(&tree)
}

/// Decode a character from YAML text. The same wrapper shapes and field
/// aliases as the JSON path are accepted.
pub fn load_from_yaml(text: &str) -> Result<Character, CardError> {
    let tree: Value = serde_yaml::from_str(text)
        .map_err(|e| CardError::Format(format!("invalid YAML: {e}")))?;
    normalize::from_value(&tree)
}

/// Decode a character from PNG card bytes (the `chara` text chunk).
pub fn load_from_card(bytes: &[u8]) -> Result<Character, CardError> {
    card::decode(bytes)
}

/// Encode a character as canonical `chara_card_v2` JSON.
pub fn export_to_json(character: &Character) -> Result<String, CardError> {
    schema::CardDocument::from_character(character).to_json()
}

/// Encode a character as canonical YAML — the identical tree as
/// [`export_to_json`], rendered in block style.
pub fn export_to_yaml(character: &Character) -> Result<String, CardError> {
    schema::CardDocument::from_character(character).to_yaml()
}

/// Embed a character into the donor image, returning a new PNG card.
/// The donor is taken explicitly and never mutated.
pub fn export_to_card(character: &Character, image: &CardImage) -> Result<Vec<u8>, CardError> {
    card::encode(character, image)
}

// ---------------------------------------------------------------------------
// File facade — the only place this crate touches the filesystem.
// ---------------------------------------------------------------------------

/// Read and decode a JSON character file.
pub fn load_from_json_file(path: impl AsRef<Path>) -> Result<Character, CardError> {
    load_from_json(&fs::read_to_string(path)?)
}

/// Read and decode a YAML character file.
pub fn load_from_yaml_file(path: impl AsRef<Path>) -> Result<Character, CardError> {
    load_from_yaml(&fs::read_to_string(path)?)
}

/// Read and decode a PNG character card file.
pub fn load_from_card_file(path: impl AsRef<Path>) -> Result<Character, CardError> {
    load_from_card(&fs::read(path)?)
}

/// Encode to canonical JSON and write it to `path`.
pub fn export_to_json_file(character: &Character, path: impl AsRef<Path>) -> Result<(), CardError> {
    fs::write(path, export_to_json(character)?)?;
    Ok(())
}

/// Encode to canonical YAML and write it to `path`.
pub fn export_to_yaml_file(character: &Character, path: impl AsRef<Path>) -> Result<(), CardError> {
    fs::write(path, export_to_yaml(character)?)?;
    Ok(())
}

/// Encode a PNG card from `character` and the donor image, writing it to
/// `path`.
pub fn export_to_card_file(
    character: &Character,
    image: &CardImage,
    path: impl AsRef<Path>,
) -> Result<(), CardError> {
    fs::write(path, export_to_card(character, image)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_facade_roundtrip() {
        let mut c = Character::new();
        c.name = "Aria".into();
        c.tags = vec!["fantasy".into()];
        let decoded = load_from_json(&export_to_json(&c).unwrap()).unwrap();
        assert_eq!(decoded.name, "Aria");
        assert_eq!(decoded.tags, vec!["fantasy"]);
        assert_eq!(decoded.created_time(), c.created_time());
    }

    #[test]
    fn test_yaml_facade_matches_json_facade() {
        let mut c = Character::new();
        c.name = "Mira".into();
        c.scenario = "a long road".into();
        let from_json = load_from_json(&export_to_json(&c).unwrap()).unwrap();
        let from_yaml = load_from_yaml(&export_to_yaml(&c).unwrap()).unwrap();
        assert_eq!(from_json, from_yaml);
    }

    #[test]
    fn test_unparseable_text_is_a_format_error() {
        assert_eq!(load_from_json("{{nope").unwrap_err().kind(), "format");
        assert_eq!(load_from_yaml("a: [unclosed").unwrap_err().kind(), "format");
        assert_eq!(load_from_json("\"a string\"").unwrap_err().kind(), "format");
    }
}
