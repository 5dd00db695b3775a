use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::CardError;

/// Donor image for card export. The record never validates or interprets the
/// image; it only hands the bytes to the PNG codec when a card is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardImage {
    /// A PNG on disk, read fully (and released) inside the encode call.
    Path(PathBuf),
    /// PNG bytes already in memory.
    Bytes(Vec<u8>),
}

impl CardImage {
    /// Resolve to raw bytes. In-memory images are borrowed, paths are read
    /// within this call and not retained.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, CardError> {
        match self {
            CardImage::Path(path) => Ok(Cow::Owned(fs::read(path)?)),
            CardImage::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

impl From<PathBuf> for CardImage {
    fn from(path: PathBuf) -> Self {
        CardImage::Path(path)
    }
}

impl From<Vec<u8>> for CardImage {
    fn from(bytes: Vec<u8>) -> Self {
        CardImage::Bytes(bytes)
    }
}

/// One persona definition, normalized. This is the single in-memory shape all
/// decoders produce and all encoders consume.
///
/// String fields are never null: decoders coerce absent values to `""`.
/// Fields are mutated only by direct assignment from the caller; the codec
/// itself treats a record as read-only during encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub name: String,
    pub summary: String,
    pub personality: String,
    pub scenario: String,
    pub first_greeting_message: String,
    pub greeting_message: String,
    pub example_messages: String,
    /// Insertion order is meaningful and preserved.
    pub alternate_greetings: Vec<String>,
    pub tags: Vec<String>,
    pub creator: String,
    pub character_version: String,
    /// Open map. Unrecognized input fields land here losslessly at decode.
    pub extensions: Map<String, Value>,
    /// Arbitrary nested lorebook value. Absent means absent, never `{}`.
    pub character_book: Option<Value>,
    /// Donor image reference, required only when exporting a card.
    pub image: Option<CardImage>,
    // Set once at construction or decode, then read-only.
    created_time: i64,
}

impl Character {
    /// Empty record stamped with the current time.
    pub fn new() -> Self {
        Self::with_created_time(chrono::Utc::now().timestamp())
    }

    /// Empty record with an explicit creation timestamp. Used by decoders
    /// that recover the original timestamp from card metadata.
    pub(crate) fn with_created_time(created_time: i64) -> Self {
        Character {
            name: String::new(),
            summary: String::new(),
            personality: String::new(),
            scenario: String::new(),
            first_greeting_message: String::new(),
            greeting_message: String::new(),
            example_messages: String::new(),
            alternate_greetings: Vec::new(),
            tags: Vec::new(),
            creator: String::new(),
            character_version: String::new(),
            extensions: Map::new(),
            character_book: None,
            image: None,
            created_time,
        }
    }

    /// Unix seconds at which this record was first created or decoded.
    /// Preserved unchanged through every subsequent encode.
    pub fn created_time(&self) -> i64 {
        self.created_time
    }

    /// Export this record as a PNG card using its own associated image.
    /// Fails with [`CardError::MissingImage`] before any I/O if no image
    /// was attached.
    pub fn export_card(&self) -> Result<Vec<u8>, CardError> {
        let image = self.image.as_ref().ok_or(CardError::MissingImage)?;
        crate::card::encode(self, image)
    }
}

impl Default for Character {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Summary: {}", self.summary)?;
        writeln!(f, "Personality: {}", self.personality)?;
        writeln!(f, "Scenario: {}", self.scenario)?;
        writeln!(f, "First Greeting Message: {}", self.first_greeting_message)?;
        writeln!(f, "Greeting Message: {}", self.greeting_message)?;
        writeln!(f, "Example Messages: {}", self.example_messages)?;
        if self.alternate_greetings.is_empty() {
            writeln!(f, "Alternate Greetings: None")?;
        } else {
            writeln!(f, "Alternate Greetings:")?;
            for greeting in &self.alternate_greetings {
                writeln!(f, "  {greeting}")?;
            }
        }
        if self.tags.is_empty() {
            writeln!(f, "Tags: None")?;
        } else {
            writeln!(f, "Tags: {}", self.tags.join(", "))?;
        }
        writeln!(f, "Creator: {}", self.creator)?;
        writeln!(f, "Character Version: {}", self.character_version)?;
        writeln!(
            f,
            "Extensions: {}",
            Value::Object(self.extensions.clone())
        )?;
        match &self.character_book {
            Some(book) => writeln!(f, "Character Book: {book}")?,
            None => writeln!(f, "Character Book: None")?,
        }
        match &self.image {
            Some(CardImage::Path(path)) => write!(f, "Image: {}", path.display()),
            Some(CardImage::Bytes(bytes)) => write!(f, "Image: <{} bytes>", bytes.len()),
            None => write!(f, "Image: None"),
        }
    }
}
