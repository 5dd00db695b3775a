//! PNG character-card codec.
//!
//! A card is an ordinary PNG with one `tEXt` chunk keyed `chara`, whose value
//! is the base64-encoded canonical JSON document. Decode reads that chunk via
//! the `png` crate's text-metadata support; encode splices the chunk into a
//! donor image at the raw chunk level, so every other chunk (pixel data,
//! color profiles, other metadata) is copied byte-for-byte.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::Value;

use crate::character::{CardImage, Character};
use crate::error::CardError;
use crate::normalize;
use crate::schema::CardDocument;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const CHUNK_TYPE_TEXT: &[u8; 4] = b"tEXt";
const CHUNK_TYPE_IHDR: &[u8; 4] = b"IHDR";
const CHARA_KEYWORD: &str = "chara";

/// Recover a [`Character`] from PNG card bytes.
pub(crate) fn decode(bytes: &[u8]) -> Result<Character, CardError> {
    let encoded = read_chara_text(bytes)?;
    tracing::debug!(len = encoded.len(), "found chara chunk");

    let json_bytes = B64
        .decode(encoded.trim())
        .map_err(|e| CardError::Decode(format!("invalid base64 in chara chunk: {e}")))?;
    let json_text = String::from_utf8(json_bytes)
        .map_err(|e| CardError::Decode(format!("chara chunk is not valid UTF-8: {e}")))?;
    let tree: Value = serde_json::from_str(&json_text)
        .map_err(|e| CardError::Decode(format!("invalid JSON in chara chunk: {e}")))?;

    normalize::from_value(&tree)
}

/// Embed `character` into `image`, returning a fresh PNG. The donor is never
/// mutated; its chunks and pixel bitmap pass through byte-identical.
pub(crate) fn encode(character: &Character, image: &CardImage) -> Result<Vec<u8>, CardError> {
    let json = CardDocument::from_character(character).to_json()?;
    let payload = B64.encode(json.as_bytes());

    let donor = image.bytes()?;
    let card = splice_chara_chunk(&donor, &payload)?;
    tracing::debug!(
        donor_len = donor.len(),
        card_len = card.len(),
        "embedded chara chunk into donor PNG"
    );
    Ok(card)
}

/// Pull the `chara` tEXt value out of a PNG. Text chunks may sit after the
/// image data, so the whole stream is drained before looking.
fn read_chara_text(bytes: &[u8]) -> Result<String, CardError> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder
        .read_info()
        .map_err(|e| CardError::Format(format!("not a valid PNG: {e}")))?;

    // A damaged image section must not mask metadata that already parsed.
    if let Err(e) = reader.finish() {
        tracing::warn!("PNG stream did not fully decode: {e}");
    }

    reader
        .info()
        .uncompressed_latin1_text
        .iter()
        .find(|chunk| chunk.keyword == CHARA_KEYWORD)
        .map(|chunk| chunk.text.clone())
        .ok_or(CardError::MissingChunk)
}

/// Copy every donor chunk verbatim, dropping any pre-existing `chara` tEXt
/// chunk, and insert the new one directly after IHDR.
fn splice_chara_chunk(donor: &[u8], payload: &str) -> Result<Vec<u8>, CardError> {
    if donor.len() < PNG_SIGNATURE.len() || donor[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(CardError::Format("donor image is not a PNG".into()));
    }

    let mut out = Vec::with_capacity(donor.len() + payload.len() + 32);
    out.extend_from_slice(&PNG_SIGNATURE);

    let mut offset = PNG_SIGNATURE.len();
    let mut inserted = false;
    while offset < donor.len() {
        let chunk = RawChunk::parse(donor, offset)?;

        let is_old_chara =
            chunk.chunk_type == *CHUNK_TYPE_TEXT && chunk.keyword() == CHARA_KEYWORD.as_bytes();
        if !is_old_chara {
            out.extend_from_slice(chunk.raw);
        }

        if !inserted && chunk.chunk_type == *CHUNK_TYPE_IHDR {
            write_text_chunk(&mut out, CHARA_KEYWORD.as_bytes(), payload.as_bytes());
            inserted = true;
        }

        offset = chunk.end;
    }

    if !inserted {
        return Err(CardError::Format("donor PNG has no IHDR chunk".into()));
    }
    Ok(out)
}

/// One raw chunk: length-prefixed type + data + CRC, held as untouched bytes.
struct RawChunk<'a> {
    chunk_type: [u8; 4],
    data: &'a [u8],
    raw: &'a [u8],
    end: usize,
}

impl<'a> RawChunk<'a> {
    fn parse(donor: &'a [u8], offset: usize) -> Result<Self, CardError> {
        // 4 length + 4 type + 4 crc
        if donor.len() - offset < 12 {
            return Err(CardError::Format("truncated PNG chunk header".into()));
        }
        let len = u32::from_be_bytes([
            donor[offset],
            donor[offset + 1],
            donor[offset + 2],
            donor[offset + 3],
        ]) as usize;
        let end = offset + 12 + len;
        if end > donor.len() {
            return Err(CardError::Format("truncated PNG chunk data".into()));
        }
        let chunk_type = [
            donor[offset + 4],
            donor[offset + 5],
            donor[offset + 6],
            donor[offset + 7],
        ];
        Ok(RawChunk {
            chunk_type,
            data: &donor[offset + 8..offset + 8 + len],
            raw: &donor[offset..end],
            end,
        })
    }

    /// tEXt keyword: the bytes up to the first NUL separator.
    fn keyword(&self) -> &[u8] {
        match self.data.iter().position(|b| *b == 0) {
            Some(nul) => &self.data[..nul],
            None => self.data,
        }
    }
}

fn write_text_chunk(out: &mut Vec<u8>, keyword: &[u8], text: &[u8]) {
    let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
    data.extend_from_slice(keyword);
    data.push(0);
    data.extend_from_slice(text);

    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(CHUNK_TYPE_TEXT);
    out.extend_from_slice(&data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(CHUNK_TYPE_TEXT);
    hasher.update(&data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 RGBA PNG built with the png encoder.
    fn tiny_png() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, 2, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer
                .write_image_data(&[
                    255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 10, 20, 30, 255,
                ])
                .unwrap();
        }
        buf
    }

    fn pixels(bytes: &[u8]) -> Vec<u8> {
        let decoder = png::Decoder::new(Cursor::new(bytes));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();
        buf.truncate(info.buffer_size());
        buf
    }

    /// Chunk types and raw bytes, for verbatim-copy assertions.
    fn chunk_list(bytes: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
        let mut chunks = Vec::new();
        let mut offset = PNG_SIGNATURE.len();
        while offset < bytes.len() {
            let chunk = RawChunk::parse(bytes, offset).unwrap();
            chunks.push((chunk.chunk_type, chunk.raw.to_vec()));
            offset = chunk.end;
        }
        chunks
    }

    fn sample_character() -> Character {
        let mut c = Character::new();
        c.name = "Aria".into();
        c.summary = "A wanderer".into();
        c.first_greeting_message = "Well met.".into();
        c
    }

    #[test]
    fn test_card_roundtrip() {
        let donor = CardImage::Bytes(tiny_png());
        let card = encode(&sample_character(), &donor).unwrap();
        let decoded = decode(&card).unwrap();
        assert_eq!(decoded.name, "Aria");
        assert_eq!(decoded.summary, "A wanderer");
        assert_eq!(decoded.first_greeting_message, "Well met.");
    }

    #[test]
    fn test_donor_pixels_byte_identical() {
        let donor_bytes = tiny_png();
        let card = encode(&sample_character(), &CardImage::Bytes(donor_bytes.clone())).unwrap();
        assert_eq!(pixels(&donor_bytes), pixels(&card));
    }

    #[test]
    fn test_donor_chunks_copied_verbatim() {
        let donor_bytes = tiny_png();
        let card = encode(&sample_character(), &CardImage::Bytes(donor_bytes.clone())).unwrap();

        let donor_chunks = chunk_list(&donor_bytes);
        let card_chunks: Vec<_> = chunk_list(&card)
            .into_iter()
            .filter(|(ty, raw)| {
                !(ty == CHUNK_TYPE_TEXT && raw[8..].starts_with(b"chara\0"))
            })
            .collect();
        assert_eq!(donor_chunks, card_chunks);
    }

    #[test]
    fn test_existing_chara_chunk_replaced_not_duplicated() {
        let donor = CardImage::Bytes(tiny_png());
        let first = encode(&sample_character(), &donor).unwrap();

        let mut renamed = sample_character();
        renamed.name = "Kael".into();
        let second = encode(&renamed, &CardImage::Bytes(first)).unwrap();

        let chara_chunks = chunk_list(&second)
            .into_iter()
            .filter(|(ty, raw)| ty == CHUNK_TYPE_TEXT && raw[8..].starts_with(b"chara\0"))
            .count();
        assert_eq!(chara_chunks, 1);
        assert_eq!(decode(&second).unwrap().name, "Kael");
    }

    #[test]
    fn test_missing_chunk_error() {
        let err = decode(&tiny_png()).unwrap_err();
        assert_eq!(err.kind(), "missing_chunk");
    }

    #[test]
    fn test_invalid_base64_is_a_decode_error() {
        let card = splice_chara_chunk(&tiny_png(), "%%%not-base64%%%").unwrap();
        let err = decode(&card).unwrap_err();
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_invalid_json_is_a_decode_error_distinct_from_base64() {
        let card = splice_chara_chunk(&tiny_png(), &B64.encode(b"not json at all")).unwrap();
        let err = decode(&card).unwrap_err();
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().contains("JSON"));
        assert!(!err.to_string().contains("base64"));
    }

    #[test]
    fn test_non_png_donor_rejected() {
        let err = encode(&sample_character(), &CardImage::Bytes(b"JFIF...".to_vec())).unwrap_err();
        assert_eq!(err.kind(), "format");
    }

    #[test]
    fn test_non_png_bytes_fail_decode_as_format() {
        let err = decode(b"definitely not a png").unwrap_err();
        assert_eq!(err.kind(), "format");
    }
}
