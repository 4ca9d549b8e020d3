//! Image generation/editing boundary.
//!
//! A thin pass-through to the assistant's image model: a prompt plus an
//! optional source image goes out, inline image bytes and/or text come back.
//! The only logic owned here is validation — we refuse to hand the shell
//! anything we could not decode ourselves.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assistant::InlineData;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_IMAGE_DIMENSION: u32 = 4096;
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StudioError {
    #[error("image payload is empty")]
    Empty,

    #[error("image size {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("image dimensions {width}x{height} exceed maximum of {max}x{max}")]
    DimensionsTooLarge { width: u32, height: u32, max: u32 },

    #[error("inline data is not valid base64: {0}")]
    BadEncoding(String),

    #[error("failed to decode image: {0}")]
    Undecodable(String),
}

/// A source image the rider attached for editing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageAttachment {
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn validate(&self) -> Result<(), StudioError> {
        check_image_bytes(&self.bytes).map(|_| ())
    }

    /// Base64 payload for the wire.
    #[must_use]
    pub fn to_inline_payload(&self) -> (String, String) {
        (self.mime_type.clone(), STANDARD.encode(&self.bytes))
    }
}

/// A decoded, validated image from the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedImage {
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl GeneratedImage {
    /// Displayable reference for shells that render straight from markup.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// The studio's answer: at most one image, plus any commentary text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudioOutcome {
    pub image: Option<GeneratedImage>,
    pub text: Option<String>,
}

impl StudioOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text.is_none()
    }
}

fn check_image_bytes(bytes: &[u8]) -> Result<(u32, u32), StudioError> {
    if bytes.is_empty() {
        return Err(StudioError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(StudioError::TooLarge {
            size: bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }

    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StudioError::Undecodable(e.to_string()))?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| StudioError::Undecodable(e.to_string()))?;

    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(StudioError::DimensionsTooLarge {
            width,
            height,
            max: MAX_IMAGE_DIMENSION,
        });
    }

    Ok((width, height))
}

/// Decode one inline part into a displayable image.
pub fn decode_generated(inline: &InlineData) -> Result<GeneratedImage, StudioError> {
    let bytes = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| StudioError::BadEncoding(e.to_string()))?;

    let (width, height) = check_image_bytes(&bytes)?;

    let mime_type = if inline.mime_type.is_empty() {
        DEFAULT_IMAGE_MIME.to_string()
    } else {
        inline.mime_type.clone()
    };

    Ok(GeneratedImage {
        bytes,
        mime_type,
        width,
        height,
    })
}
