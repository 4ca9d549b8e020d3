//! Wire types for the generative-language collaborator.
//!
//! The assistant is an opaque HTTP service: we build a `generateContent`
//! request, the shell's HTTP stack carries it, and we pick the destination
//! (or generated image) out of whatever comes back. All fields tolerate
//! absence on the way in; the selection rules below decide what counts as a
//! usable answer.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Destination, ValidatedCoordinate};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_SEARCH_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const API_KEY_HEADER: &str = "x-goog-api-key";

pub const SEARCH_SYSTEM_INSTRUCTION: &str = "You are a ride hailing assistant. \
    Your goal is to identify the specific location the user wants to go to. Be concise.";

/// Fallback display name when the assistant grounds a place but titles
/// nothing.
pub const UNNAMED_DESTINATION: &str = "Destination Found";

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_base: String,
    pub api_key: SecretString,
    pub search_model: String,
    pub image_model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: SecretString::new(String::new()),
            search_model: DEFAULT_SEARCH_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl AssistantConfig {
    #[must_use]
    pub fn generate_content_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        )
    }

    #[must_use]
    pub fn expose_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload, exactly as it travels on the wire.
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    #[must_use]
    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoogleMapsTool {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps: Option<GoogleMapsTool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_lng: Option<LatLng>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_config: Option<RetrievalConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<ToolConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MapsChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    #[serde(default)]
    pub maps: Option<MapsChunk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, in part-arrival order.
    /// `None` when there is no text at all.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn grounding_chunks(&self) -> &[GroundingChunk] {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.as_slice())
            .unwrap_or_default()
    }
}

#[must_use]
pub fn search_request(
    query: &str,
    location: Option<ValidatedCoordinate>,
) -> GenerateContentRequest {
    let prompt = format!(
        "Find the destination described by: \"{query}\". \
         Return a short, helpful description of the place."
    );

    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part::text(prompt)],
        }],
        system_instruction: Some(Content {
            parts: vec![Part::text(SEARCH_SYSTEM_INSTRUCTION)],
        }),
        tools: vec![Tool {
            google_maps: Some(GoogleMapsTool {}),
        }],
        tool_config: location.map(|coord| ToolConfig {
            retrieval_config: Some(RetrievalConfig {
                lat_lng: Some(LatLng {
                    latitude: coord.lat(),
                    longitude: coord.lng(),
                }),
            }),
        }),
    }
}

/// Pick a destination out of a search response.
///
/// The first grounding chunk carrying a parseable map URI wins; every later
/// chunk is ignored. A response with neither a map reference nor any text is
/// a legitimate no-match, reported as `None` rather than an error.
#[must_use]
pub fn destination_from_response(response: &GenerateContentResponse) -> Option<Destination> {
    let mut map_uri = None;
    let mut title = None;

    for chunk in response.grounding_chunks() {
        if let Some(maps) = &chunk.maps {
            if let Some(uri) = maps.uri.as_deref() {
                if Url::parse(uri).is_ok() {
                    map_uri = Some(uri.to_string());
                    title = maps.title.clone();
                    break;
                }
            }
        }
    }

    let description = response.text();

    if map_uri.is_none() && description.is_none() {
        return None;
    }

    Some(Destination {
        name: title.unwrap_or_else(|| UNNAMED_DESTINATION.to_string()),
        address: None,
        map_uri,
        description,
    })
}

#[cfg(feature = "studio")]
#[must_use]
pub fn image_request(prompt: &str, source: Option<(String, String)>) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(2);
    if let Some((mime_type, data)) = source {
        parts.push(Part::inline(mime_type, data));
    }
    parts.push(Part::text(prompt));

    GenerateContentRequest {
        contents: vec![Content { parts }],
        system_instruction: None,
        tools: Vec::new(),
        tool_config: None,
    }
}

/// Raw studio output: the first inline image part, plus all text parts
/// concatenated in arrival order.
#[cfg(feature = "studio")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedParts {
    pub image: Option<InlineData>,
    pub text: Option<String>,
}

#[cfg(feature = "studio")]
#[must_use]
pub fn generated_parts(response: &GenerateContentResponse) -> GeneratedParts {
    let mut out = GeneratedParts::default();

    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    for part in parts {
        if let Some(inline) = &part.inline_data {
            if out.image.is_none() {
                out.image = Some(inline.clone());
            }
        } else if let Some(text) = &part.text {
            match &mut out.text {
                Some(acc) => acc.push_str(text),
                None => out.text = Some(text.clone()),
            }
        }
    }

    out
}
