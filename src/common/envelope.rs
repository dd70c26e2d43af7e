use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Everything published on the shared topic.
///
/// Serialized as `{ "type": ..., "payload": { ... } }`. Messages with an
/// unrecognised `type` fail to decode and are dropped by [`WireMessage::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WireMessage {
    #[serde(rename = "newNote")]
    NewNote(NoteRequest),
    #[serde(rename = "throttled")]
    Throttled(ThrottleNotice),
    #[serde(rename = "presence")]
    Presence(PresenceAnnouncement),
}

impl WireMessage {
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(message) => Some(message),
            Err(err) => {
                log::debug!("Ignoring undecodable wire message: {err}");
                None
            }
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Outbound note request. The text is raw: trimming and checks happen on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRequest {
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(default, deserialize_with = "text_lossy")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleNotice {
    #[serde(rename = "targetId")]
    pub target_id: String,
    /// `0` when the sender gave no usable value.
    #[serde(rename = "retryMs", default, deserialize_with = "millis_lossy")]
    pub retry_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceAnnouncement {
    #[serde(rename = "participantId")]
    pub participant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message has {chars} characters, limit is {max}")]
    TooLong { chars: usize, max: usize },
    #[error("sender {0} is not a known participant")]
    UnknownSender(String),
}

/// Trims `raw` and checks it against the length cap.
pub fn normalize_message(raw: &str, max_chars: usize) -> Result<String, Rejection> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(Rejection::EmptyMessage);
    }

    let chars = message.chars().count();
    if chars > max_chars {
        return Err(Rejection::TooLong {
            chars,
            max: max_chars,
        });
    }

    Ok(message.to_string())
}

/// Accepts any JSON scalar as text; `null` becomes empty.
fn text_lossy<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// Accepts any JSON number (fractions round up) or numeric string as
/// milliseconds; `null`, negatives and other values become `0`.
fn millis_lossy<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match Value::deserialize(deserializer)? {
        Value::Number(number) => match number.as_u64() {
            Some(ms) => return Ok(ms),
            None => number.as_f64(),
        },
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(millis
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map_or(0, |ms| ms.ceil() as u64))
}
