//! Bounded message payloads with tracking signatures.
//!
//! A [`Message`] carries a text or binary payload through the sink pipeline.
//! Every message has a mandatory tracking signature used for cross-system
//! correlation, an optional tag, and an age measuring the gap between
//! origination and observation. Text payloads keep an unformatted pattern plus
//! an argument list so formatting cost is only paid when a sink actually
//! renders the message.

use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Maximum byte length of a tracking signature.
///
/// A hyphenated UUID is exactly this long, which is also what auto-generated
/// signatures are.
pub const MAX_SIGNATURE_LENGTH: usize = 36;

/// Maximum byte length of a message tag; longer tags are truncated.
pub const MAX_TAG_LENGTH: usize = 256;

/// Error returned when constructing a message with an invalid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// The signature was empty
    EmptySignature,
    /// The signature exceeded [`MAX_SIGNATURE_LENGTH`] bytes
    SignatureTooLong {
        /// Byte length of the rejected signature
        length: usize,
    },
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageError::EmptySignature => write!(f, "message signature must not be empty"),
            MessageError::SignatureTooLong { length } => write!(
                f,
                "message signature is {} bytes, maximum is {}",
                length, MAX_SIGNATURE_LENGTH
            ),
        }
    }
}

impl std::error::Error for MessageError {}

/// The payload carried by a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Unformatted text pattern plus arguments, formatted lazily
    Text {
        /// Pattern with `{}` placeholders
        pattern: String,
        /// Arguments substituted for the placeholders in order
        args: Vec<String>,
    },
    /// Raw byte payload
    Binary(Vec<u8>),
}

/// A bounded payload with a unique tracking signature.
///
/// The signature is mandatory, non-empty, and at most
/// [`MAX_SIGNATURE_LENGTH`] bytes; [`Message::new`] generates one from a v4
/// UUID. The tag is optional, truncated to [`MAX_TAG_LENGTH`] bytes on a
/// character boundary, and an empty tag normalizes to absent. The size tracks
/// the unformatted payload length and is recomputed whenever the body is set.
#[derive(Debug, Clone)]
pub struct Message {
    signature: String,
    tag: Option<String>,
    body: MessageBody,
    size: usize,
    age_micros: u64,
    origin_wall: SystemTime,
}

impl Message {
    /// Create a message with an auto-generated signature.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let size = pattern.len();
        Self {
            signature: Uuid::new_v4().to_string(),
            tag: None,
            body: MessageBody::Text {
                pattern,
                args: Vec::new(),
            },
            size,
            age_micros: 0,
            origin_wall: SystemTime::now(),
        }
    }

    /// Create a message with a caller-supplied signature.
    ///
    /// # Errors
    /// Fails if the signature is empty or longer than
    /// [`MAX_SIGNATURE_LENGTH`] bytes.
    pub fn with_signature(
        signature: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Result<Self, MessageError> {
        let signature = signature.into();
        if signature.is_empty() {
            return Err(MessageError::EmptySignature);
        }
        if signature.len() > MAX_SIGNATURE_LENGTH {
            return Err(MessageError::SignatureTooLong {
                length: signature.len(),
            });
        }
        let mut message = Self::new(pattern);
        message.signature = signature;
        Ok(message)
    }

    /// Get the tracking signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Get the tag, if one is set.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Set the tag.
    ///
    /// An empty tag is normalized to absent; a tag longer than
    /// [`MAX_TAG_LENGTH`] bytes is truncated on a character boundary.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = normalize_tag(tag.into());
    }

    /// Builder-style form of [`Message::set_tag`].
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.set_tag(tag);
        self
    }

    /// Replace the text payload, recomputing the size.
    pub fn set_text(&mut self, pattern: impl Into<String>, args: Vec<String>) {
        let pattern = pattern.into();
        self.size = pattern.len();
        self.body = MessageBody::Text { pattern, args };
    }

    /// Builder-style argument list for a text payload.
    ///
    /// Has no effect on binary payloads.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        if let MessageBody::Text {
            args: ref mut slot, ..
        } = self.body
        {
            *slot = args;
        }
        self
    }

    /// Replace the payload with raw bytes, recomputing the size.
    pub fn set_binary(&mut self, bytes: Vec<u8>) {
        self.size = bytes.len();
        self.body = MessageBody::Binary(bytes);
    }

    /// Get the payload.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Render the payload as text.
    ///
    /// For text payloads this substitutes each `{}` placeholder with the next
    /// argument; surplus placeholders are left as-is. Binary payloads render
    /// as a length marker. Formatting cost is only paid here, not at
    /// construction.
    pub fn text(&self) -> String {
        match &self.body {
            MessageBody::Text { pattern, args } => format_pattern(pattern, args),
            MessageBody::Binary(bytes) => format!("[{} bytes]", bytes.len()),
        }
    }

    /// Get the payload size in bytes (unformatted).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the age in microseconds between origination and observation.
    pub fn age_micros(&self) -> u64 {
        self.age_micros
    }

    /// Set the age directly, in microseconds.
    pub fn set_age_micros(&mut self, age_micros: u64) {
        self.age_micros = age_micros;
    }

    /// Record the observation time, deriving the age from the origination
    /// wall clock. Observation before origination yields zero.
    pub fn observed_at(&mut self, wall: SystemTime) {
        let elapsed = wall
            .duration_since(self.origin_wall)
            .unwrap_or_default()
            .as_micros();
        self.age_micros = u64::try_from(elapsed).unwrap_or(u64::MAX);
    }

    /// Get the wall-clock origination time.
    pub fn origin_wall(&self) -> SystemTime {
        self.origin_wall
    }
}

/// Truncate to the tag bound on a character boundary; empty becomes absent.
fn normalize_tag(tag: String) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    if tag.len() <= MAX_TAG_LENGTH {
        return Some(tag);
    }
    let mut end = MAX_TAG_LENGTH;
    while !tag.is_char_boundary(end) {
        end -= 1;
    }
    Some(tag[..end].to_string())
}

fn format_pattern(pattern: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    let mut args_iter = args.iter();
    while let Some(idx) = rest.find("{}") {
        out.push_str(&rest[..idx]);
        match args_iter.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[idx + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generated_signature_is_exactly_at_bound() {
        let message = Message::new("hello");
        assert_eq!(message.signature().len(), MAX_SIGNATURE_LENGTH);
    }

    #[test]
    fn test_generated_signatures_are_unique() {
        let a = Message::new("hello");
        let b = Message::new("hello");
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_explicit_signature_accepted() {
        let message = Message::with_signature("order-1234", "payload").unwrap();
        assert_eq!(message.signature(), "order-1234");
    }

    #[test]
    fn test_empty_signature_rejected() {
        let err = Message::with_signature("", "payload").unwrap_err();
        assert_eq!(err, MessageError::EmptySignature);
    }

    #[test]
    fn test_overlong_signature_rejected() {
        let signature = "x".repeat(MAX_SIGNATURE_LENGTH + 1);
        let err = Message::with_signature(signature, "payload").unwrap_err();
        assert_eq!(
            err,
            MessageError::SignatureTooLong {
                length: MAX_SIGNATURE_LENGTH + 1
            }
        );
    }

    #[test]
    fn test_signature_at_exact_bound_accepted() {
        let signature = "x".repeat(MAX_SIGNATURE_LENGTH);
        let message = Message::with_signature(signature.clone(), "payload").unwrap();
        assert_eq!(message.signature(), signature);
    }

    #[test]
    fn test_empty_tag_normalizes_to_absent() {
        let message = Message::new("payload").with_tag("");
        assert_eq!(message.tag(), None);
    }

    #[test]
    fn test_tag_at_exact_bound_preserved() {
        let tag = "t".repeat(MAX_TAG_LENGTH);
        let message = Message::new("payload").with_tag(tag.clone());
        assert_eq!(message.tag(), Some(tag.as_str()));
    }

    #[test]
    fn test_overlong_tag_truncated() {
        let tag = "t".repeat(MAX_TAG_LENGTH + 50);
        let message = Message::new("payload").with_tag(tag);
        assert_eq!(message.tag().unwrap().len(), MAX_TAG_LENGTH);
    }

    #[test]
    fn test_overlong_tag_truncates_on_char_boundary() {
        // Multi-byte characters straddling the boundary must not be split.
        let tag = "é".repeat(MAX_TAG_LENGTH); // 2 bytes each
        let message = Message::new("payload").with_tag(tag);
        let kept = message.tag().unwrap();
        assert!(kept.len() <= MAX_TAG_LENGTH);
        assert!(kept.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_lazy_formatting_substitutes_in_order() {
        let message = Message::new("user {} did {}")
            .with_args(vec!["alice".to_string(), "login".to_string()]);
        assert_eq!(message.text(), "user alice did login");
    }

    #[test]
    fn test_surplus_placeholders_left_intact() {
        let message = Message::new("a={} b={}").with_args(vec!["1".to_string()]);
        assert_eq!(message.text(), "a=1 b={}");
    }

    #[test]
    fn test_size_tracks_unformatted_pattern() {
        let mut message = Message::new("12345");
        assert_eq!(message.size(), 5);

        message.set_text("1234567890", vec!["ignored".to_string()]);
        assert_eq!(message.size(), 10);
    }

    #[test]
    fn test_binary_body_size_and_rendering() {
        let mut message = Message::new("text");
        message.set_binary(vec![0u8; 16]);
        assert_eq!(message.size(), 16);
        assert_eq!(message.text(), "[16 bytes]");
    }

    #[test]
    fn test_age_defaults_to_zero() {
        let message = Message::new("payload");
        assert_eq!(message.age_micros(), 0);
    }

    #[test]
    fn test_observed_age_is_non_negative() {
        let mut message = Message::new("payload");
        let origin = message.origin_wall();

        message.observed_at(origin + Duration::from_millis(5));
        assert_eq!(message.age_micros(), 5_000);

        // Observation before origination saturates at zero
        message.observed_at(origin - Duration::from_secs(1));
        assert_eq!(message.age_micros(), 0);
    }
}
