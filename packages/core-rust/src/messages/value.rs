//! Individual message values stored in a [`Messages`](super::Messages) collection.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Reason
// ---------------------------------------------------------------------------

/// Symbolic failure reasons with a canonical English rendering.
///
/// A reason is resolved to plain text at the moment it is added, so
/// `added(key, Reason::Blank)` and `added(key, "can't be blank")` agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Invalid,
    Blank,
    Empty,
    TooShort { min: usize },
    TooLong { max: usize },
    Taken,
}

impl Reason {
    /// Canonical text for this reason.
    #[must_use]
    pub fn text(self) -> Cow<'static, str> {
        match self {
            Self::Invalid => Cow::Borrowed("is invalid"),
            Self::Blank => Cow::Borrowed("can't be blank"),
            Self::Empty => Cow::Borrowed("can't be empty"),
            Self::TooShort { min } => {
                Cow::Owned(format!("is too short (minimum is {min} characters)"))
            }
            Self::TooLong { max } => {
                Cow::Owned(format!("is too long (maximum is {max} characters)"))
            }
            Self::Taken => Cow::Borrowed("has already been taken"),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

type DeferredFn = Arc<dyn Fn() -> String + Send + Sync>;

/// A single recorded message.
///
/// Either plain text, or a deferred computation evaluated each time the
/// message is formatted or compared.
#[derive(Clone)]
pub enum Message {
    Text(Cow<'static, str>),
    Deferred(DeferredFn),
}

impl Message {
    /// Creates a plain text message.
    pub fn text(text: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(text.into())
    }

    /// Creates a message whose text is computed at format time.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(f))
    }

    /// Returns the current text of this message.
    #[must_use]
    pub fn resolve(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text.as_ref()),
            Self::Deferred(f) => Cow::Owned(f()),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Reason::Invalid.into()
    }
}

impl From<&'static str> for Message {
    fn from(text: &'static str) -> Self {
        Self::Text(Cow::Borrowed(text))
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(Cow::Owned(text))
    }
}

impl From<Reason> for Message {
    fn from(reason: Reason) -> Self {
        Self::Text(reason.text())
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.resolve() == other.resolve()
    }
}

impl Eq for Message {}

impl PartialEq<str> for Message {
    fn eq(&self, other: &str) -> bool {
        self.resolve() == other
    }
}

impl PartialEq<&str> for Message {
    fn eq(&self, other: &&str) -> bool {
        self.resolve() == *other
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Deferred(_) => f.debug_tuple("Deferred").field(&self.resolve()).finish(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolve())
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.resolve())
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn default_message_is_invalid() {
        assert_eq!(Message::default(), "is invalid");
    }

    #[test]
    fn reason_text_includes_bounds() {
        assert_eq!(
            Reason::TooShort { min: 5 }.text(),
            "is too short (minimum is 5 characters)"
        );
        assert_eq!(
            Reason::TooLong { max: 30 }.text(),
            "is too long (maximum is 30 characters)"
        );
    }

    #[test]
    fn text_and_reason_compare_equal() {
        assert_eq!(Message::from(Reason::Blank), Message::from("can't be blank"));
        assert_ne!(Message::from(Reason::Blank), Message::from(Reason::Empty));
    }

    #[test]
    fn deferred_message_is_evaluated_on_each_resolve() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let msg = Message::deferred(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            format!("attempt {n}")
        });

        assert_eq!(msg.resolve(), "attempt 0");
        assert_eq!(msg.resolve(), "attempt 1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn serializes_as_resolved_string() {
        let msg = Message::deferred(|| "computed".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, "\"computed\"");

        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Message::Text(ref t) if t == "computed"));
    }
}
