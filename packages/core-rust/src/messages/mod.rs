//! Ordered, multi-valued error and warning collections.
//!
//! A [`Messages`] maps attribute keys to lists of [`Message`] values. Keys keep
//! their first-insertion order and messages keep their insertion order, so
//! flattened views such as [`Messages::full_messages`] are deterministic.
//! Serializes to a plain `{key: [messages...]}` mapping.

pub mod format;
pub mod value;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StrictValidationFailed;

pub use format::{full_message, humanize, BASE};
pub use value::{Message, Reason};

// ---------------------------------------------------------------------------
// AddOptions
// ---------------------------------------------------------------------------

/// Options accepted by [`Messages::add_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Fail with [`StrictValidationFailed`] instead of recording the message.
    pub strict: bool,
}

impl AddOptions {
    /// Options with `strict` set.
    pub const STRICT: Self = Self { strict: true };
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Ordered attribute-key to message-list collection.
#[derive(Clone, Default)]
pub struct Messages {
    messages: IndexMap<String, Vec<Message>>,
}

impl Messages {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages recorded for `key`, or `None` if the key is absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[Message]> {
        self.messages.get(key).map(Vec::as_slice)
    }

    /// Returns the list for `key`, inserting an empty list if it is absent.
    pub fn entry(&mut self, key: &str) -> &mut Vec<Message> {
        self.messages.entry(key.to_string()).or_default()
    }

    /// Replaces the list for `key`, returning the previous one.
    pub fn set(&mut self, key: &str, messages: Vec<Message>) -> Option<Vec<Message>> {
        self.messages.insert(key.to_string(), messages)
    }

    /// Removes `key`, returning its messages. Remaining keys keep their order.
    pub fn delete(&mut self, key: &str) -> Option<Vec<Message>> {
        self.messages.shift_remove(key)
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// True if `key` holds at least one message.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.messages.get(key).is_some_and(|list| !list.is_empty())
    }

    /// Keys in first-insertion order, including keys with empty lists.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.messages.keys().map(String::as_str)
    }

    /// Message lists in key order.
    pub fn values(&self) -> impl Iterator<Item = &[Message]> + '_ {
        self.messages.values().map(Vec::as_slice)
    }

    /// Appends `message` to `key`.
    pub fn add(&mut self, key: &str, message: impl Into<Message>) {
        self.entry(key).push(message.into());
    }

    /// Appends `message` to `key`, honoring `options`.
    ///
    /// # Errors
    ///
    /// With `options.strict`, nothing is recorded and the full formatted
    /// message is returned as [`StrictValidationFailed`].
    pub fn add_with(
        &mut self,
        key: &str,
        message: impl Into<Message>,
        options: AddOptions,
    ) -> Result<(), StrictValidationFailed> {
        let message = message.into();
        if options.strict {
            return Err(StrictValidationFailed {
                attribute: key.to_string(),
                message: full_message(key, &message.resolve()),
            });
        }
        self.entry(key).push(message);
        Ok(())
    }

    /// True if `message` has been recorded on `key`.
    #[must_use]
    pub fn added(&self, key: &str, message: impl Into<Message>) -> bool {
        let message = message.into();
        self.messages
            .get(key)
            .is_some_and(|list| list.contains(&message))
    }

    /// Concatenates every list of `other` onto the matching key of `self`.
    pub fn merge(&mut self, other: &Messages) {
        for (key, list) in &other.messages {
            self.entry(key).extend(list.iter().cloned());
        }
    }

    /// True if every key's list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.values().all(Vec::is_empty)
    }

    /// Total number of messages across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    /// Yields one `(key, message)` pair per message, in key then insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Message)> + '_ {
        self.messages
            .iter()
            .flat_map(|(key, list)| list.iter().map(move |msg| (key.as_str(), msg)))
    }

    /// Formats `message` for `key`. See [`full_message`].
    #[must_use]
    pub fn full_message(&self, key: &str, message: &Message) -> String {
        full_message(key, &message.resolve())
    }

    /// All messages formatted with their attribute label, in iteration order.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.iter()
            .map(|(key, msg)| self.full_message(key, msg))
            .collect()
    }

    /// Formatted messages for a single key. Empty if the key is absent.
    #[must_use]
    pub fn full_messages_for(&self, key: &str) -> Vec<String> {
        self.get(key)
            .unwrap_or_default()
            .iter()
            .map(|msg| self.full_message(key, msg))
            .collect()
    }

    /// Snapshot as `key -> [text]`, with full messages when `full` is set.
    #[must_use]
    pub fn to_hash(&self, full: bool) -> IndexMap<String, Vec<String>> {
        self.messages
            .iter()
            .map(|(key, list)| {
                let rendered = list
                    .iter()
                    .map(|msg| {
                        if full {
                            self.full_message(key, msg)
                        } else {
                            msg.resolve().into_owned()
                        }
                    })
                    .collect();
                (key.clone(), rendered)
            })
            .collect()
    }

    /// JSON form of [`Messages::to_hash`].
    #[must_use]
    pub fn as_json(&self, full: bool) -> serde_json::Value {
        let object = self
            .to_hash(full)
            .into_iter()
            .map(|(key, list)| {
                let list = list.into_iter().map(serde_json::Value::String).collect();
                (key, serde_json::Value::Array(list))
            })
            .collect();
        serde_json::Value::Object(object)
    }
}

impl PartialEq for Messages {
    fn eq(&self, other: &Self) -> bool {
        self.to_hash(false) == other.to_hash(false)
    }
}

impl Eq for Messages {}

impl fmt::Debug for Messages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.to_hash(false)).finish()
    }
}

impl Serialize for Messages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.messages.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Messages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IndexMap::<String, Vec<Message>>::deserialize(deserializer).map(|messages| Self { messages })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_collection_is_empty() {
        let messages = Messages::new();
        assert!(messages.is_empty());
        assert_eq!(messages.len(), 0);
        assert!(messages.full_messages().is_empty());
    }

    #[test]
    fn add_makes_collection_non_empty() {
        let mut messages = Messages::new();
        messages.add("name", "can't be blank");
        assert!(!messages.is_empty());
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn multiple_messages_on_one_key_keep_order() {
        let mut messages = Messages::new();
        messages.add("name", "can't be blank");
        messages.add("name", "too short");

        assert_eq!(
            messages.full_messages(),
            vec!["Name can't be blank", "Name too short"]
        );
        assert_eq!(messages.get("name").map(<[Message]>::len), Some(2));
    }

    #[test]
    fn base_key_has_no_prefix() {
        let mut messages = Messages::new();
        messages.add(BASE, "conflict");

        assert_eq!(messages.full_message(BASE, &"conflict".into()), "conflict");
        assert_eq!(messages.full_message("name", &"x".into()), "Name x");
        assert_eq!(messages.full_messages(), vec!["conflict"]);
    }

    #[test]
    fn added_matches_exact_message_only() {
        let mut messages = Messages::new();
        messages.add("name", "can't be blank");

        assert!(messages.added("name", "can't be blank"));
        assert!(messages.added("name", Reason::Blank));
        assert!(!messages.added("name", "is too long"));
        assert!(!messages.added("email", "can't be blank"));
    }

    #[test]
    fn default_reason_is_invalid() {
        let mut messages = Messages::new();
        messages.add(BASE, Message::default());
        assert!(messages.added(BASE, Reason::Invalid));
        assert_eq!(messages.full_messages(), vec!["is invalid"]);
    }

    #[test]
    fn strict_add_fails_without_recording() {
        let mut messages = Messages::new();
        let err = messages
            .add_with("name", Reason::Blank, AddOptions::STRICT)
            .unwrap_err();

        assert_eq!(err.attribute, "name");
        assert_eq!(err.message, "Name can't be blank");
        assert_eq!(err.to_string(), "Name can't be blank");
        assert!(messages.is_empty());
        assert!(messages.get("name").is_none());
    }

    #[test]
    fn non_strict_add_with_records() {
        let mut messages = Messages::new();
        messages
            .add_with("name", "is odd", AddOptions::default())
            .unwrap();
        assert!(messages.added("name", "is odd"));
    }

    #[test]
    fn entry_auto_creates_empty_list() {
        let mut messages = Messages::new();
        assert!(messages.get("name").is_none());

        messages.entry("name");
        assert_eq!(messages.get("name").map(<[Message]>::len), Some(0));
        assert_eq!(messages.keys().collect::<Vec<_>>(), vec!["name"]);
        // A key holding an empty list still counts as empty.
        assert!(messages.is_empty());
        assert!(!messages.contains_key("name"));
    }

    #[test]
    fn set_delete_and_clear() {
        let mut messages = Messages::new();
        messages.add("a", "one");
        messages.add("b", "two");
        messages.add("c", "three");

        let previous = messages.set("b", vec!["replaced".into()]);
        assert_eq!(previous.unwrap(), vec![Message::from("two")]);

        let removed = messages.delete("a").unwrap();
        assert_eq!(removed, vec![Message::from("one")]);
        assert!(messages.delete("a").is_none());
        assert_eq!(messages.keys().collect::<Vec<_>>(), vec!["b", "c"]);

        messages.clear();
        assert!(messages.is_empty());
        assert_eq!(messages.keys().count(), 0);
    }

    #[test]
    fn iteration_yields_one_pair_per_message() {
        let mut messages = Messages::new();
        messages.add("name", "a");
        messages.add("email", "b");
        messages.add("name", "c");

        let pairs: Vec<(&str, String)> = messages
            .iter()
            .map(|(k, m)| (k, m.resolve().into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("name", "a".to_string()),
                ("name", "c".to_string()),
                ("email", "b".to_string()),
            ]
        );
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn full_messages_for_missing_key_is_empty() {
        let mut messages = Messages::new();
        messages.add("name", "a");
        assert!(messages.full_messages_for("email").is_empty());
        assert_eq!(messages.full_messages_for("name"), vec!["Name a"]);
    }

    #[test]
    fn to_hash_raw_and_full() {
        let mut messages = Messages::new();
        messages.add("user_id", Reason::Blank);
        messages.add(BASE, "conflict");

        let raw = messages.to_hash(false);
        assert_eq!(raw["user_id"], vec!["can't be blank"]);
        assert_eq!(raw[BASE], vec!["conflict"]);

        let full = messages.to_hash(true);
        assert_eq!(full["user_id"], vec!["User can't be blank"]);
        assert_eq!(full[BASE], vec!["conflict"]);
    }

    #[test]
    fn json_forms() {
        let mut messages = Messages::new();
        messages.add("name", "can't be blank");

        assert_eq!(
            serde_json::to_value(&messages).unwrap(),
            serde_json::json!({"name": ["can't be blank"]})
        );
        assert_eq!(
            messages.as_json(true),
            serde_json::json!({"name": ["Name can't be blank"]})
        );

        let back: Messages = serde_json::from_str(r#"{"name":["can't be blank"]}"#).unwrap();
        assert_eq!(back, messages);
    }

    #[test]
    fn merge_concatenates_per_key() {
        let mut left = Messages::new();
        left.add("name", "a");
        let mut right = Messages::new();
        right.add("name", "b");
        right.add(BASE, "c");

        left.merge(&right);
        assert_eq!(left.full_messages(), vec!["Name a", "Name b", "c"]);
    }

    #[test]
    fn deferred_message_formats_at_read_time() {
        let mut messages = Messages::new();
        messages.add("quota", Message::deferred(|| format!("exceeds {}", 10)));
        assert_eq!(messages.full_messages(), vec!["Quota exceeds 10"]);
        assert!(messages.added("quota", "exceeds 10"));
    }

    #[test]
    fn equality_is_structural() {
        let mut a = Messages::new();
        a.add("name", "x");
        let mut b = Messages::new();
        b.add("name", Message::deferred(|| "x".to_string()));
        assert_eq!(a, b);

        b.add("name", "y");
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn len_tracks_every_add(
            entries in prop::collection::vec(("[a-z_]{1,8}", "[a-z ]{0,12}"), 0..32)
        ) {
            let mut messages = Messages::new();
            for (key, text) in &entries {
                messages.add(key, text.clone());
            }

            prop_assert_eq!(messages.len(), entries.len());
            prop_assert_eq!(messages.iter().count(), entries.len());
            prop_assert_eq!(messages.full_messages().len(), entries.len());
            prop_assert_eq!(messages.is_empty(), entries.is_empty());
        }

        #[test]
        fn keys_keep_first_insertion_order(
            entries in prop::collection::vec(("[a-c]{1,2}", "[a-z]{1,4}"), 0..32)
        ) {
            let mut messages = Messages::new();
            let mut expected: Vec<String> = Vec::new();
            for (key, text) in &entries {
                messages.add(key, text.clone());
                if !expected.contains(key) {
                    expected.push(key.clone());
                }
            }

            let keys: Vec<String> = messages.keys().map(str::to_string).collect();
            prop_assert_eq!(keys, expected);
        }
    }
}
