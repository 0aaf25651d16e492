//! Attribute humanization and full-message formatting.

/// Attribute key for messages not tied to a specific field.
///
/// Full messages on this key are rendered without an attribute prefix.
pub const BASE: &str = "base";

/// Turns an attribute key into a human-readable label.
///
/// Dots become underscores, leading underscores and a trailing `_id` are
/// dropped, remaining underscores become spaces, and the result is
/// lower-cased with its first letter capitalized.
#[must_use]
pub fn humanize(attribute: &str) -> String {
    let normalized = attribute.replace('.', "_");
    let trimmed = normalized.trim_start_matches('_');
    let trimmed = trimmed.strip_suffix("_id").unwrap_or(trimmed);
    let spaced = trimmed.replace('_', " ").to_lowercase();

    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Formats `message` for `attribute` as `"<Humanized attribute> <message>"`.
///
/// Messages on [`BASE`] are returned verbatim.
#[must_use]
pub fn full_message(attribute: &str, message: &str) -> String {
    if attribute == BASE {
        return message.to_string();
    }
    format!("{} {}", humanize(attribute), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_simple_key() {
        assert_eq!(humanize("name"), "Name");
    }

    #[test]
    fn humanize_drops_id_suffix_and_splits_words() {
        assert_eq!(humanize("user_id"), "User");
        assert_eq!(humanize("first_name"), "First name");
        assert_eq!(humanize("address.zip_code"), "Address zip code");
    }

    #[test]
    fn humanize_edge_cases() {
        assert_eq!(humanize(""), "");
        assert_eq!(humanize("id"), "Id");
        assert_eq!(humanize("_secret"), "Secret");
        assert_eq!(humanize("EMAIL"), "Email");
    }

    #[test]
    fn base_messages_have_no_prefix() {
        assert_eq!(full_message(BASE, "conflict"), "conflict");
        assert_eq!(full_message("name", "x"), "Name x");
    }
}
