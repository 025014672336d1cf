//! Identity attributes attached to a client.
//!
//! A profile is an arbitrary JSON object resolved by an external identity
//! provider and carried in the session. Only a handful of keys have meaning
//! inside Parlor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the display name.
pub const NAME_KEY: &str = "name";

/// Key holding the avatar URL supplied by the identity provider.
pub const AVATAR_URL_KEY: &str = "avatar_url";

/// Key holding the email address.
pub const EMAIL_KEY: &str = "email";

/// Name used when a profile carries no usable display name.
pub const ANONYMOUS_NAME: &str = "anonymous";

/// Profile attributes for a connected user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(Map<String, Value>);

impl Profile {
    /// Create an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a profile from a JSON value, which must be an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a raw attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get an attribute if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The display name, if present and non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME_KEY).filter(|n| !n.trim().is_empty())
    }

    /// The display name, falling back to [`ANONYMOUS_NAME`].
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or(ANONYMOUS_NAME)
    }

    /// Whether the profile has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying attribute map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Profile {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_from_value() {
        let profile = Profile::from_value(json!({"name": "Ada", "email": "ada@example.com"}))
            .expect("object");
        assert_eq!(profile.name(), Some("Ada"));
        assert_eq!(profile.get_str(EMAIL_KEY), Some("ada@example.com"));

        assert!(Profile::from_value(json!("Ada")).is_none());
        assert!(Profile::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(Profile::new().display_name(), ANONYMOUS_NAME);
        assert_eq!(Profile::new().with("name", "  ").display_name(), ANONYMOUS_NAME);
        assert_eq!(Profile::new().with("name", 42).display_name(), ANONYMOUS_NAME);
        assert_eq!(Profile::new().with("name", "Bo").display_name(), "Bo");
    }

    #[test]
    fn test_profile_serializes_as_plain_object() {
        let profile = Profile::new().with("name", "Ada");
        let text = serde_json::to_string(&profile).unwrap();
        assert_eq!(text, r#"{"name":"Ada"}"#);

        let back: Profile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, profile);
    }
}
