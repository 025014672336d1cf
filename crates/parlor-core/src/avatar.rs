//! Avatar resolution.
//!
//! An [`Avatar`] turns a user's profile into a picture URL. Resolution is a
//! pure function of the profile; failing with [`AvatarError::NoAvatarUrl`]
//! means "try another source", never a hard error.

use crate::profile::{Profile, AVATAR_URL_KEY, EMAIL_KEY};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Base URL for hash-derived avatars.
pub const GRAVATAR_BASE_URL: &str = "https://www.gravatar.com/avatar/";

/// Avatar resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvatarError {
    /// The source cannot provide a URL for this profile.
    #[error("unable to get an avatar URL")]
    NoAvatarUrl,
}

/// Types capable of producing a profile picture URL.
pub trait Avatar: Send + Sync {
    /// Get the avatar URL for the given profile.
    ///
    /// # Errors
    ///
    /// Returns [`AvatarError::NoAvatarUrl`] when this source has nothing for
    /// the profile.
    fn avatar_url(&self, profile: &Profile) -> Result<String, AvatarError>;
}

/// Reads the URL supplied by the identity provider at login.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthAvatar;

impl Avatar for AuthAvatar {
    fn avatar_url(&self, profile: &Profile) -> Result<String, AvatarError> {
        profile
            .get(AVATAR_URL_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(AvatarError::NoAvatarUrl)
    }
}

/// Derives a Gravatar URL from the profile's email address.
#[derive(Debug, Clone, Copy, Default)]
pub struct GravatarAvatar;

impl GravatarAvatar {
    /// Hash an email address the way Gravatar expects it.
    #[must_use]
    pub fn hash_email(email: &str) -> String {
        let normalized = email.trim().to_lowercase();
        hex::encode(Sha256::digest(normalized.as_bytes()))
    }
}

impl Avatar for GravatarAvatar {
    fn avatar_url(&self, profile: &Profile) -> Result<String, AvatarError> {
        let email = profile
            .get_str(EMAIL_KEY)
            .filter(|e| !e.trim().is_empty())
            .ok_or(AvatarError::NoAvatarUrl)?;
        Ok(format!("{GRAVATAR_BASE_URL}{}", Self::hash_email(email)))
    }
}

/// Tries each source in order and returns the first URL found.
#[derive(Default)]
pub struct TryAvatars {
    sources: Vec<Box<dyn Avatar>>,
}

impl TryAvatars {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source to the chain.
    #[must_use]
    pub fn with(mut self, source: impl Avatar + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The default chain: provider URL, then Gravatar.
    #[must_use]
    pub fn standard() -> Self {
        Self::new().with(AuthAvatar).with(GravatarAvatar)
    }
}

impl Avatar for TryAvatars {
    fn avatar_url(&self, profile: &Profile) -> Result<String, AvatarError> {
        self.sources
            .iter()
            .find_map(|source| source.avatar_url(profile).ok())
            .ok_or(AvatarError::NoAvatarUrl)
    }
}
