//! Client-side input checks. Everything here runs before a request is
//! built; a rejected value never reaches the network.

use crate::api::ApiError;

pub const RING_COUNT_MIN: u32 = 1;
pub const RING_COUNT_MAX: u32 = 5;

/// Content types the server accepts for ringtone uploads.
pub const ALLOWED_SOUND_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/m4a",
    "audio/aac",
    "audio/wav",
    "audio/x-wav",
];

/// Upload cap, matching the server's 8 MB default.
pub const MAX_SOUND_BYTES: usize = 8 * 1024 * 1024;

pub fn ring_count(count: u32) -> Result<u32, ApiError> {
    if (RING_COUNT_MIN..=RING_COUNT_MAX).contains(&count) {
        Ok(count)
    } else {
        Err(ApiError::Validation(format!(
            "ring count must be between {RING_COUNT_MIN} and {RING_COUNT_MAX}, got {count}"
        )))
    }
}

/// Watched URLs must carry an explicit HTTP scheme.
pub fn watch_url(url: &str) -> Result<(), ApiError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "url must start with http:// or https://, got {url:?}"
        )))
    }
}

pub fn email(address: &str) -> Result<(), ApiError> {
    let mut parts = address.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() {
        return Err(ApiError::Validation(format!(
            "malformed email address {address:?}"
        )));
    }
    Ok(())
}

pub fn sound_upload(content_type: &str, len: usize) -> Result<(), ApiError> {
    if !ALLOWED_SOUND_TYPES.contains(&content_type) {
        return Err(ApiError::Validation(format!(
            "unsupported sound type {content_type:?}"
        )));
    }
    if len > MAX_SOUND_BYTES {
        return Err(ApiError::Validation(format!(
            "sound file too large ({len} bytes, max {MAX_SOUND_BYTES})"
        )));
    }
    Ok(())
}
