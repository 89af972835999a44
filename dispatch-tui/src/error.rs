//! Typed errors for configuration and geocoding.
//!
//! The API client and the binary use `anyhow` with context; these enums cover
//! the places where callers branch on what went wrong.

use std::path::PathBuf;

use thiserror::Error;

/// Problems loading or validating [`crate::config::DispatchConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Backend URL is not set (config `backend.url` or SUPABASE_URL)")]
    MissingBackendUrl,

    #[error("Invalid backend URL '{0}'")]
    InvalidBackendUrl(String),

    #[error("Invalid timeline window {start}:00-{end}:00 (need 0 <= start < end <= 24)")]
    InvalidTimelineWindow { start: f64, end: f64 },

    #[error("Map max zoom {0} is out of range (1-20)")]
    InvalidMaxZoom(u8),

    #[error("Unknown geocoder '{0}'. Valid values: nominatim, google, none")]
    UnknownGeocoder(String),

    #[error("The google geocoder needs an API key (config `geocoder.api_key` or GEOCODER_API_KEY)")]
    MissingGeocoderKey,
}

/// Failures resolving an address.
///
/// "No match" is not an error: providers return `Ok(None)` for that.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Geocoder returned HTTP {status}")]
    Http { status: u16 },

    #[error("Geocoder rejected the request: {0}")]
    Rejected(String),

    #[error("Geocoder returned unreadable coordinates: {0}")]
    BadCoordinates(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_fix() {
        assert!(ConfigError::MissingBackendUrl
            .to_string()
            .contains("SUPABASE_URL"));
        assert!(ConfigError::UnknownGeocoder("bing".into())
            .to_string()
            .contains("nominatim"));
        assert_eq!(
            GeocodeError::Http { status: 429 }.to_string(),
            "Geocoder returned HTTP 429"
        );
    }
}
