//! Configuration for dispatch-tui.
//!
//! Settings come from `config.toml` (by default under the user's config
//! directory), then environment variables, then command-line flags. A missing
//! file is fine; every field has a default except the backend URL.
//!
//! ```toml
//! [backend]
//! url = "https://project.supabase.co"
//! anon_key = "eyJ..."
//! timeout_secs = 30
//!
//! [timeline]
//! start_hour = 6
//! end_hour = 20
//!
//! [map]
//! home_lat = 33.749
//! home_lng = -84.388
//! home_zoom = 12
//! max_zoom = 15
//!
//! [geocoder]
//! provider = "nominatim"   # nominatim | google | none
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geocode::{GOOGLE_URL, NOMINATIM_URL};
use crate::markers::{LatLng, Viewport, DEFAULT_MAX_ZOOM};
use crate::timeline::TimelineWindow;

pub const APP_DIR: &str = "dispatch-tui";

/// Which geocoding service resolves job addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProvider {
    #[default]
    Nominatim,
    Google,
    /// No geocoding; the map stays empty
    None,
}

impl std::fmt::Display for GeocoderProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeocoderProvider::Nominatim => write!(f, "nominatim"),
            GeocoderProvider::Google => write!(f, "google"),
            GeocoderProvider::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for GeocoderProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nominatim" | "osm" => Ok(GeocoderProvider::Nominatim),
            "google" => Ok(GeocoderProvider::Google),
            "none" | "off" => Ok(GeocoderProvider::None),
            _ => Err(ConfigError::UnknownGeocoder(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    #[serde(default)]
    pub url: Option<String>,
    /// Public anon key sent as `apikey` and bearer token
    #[serde(default)]
    pub anon_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default)]
    pub start_hour: f64,
    #[serde(default = "default_end_hour")]
    pub end_hour: f64,
}

fn default_end_hour() -> f64 {
    24.0
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            start_hour: 0.0,
            end_hour: default_end_hour(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_home_lat")]
    pub home_lat: f64,
    #[serde(default = "default_home_lng")]
    pub home_lng: f64,
    #[serde(default = "default_home_zoom")]
    pub home_zoom: u8,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

// Atlanta, GA
fn default_home_lat() -> f64 {
    33.749
}

fn default_home_lng() -> f64 {
    -84.388
}

fn default_home_zoom() -> u8 {
    12
}

fn default_max_zoom() -> u8 {
    DEFAULT_MAX_ZOOM
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            home_lat: default_home_lat(),
            home_lng: default_home_lng(),
            home_zoom: default_home_zoom(),
            max_zoom: default_max_zoom(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default)]
    pub provider: GeocoderProvider,
    /// Required for the google provider
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override the provider's endpoint (self-hosted Nominatim, proxies)
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("{}/{}", APP_DIR, env!("CARGO_PKG_VERSION"))
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: GeocoderProvider::default(),
            api_key: None,
            base_url: None,
            user_agent: default_user_agent(),
        }
    }
}

impl GeocoderConfig {
    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.as_str(),
            (None, GeocoderProvider::Google) => GOOGLE_URL,
            (None, _) => NOMINATIM_URL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the rolling log file
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("logs")
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// `<config dir>/dispatch-tui/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` (or the default location); defaults if the file
    /// doesn't exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::default_path(),
        };

        match path {
            Some(p) if p.exists() => Self::load(&p),
            _ => Ok(Self::default()),
        }
    }

    /// Apply process environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable lookup. Blank values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("SUPABASE_URL") {
            self.backend.url = Some(url);
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            self.backend.anon_key = Some(key);
        }
        if let Some(provider) = get("DISPATCH_GEOCODER") {
            self.geocoder.provider = provider.parse()?;
        }
        if let Some(key) = get("GEOCODER_API_KEY") {
            self.geocoder.api_key = Some(key);
        }
        Ok(())
    }

    /// Check everything the app needs before it touches the terminal
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self
            .backend
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingBackendUrl)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBackendUrl(url.to_string()));
        }

        if TimelineWindow::new(self.timeline.start_hour, self.timeline.end_hour).is_none() {
            return Err(ConfigError::InvalidTimelineWindow {
                start: self.timeline.start_hour,
                end: self.timeline.end_hour,
            });
        }

        if !(1..=20).contains(&self.map.max_zoom) {
            return Err(ConfigError::InvalidMaxZoom(self.map.max_zoom));
        }

        if self.geocoder.provider == GeocoderProvider::Google
            && self.geocoder.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingGeocoderKey);
        }

        Ok(())
    }

    /// Validated timeline window (full day if the values are out of range)
    pub fn timeline_window(&self) -> TimelineWindow {
        TimelineWindow::new(self.timeline.start_hour, self.timeline.end_hour).unwrap_or_default()
    }

    /// Map view used when there are no markers to fit
    pub fn home_viewport(&self) -> Viewport {
        Viewport::new(
            LatLng::new(self.map.home_lat, self.map.home_lng),
            self.map.home_zoom.min(self.map.max_zoom),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid() -> DispatchConfig {
        let mut config = DispatchConfig::default();
        config.backend.url = Some("https://demo.supabase.co".to_string());
        config
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.map.max_zoom, 15);
        assert_eq!(config.geocoder.provider, GeocoderProvider::Nominatim);
        assert_eq!(config.timeline_window(), TimelineWindow::FULL_DAY);
        assert_eq!(config.home_viewport().zoom, 12);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: DispatchConfig = toml::from_str(
            r#"
[backend]
url = "https://demo.supabase.co"

[timeline]
start_hour = 6
end_hour = 20

[geocoder]
provider = "google"
api_key = "k"
"#,
        )
        .unwrap();

        assert_eq!(config.backend.url.as_deref(), Some("https://demo.supabase.co"));
        assert_eq!(config.timeline_window().span(), 14.0);
        assert_eq!(config.geocoder.endpoint(), GOOGLE_URL);
        assert_eq!(config.map.home_lat, 33.749);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nurl = \"https://file.supabase.co\"").unwrap();

        let config = DispatchConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.backend.url.as_deref(), Some("https://file.supabase.co"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = DispatchConfig::load_or_default(Some(missing.as_path())).unwrap();
        assert!(config.backend.url.is_none());
    }

    #[test]
    fn test_bad_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend\nurl = 3").unwrap();

        let err = DispatchConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed { .. }));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://env.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("DISPATCH_GEOCODER", "none"),
            ("GEOCODER_API_KEY", " "),
        ]
        .into_iter()
        .collect();

        let mut config = valid();
        config
            .apply_env_with(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend.url.as_deref(), Some("https://env.supabase.co"));
        assert_eq!(config.backend.anon_key.as_deref(), Some("anon"));
        assert_eq!(config.geocoder.provider, GeocoderProvider::None);
        assert!(config.geocoder.api_key.is_none());
    }

    #[test]
    fn test_env_rejects_unknown_geocoder() {
        let mut config = valid();
        let result = config.apply_env_with(|k| (k == "DISPATCH_GEOCODER").then(|| "bing".to_string()));
        assert!(matches!(result, Err(ConfigError::UnknownGeocoder(_))));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            DispatchConfig::default().validate(),
            Err(ConfigError::MissingBackendUrl)
        ));

        let mut config = valid();
        config.backend.url = Some("demo.supabase.co".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBackendUrl(_))));

        let mut config = valid();
        config.timeline.start_hour = 18.0;
        config.timeline.end_hour = 8.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimelineWindow { .. })
        ));

        let mut config = valid();
        config.map.max_zoom = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxZoom(0))));

        let mut config = valid();
        config.geocoder.provider = GeocoderProvider::Google;
        assert!(matches!(config.validate(), Err(ConfigError::MissingGeocoderKey)));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OSM".parse::<GeocoderProvider>().unwrap(), GeocoderProvider::Nominatim);
        assert_eq!("google".parse::<GeocoderProvider>().unwrap(), GeocoderProvider::Google);
        assert!("bing".parse::<GeocoderProvider>().is_err());
    }
}
