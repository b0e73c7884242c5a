use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use redona_geo::GeocoderConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// `None` when geocoding is switched off.
    pub geocoder: Option<GeocoderConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; tests pass a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("REDONA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("REDONA_JWT_SECRET is unset or still a placeholder; it must match the account service's secret");
        }

        let host = var("REDONA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("REDONA_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("REDONA_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path = var("REDONA_DB_PATH").unwrap_or_else(|| "redona.db".into()).into();

        let enabled = var("REDONA_GEOCODING_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        let geocoder = if enabled {
            let defaults = GeocoderConfig::default();
            Some(GeocoderConfig {
                nominatim_url: var("REDONA_NOMINATIM_URL").unwrap_or(defaults.nominatim_url),
                photon_url: var("REDONA_PHOTON_URL").unwrap_or(defaults.photon_url),
                country: match var("REDONA_GEOCODE_COUNTRY") {
                    Some(c) if c.eq_ignore_ascii_case("none") => None,
                    Some(c) => Some(c),
                    None => defaults.country,
                },
                max_attempts: match var("REDONA_GEOCODE_MAX_ATTEMPTS") {
                    Some(v) => v.parse().context("REDONA_GEOCODE_MAX_ATTEMPTS must be a number")?,
                    None => defaults.max_attempts,
                },
                timeout: match var("REDONA_GEOCODE_TIMEOUT_SECS") {
                    Some(v) => Duration::from_secs(
                        v.parse().context("REDONA_GEOCODE_TIMEOUT_SECS must be a number of seconds")?,
                    ),
                    None => defaults.timeout,
                },
                user_agent: var("REDONA_USER_AGENT").unwrap_or(defaults.user_agent),
            })
        } else {
            None
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            geocoder,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("REDONA_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("redona.db"));
        let geo = cfg.geocoder.unwrap();
        assert_eq!(geo.max_attempts, 6);
        assert_eq!(geo.country.as_deref(), Some("Spain"));
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("REDONA_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("REDONA_JWT_SECRET", "s3cret"),
            ("REDONA_HOST", "127.0.0.1"),
            ("REDONA_PORT", "8080"),
            ("REDONA_GEOCODE_COUNTRY", "none"),
            ("REDONA_GEOCODE_MAX_ATTEMPTS", "2"),
            ("REDONA_GEOCODE_TIMEOUT_SECS", "1"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.port(), 8080);
        let geo = cfg.geocoder.unwrap();
        assert_eq!(geo.country, None);
        assert_eq!(geo.max_attempts, 2);
        assert_eq!(geo.timeout, Duration::from_secs(1));
    }

    #[test]
    fn geocoding_can_be_disabled() {
        let cfg = config(&[("REDONA_JWT_SECRET", "s3cret"), ("REDONA_GEOCODING_ENABLED", "false")]).unwrap();
        assert!(cfg.geocoder.is_none());
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(config(&[("REDONA_JWT_SECRET", "s3cret"), ("REDONA_PORT", "http")]).is_err());
    }
}
