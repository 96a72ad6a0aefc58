use anyhow::{Context, Result, bail};
use route_flow::MapConfig;

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the recommendation API, without the `/api/v1/...` path.
    pub api_url: String,
    pub api_token: Option<String>,
    pub port: u16,
    pub map: MapConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(api_url) = lookup("RECOMMENDATION_API_URL").filter(|v| !v.trim().is_empty())
        else {
            bail!("RECOMMENDATION_API_URL environment variable is required");
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            api_url,
            api_token: lookup("RECOMMENDATION_API_TOKEN").filter(|v| !v.is_empty()),
            port,
            map: MapConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("RECOMMENDATION_API_URL", "http://api:8000")]))
                .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.api_token, None);
        assert_eq!(config.map.default_zoom, 14);
    }

    #[test]
    fn test_api_url_is_required() {
        assert!(ServiceConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("RECOMMENDATION_API_URL", " ")])).is_err());
    }

    #[test]
    fn test_bad_port_is_an_error() {
        let result = ServiceConfig::from_lookup(lookup(&[
            ("RECOMMENDATION_API_URL", "http://api"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_token_and_port() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("RECOMMENDATION_API_URL", "http://api"),
            ("RECOMMENDATION_API_TOKEN", "secret"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.port, 8080);
    }
}
