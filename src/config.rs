use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_API_VERSION: &str = "v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_url: String,
    pub api_version: String,
    pub stripe_publishable_key: Option<String>,
    pub google_maps_api_key: Option<String>,
    /// Hosts (S3 buckets, CDN) whose images may be displayed.
    pub media_domains: Vec<String>,
    pub state_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let state_dir = match env::var("TAGSHOP_STATE_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .map(|d| d.join("tagshop"))
                .ok_or_else(|| {
                    AppError::Config(
                        "Cannot determine a data directory; set TAGSHOP_STATE_DIR".to_string(),
                    )
                })?,
        };

        Ok(Config {
            api_url: env::var("API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_version: env::var("API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            stripe_publishable_key: non_empty_var("STRIPE_PUBLISHABLE_KEY"),
            google_maps_api_key: non_empty_var("GOOGLE_MAPS_API_KEY"),
            media_domains: env::var("MEDIA_DOMAINS")
                .map(|v| parse_domain_list(&v))
                .unwrap_or_default(),
            state_dir,
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Root every endpoint path is joined onto, e.g. `http://host/api/v1`.
    pub fn api_base_url(&self) -> String {
        let url = self.api_url.trim_end_matches('/');
        let version = self.api_version.trim_matches('/');
        if version.is_empty() {
            format!("{}/api", url)
        } else {
            format!("{}/api/{}", url, version)
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str, api_version: &str) -> Config {
        Config {
            api_url: api_url.to_string(),
            api_version: api_version.to_string(),
            stripe_publishable_key: None,
            google_maps_api_key: None,
            media_domains: vec![],
            state_dir: PathBuf::from("/tmp"),
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_api_base_url_joins_version() {
        assert_eq!(
            config("https://api.example.com/", "v1").api_base_url(),
            "https://api.example.com/api/v1"
        );
        assert_eq!(
            config("https://api.example.com", "").api_base_url(),
            "https://api.example.com/api"
        );
    }

    #[test]
    fn test_parse_domain_list() {
        let domains = parse_domain_list(" Bucket.s3.amazonaws.com, ,cdn.example.com");
        assert_eq!(domains, vec!["bucket.s3.amazonaws.com", "cdn.example.com"]);
    }
}
