use std::fmt;

/// Connection settings for the coordination service.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// API token, sent as the basic-auth password.
    pub api_token: String,
    /// Basic-auth user name. Empty when unset.
    pub username: Option<String>,
}

impl ApiConfig {
    /// The hosted service.
    pub const DEFAULT_URL: &str = "https://app-api.testledger.dev";

    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_token: api_token.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

// The token never appears in logs.
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let cfg = ApiConfig::new("http://localhost:8080/", "tok");
        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(
            cfg.endpoint("/orchestration/claim"),
            "http://localhost:8080/orchestration/claim"
        );
        assert_eq!(
            cfg.endpoint("projects"),
            "http://localhost:8080/projects"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = ApiConfig::new(ApiConfig::DEFAULT_URL, "super-secret").with_username("ci");
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("ci"));
    }
}
