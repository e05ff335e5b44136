use crate::config::ConfigurationParameters;
use crate::utils::error::{describe_response, NetilionError, Result};
use crate::utils::validation::is_below;
use serde::Deserialize;

fn issued_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// OAuth2 access token as issued by Netilion. Times are unix seconds.
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "issued_now")]
    pub created_at: i64,
    pub expires_in: i64,
}

impl AccessToken {
    pub fn expires_at(&self) -> i64 {
        self.created_at + self.expires_in
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at() <= now
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("created_at", &self.created_at)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Resource owner password grant. Netilion does not honour refresh grants,
/// so an expired token is replaced by running this again.
pub async fn fetch_token(
    http: &reqwest::Client,
    config: &ConfigurationParameters,
) -> Result<AccessToken> {
    if !is_below(&config.endpoint, &config.oauth_token_url) {
        return Err(NetilionError::ForeignUrl {
            url: config.oauth_token_url.clone(),
        });
    }

    tracing::info!("Getting new access token");
    let form = [
        ("grant_type", "password"),
        ("username", config.username.as_str()),
        ("password", config.password.as_str()),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
    ];
    let response = http
        .post(&config.oauth_token_url)
        .form(&form)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::error!("❌ Token request rejected with HTTP {}", status.as_u16());
        return Err(NetilionError::TokenError {
            status: status.as_u16(),
            message: describe_response(status, &body),
        });
    }

    serde_json::from_str(&body).map_err(|e| NetilionError::TokenError {
        status: status.as_u16(),
        message: format!("unreadable token response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn token(created_at: i64, expires_in: i64) -> AccessToken {
        AccessToken {
            access_token: "acctok".to_string(),
            refresh_token: None,
            token_type: Some("bearer".to_string()),
            created_at,
            expires_in,
        }
    }

    fn configuration(server: &MockServer) -> ConfigurationParameters {
        ConfigurationParameters::new(server.base_url(), "id", "secret", "user", "pass")
    }

    #[test]
    fn test_expiry() {
        let token = token(1_000, 100);
        assert_eq!(token.expires_at(), 1_100);
        assert!(!token.is_expired_at(1_099));
        assert!(token.is_expired_at(1_100));
        assert!(token.is_expired_at(5_000));
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", token(1, 2));
        assert!(!rendered.contains("acctok"));
    }

    #[tokio::test]
    async fn test_password_grant_form() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token/")
                .x_www_form_urlencoded_tuple("grant_type", "password")
                .x_www_form_urlencoded_tuple("username", "user")
                .x_www_form_urlencoded_tuple("password", "pass")
                .x_www_form_urlencoded_tuple("client_id", "id")
                .x_www_form_urlencoded_tuple("client_secret", "secret");
            then.status(200).json_body(json!({
                "access_token": "acctok",
                "refresh_token": "reftok",
                "token_type": "bearer",
                "created_at": 1_700_000_000,
                "expires_in": 7200
            }));
        });

        let token = fetch_token(&reqwest::Client::new(), &configuration(&server))
            .await
            .unwrap();

        token_mock.assert();
        assert_eq!(token.access_token, "acctok");
        assert_eq!(token.refresh_token.as_deref(), Some("reftok"));
        assert_eq!(token.expires_at(), 1_700_007_200);
    }

    #[tokio::test]
    async fn test_missing_created_at_defaults_to_now() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token/");
            then.status(200)
                .json_body(json!({"access_token": "acctok", "expires_in": 60}));
        });

        let before = chrono::Utc::now().timestamp();
        let token = fetch_token(&reqwest::Client::new(), &configuration(&server))
            .await
            .unwrap();
        assert!(token.created_at >= before);
        assert!(!token.is_expired_at(before));
    }

    #[tokio::test]
    async fn test_rejected_grant() {
        let server = MockServer::start();
        let errors = json!({"errors": [{"type": "invalid_grant", "message": "bad credentials"}]});
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token/");
            then.status(401).json_body(errors);
        });

        let err = fetch_token(&reqwest::Client::new(), &configuration(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, NetilionError::TokenError { status: 401, .. }));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_unreadable_token_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/oauth/token/");
            then.status(200).body("<html>maintenance</html>");
        });

        let err = fetch_token(&reqwest::Client::new(), &configuration(&server))
            .await
            .unwrap_err();
        assert!(matches!(err, NetilionError::TokenError { status: 200, .. }));
        assert!(err.to_string().contains("unreadable token response"));
    }

    #[tokio::test]
    async fn test_foreign_token_url() {
        let endpoint = "https://host.local";
        let mut config = ConfigurationParameters::new(endpoint, "id", "secret", "u", "p");
        config.oauth_token_url = "https://elsewhere.local/oauth/token/".to_string();

        let err = fetch_token(&reqwest::Client::new(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, NetilionError::ForeignUrl { .. }));
    }
}
