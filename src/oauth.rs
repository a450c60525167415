//! Google OAuth handshake: consent URL and authorization-code exchange.
//! Tokens are handed back to the HTTP layer, which stores them in cookies.

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

pub const SCOPES: &[&str] = &[
  "https://www.googleapis.com/auth/forms.body",
  "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, Error)]
pub enum OAuthError {
  #[error("invalid OAuth endpoint: {0}")]
  Url(String),

  #[error("token exchange transport error: {0}")]
  Transport(String),

  #[error("token exchange HTTP {status}: {message}")]
  Http { status: u16, message: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenSet {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub expires_in: Option<u64>,
}

#[derive(Clone)]
pub struct GoogleOAuth {
  client: reqwest::Client,
  client_id: String,
  client_secret: String,
  redirect_uri: String,
}

impl GoogleOAuth {
  pub fn new(client: reqwest::Client, client_id: String, client_secret: String, redirect_uri: String) -> Self {
    Self { client, client_id, client_secret, redirect_uri }
  }

  /// Consent URL asking for offline access so a refresh token is issued.
  pub fn authorize_url(&self) -> Result<Url, OAuthError> {
    Url::parse_with_params(
      AUTH_ENDPOINT,
      &[
        ("client_id", self.client_id.as_str()),
        ("redirect_uri", self.redirect_uri.as_str()),
        ("response_type", "code"),
        ("scope", &SCOPES.join(" ")),
        ("access_type", "offline"),
        ("include_granted_scopes", "true"),
        ("prompt", "consent"),
      ],
    )
    .map_err(|e| OAuthError::Url(e.to_string()))
  }

  #[instrument(level = "info", skip_all)]
  pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, OAuthError> {
    let params = [
      ("code", code),
      ("client_id", self.client_id.as_str()),
      ("client_secret", self.client_secret.as_str()),
      ("redirect_uri", self.redirect_uri.as_str()),
      ("grant_type", "authorization_code"),
    ];
    let res = self.client.post(TOKEN_ENDPOINT)
      .form(&params)
      .send()
      .await
      .map_err(|e| OAuthError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let message = res.text().await.unwrap_or_default();
      return Err(OAuthError::Http { status, message });
    }
    let tokens: TokenSet = res.json().await.map_err(|e| OAuthError::Transport(e.to_string()))?;
    info!(has_refresh = tokens.refresh_token.is_some(), expires_in = ?tokens.expires_in, "OAuth tokens issued");
    Ok(tokens)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn authorize_url_requests_forms_scopes_and_offline_access() {
    let oauth = GoogleOAuth::new(
      reqwest::Client::new(),
      "client-123".into(),
      "secret".into(),
      "https://app.example/api/auth/google".into(),
    );
    let url = oauth.authorize_url().unwrap();
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(pairs["client_id"], "client-123");
    assert_eq!(pairs["redirect_uri"], "https://app.example/api/auth/google");
    assert_eq!(pairs["access_type"], "offline");
    assert_eq!(pairs["prompt"], "consent");
    assert!(pairs["scope"].contains("forms.body"));
    assert!(pairs["scope"].contains("drive.file"));
    assert!(!url.as_str().contains("secret"));
  }
}
