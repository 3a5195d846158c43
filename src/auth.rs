//! Session and authentication against the vendor's Azure B2C identity
//! provider.
//!
//! The provider has no API-friendly password grant; the interactive web
//! login is emulated headlessly: authorize (PKCE challenge, scrape the CSRF
//! and transaction tokens out of the embedded settings blob), post
//! credentials to the self-asserted endpoint, confirm to obtain the
//! authorization code from the redirect, then exchange code + verifier at
//! the token endpoint. Silent refresh replaces the first three steps with a
//! single refresh-token POST. Each scraping step is a small typed function
//! so the brittleness stays contained and fixture-testable.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::RngCore;
use reqwest::header::LOCATION;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::types::lenient_number;
use crate::{Error, Result};

pub(crate) const AZURE_AUTH_URL: &str =
    "https://thermialogin.b2clogin.com/thermialogin.onmicrosoft.com/b2c_1a_signuporsigninonline";
const AZURE_CLIENT_ID: &str = "09ea4903-9e95-45fe-ae1f-e3b7d32fa385";
const AZURE_REDIRECT_URI: &str = "https://online.thermia.se/login";
const AZURE_POLICY: &str = "B2C_1A_SignUpOrSigninOnline";

/// Marker embedded in the self-asserted response body when the provider
/// rejects the credentials client-side (the HTTP status is still 200).
const INVALID_CREDENTIALS_MARKER: &str = r#""status":"400""#;

/// Self-imposed refresh-token lifetime. The vendor grants longer, but a
/// periodic full re-authentication is forced as a safety margin.
const REFRESH_TOKEN_VALID_HOURS: i64 = 12;

/// Username and password. Owned by the authenticator only; the manual
/// `Debug` impl keeps the password out of logs.
pub(crate) struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    access_token_expiry: Option<DateTime<Utc>>,
    refresh_token: Option<String>,
    refresh_token_expiry: Option<DateTime<Utc>>,
}

impl Session {
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let expiry = self.access_token_expiry?;
        if expiry > now {
            self.access_token.as_deref()
        } else {
            None
        }
    }

    fn is_refreshable(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token.is_some()
            && self.refresh_token_expiry.is_some_and(|expiry| expiry > now)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lenient_number")]
    expires_on: Option<f64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub(crate) struct Authenticator {
    /// Dedicated client: the B2C flow is cookie-carried across steps, and
    /// the confirm step's redirect must not be followed.
    http: reqwest::Client,
    auth_base_url: String,
    credentials: Credentials,
    session: Session,
}

impl Authenticator {
    pub fn new(auth_base_url: String, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            http,
            auth_base_url,
            credentials,
            session: Session::default(),
        })
    }

    /// Guarantees a valid session, refreshing or re-authenticating as
    /// needed, and returns the bearer token.
    pub async fn ensure_valid(&mut self) -> Result<String> {
        let now = Utc::now();
        if let Some(token) = self.session.valid_token(now) {
            return Ok(token.to_string());
        }

        if self.session.is_refreshable(now) {
            match self.refresh().await {
                Ok(()) => {
                    if let Some(token) = self.session.valid_token(Utc::now()) {
                        return Ok(token.to_string());
                    }
                }
                Err(err) => {
                    warn!(error = %err, "token refresh failed, falling back to full login");
                }
            }
        }

        self.login().await?;
        self.session
            .valid_token(Utc::now())
            .map(str::to_string)
            .ok_or_else(|| Error::Authentication {
                status: None,
                message: "login succeeded but token is already expired".to_string(),
            })
    }

    async fn refresh(&mut self) -> Result<()> {
        debug!("refreshing access token");
        let refresh_token =
            self.session
                .refresh_token
                .clone()
                .ok_or_else(|| Error::Authentication {
                    status: None,
                    message: "no refresh token available".to_string(),
                })?;

        let url = format!("{}/oauth2/v2.0/token", self.auth_base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", AZURE_CLIENT_ID),
                ("redirect_uri", AZURE_REDIRECT_URI),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("token refresh rejected: {body}"),
            });
        }

        let tokens: TokenResponse = response.json().await.map_err(|err| Error::Network {
            status: None,
            message: format!("invalid token refresh response: {err}"),
        })?;
        self.store_tokens(tokens);
        Ok(())
    }

    /// Full interactive login, emulated headlessly.
    async fn login(&mut self) -> Result<()> {
        debug!("performing full interactive login");
        let (verifier, challenge) = pkce_pair();
        let scope = format!("{AZURE_CLIENT_ID} offline_access openid");

        // Step 1: authorize, scraping CSRF and transaction tokens.
        let url = format!("{}/oauth2/v2.0/authorize", self.auth_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client_id", AZURE_CLIENT_ID),
                ("scope", scope.as_str()),
                ("redirect_uri", AZURE_REDIRECT_URI),
                ("response_type", "code"),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("authorize request rejected: {body}"),
            });
        }
        let html = response.text().await.map_err(Error::Http)?;
        let csrf_token = extract_csrf_token(&html).ok_or_else(|| Error::Network {
            status: None,
            message: "no CSRF token in authorize response".to_string(),
        })?;
        let state_code = extract_state_code(&html).ok_or_else(|| Error::Network {
            status: None,
            message: "no transaction state in authorize response".to_string(),
        })?;

        // Step 2: post credentials.
        let tx = format!("StateProperties={state_code}");
        let url = format!("{}/SelfAsserted", self.auth_base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("tx", tx.as_str()), ("p", AZURE_POLICY)])
            .header("X-CSRF-TOKEN", &csrf_token)
            .form(&[
                ("request_type", "RESPONSE"),
                ("signInName", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() || body.contains(INVALID_CREDENTIALS_MARKER) {
            return Err(Error::Authentication {
                status: Some(status.as_u16()),
                message: "credentials rejected, please check username and password".to_string(),
            });
        }

        // Step 3: confirm, extracting the authorization code from the
        // redirect target.
        let url = format!(
            "{}/api/CombinedSigninAndSignup/confirmed",
            self.auth_base_url
        );
        let response = self
            .http
            .get(&url)
            .query(&[
                ("csrf_token", csrf_token.as_str()),
                ("tx", tx.as_str()),
                ("p", AZURE_POLICY),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        let code = if status.is_redirection() {
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(extract_auth_code)
        } else if status.is_success() {
            extract_auth_code(response.url().as_str())
        } else {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Network {
                status: Some(status.as_u16()),
                message: format!("login confirmation rejected: {body}"),
            });
        };
        let code = code.ok_or_else(|| Error::Authentication {
            status: Some(status.as_u16()),
            message: "no authorization code in confirmation redirect".to_string(),
        })?;

        // Step 4: exchange code + verifier for tokens.
        let url = format!("{}/oauth2/v2.0/token", self.auth_base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", AZURE_CLIENT_ID),
                ("redirect_uri", AZURE_REDIRECT_URI),
                ("scope", scope.as_str()),
                ("code", code.as_str()),
                ("code_verifier", verifier.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                status: Some(status.as_u16()),
                message: format!("token request rejected: {body}"),
            });
        }

        let tokens: TokenResponse = response.json().await.map_err(|err| Error::Network {
            status: None,
            message: format!("invalid token response: {err}"),
        })?;
        self.store_tokens(tokens);
        info!("authentication successful");
        Ok(())
    }

    fn store_tokens(&mut self, tokens: TokenResponse) {
        let now = Utc::now();
        self.session.access_token = Some(tokens.access_token);
        self.session.access_token_expiry = tokens
            .expires_on
            .and_then(|ts| Utc.timestamp_opt(ts as i64, 0).single());
        if tokens.refresh_token.is_some() {
            self.session.refresh_token = tokens.refresh_token;
        }
        self.session.refresh_token_expiry =
            Some(now + Duration::hours(REFRESH_TOKEN_VALID_HOURS));
    }
}

fn pkce_pair() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// Pulls a quoted value out of the `var SETTINGS = {...}` blob the
/// authorize endpoint embeds in its HTML response.
fn extract_settings_value(html: &str, key: &str) -> Option<String> {
    let line = html.lines().find(|line| line.contains("var SETTINGS"))?;
    let marker = format!("\"{key}\":\"");
    let start = line.find(&marker)? + marker.len();
    let tail = &line[start..];
    let end = tail.find('"')?;
    Some(tail[..end].to_string())
}

fn extract_csrf_token(html: &str) -> Option<String> {
    extract_settings_value(html, "csrf")
}

/// The transaction id arrives as `StateProperties=<code>`; only the code
/// part is carried forward.
fn extract_state_code(html: &str) -> Option<String> {
    let trans_id = extract_settings_value(html, "transId")?;
    trans_id
        .split_once('=')
        .map(|(_, code)| code.to_string())
}

fn extract_auth_code(redirect_url: &str) -> Option<String> {
    let (_, tail) = redirect_url.split_once("code=")?;
    let code = tail.split('&').next()?;
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SETTINGS_HTML: &str = concat!(
        "<html><script>\n",
        "var SETTINGS = {\"transId\":\"StateProperties=tx-123\",",
        "\"csrf\":\"csrf-456\",\"hosts\":{}};\n",
        "</script></html>"
    );

    fn test_credentials() -> Credentials {
        Credentials {
            username: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn token_body(access: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "expires_on": (Utc::now() + Duration::hours(6)).timestamp(),
            "refresh_token": "refresh-1",
        })
    }

    async fn mount_full_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/oauth2/v2.0/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SETTINGS_HTML))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/SelfAsserted"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/CombinedSigninAndSignup/confirmed"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                "https://online.thermia.se/login?code=auth-code-1&state=x",
            ))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-1")))
            .mount(server)
            .await;
    }

    #[test]
    fn extracts_csrf_and_state_from_settings_blob() {
        assert_eq!(extract_csrf_token(SETTINGS_HTML).as_deref(), Some("csrf-456"));
        assert_eq!(extract_state_code(SETTINGS_HTML).as_deref(), Some("tx-123"));
        assert!(extract_csrf_token("<html>nothing here</html>").is_none());
    }

    #[test]
    fn extracts_auth_code_from_redirect() {
        assert_eq!(
            extract_auth_code("https://online.thermia.se/login?code=abc&state=x").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_auth_code("https://online.thermia.se/login?code=abc").as_deref(),
            Some("abc")
        );
        assert!(extract_auth_code("https://online.thermia.se/login?error=denied").is_none());
        assert!(extract_auth_code("https://online.thermia.se/login?code=").is_none());
    }

    #[test]
    fn pkce_challenge_is_derived_from_verifier() {
        let (verifier, challenge) = pkce_pair();
        assert_ne!(verifier, challenge);
        assert_eq!(verifier.len(), 43); // 32 bytes, base64url no pad
        assert_eq!(challenge.len(), 43); // sha256 digest, same encoding
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        assert_eq!(challenge, expected);
    }

    #[test]
    fn session_validity_windows() {
        let now = Utc::now();
        let mut session = Session::default();
        assert!(session.valid_token(now).is_none());
        assert!(!session.is_refreshable(now));

        session.access_token = Some("t".to_string());
        session.access_token_expiry = Some(now + Duration::minutes(5));
        assert_eq!(session.valid_token(now), Some("t"));

        session.access_token_expiry = Some(now - Duration::minutes(5));
        assert!(session.valid_token(now).is_none());

        session.refresh_token = Some("r".to_string());
        session.refresh_token_expiry = Some(now + Duration::hours(1));
        assert!(session.is_refreshable(now));

        session.refresh_token_expiry = Some(now - Duration::hours(1));
        assert!(!session.is_refreshable(now));
    }

    #[tokio::test]
    async fn expired_access_with_valid_refresh_uses_silent_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-2")))
            .expect(1)
            .mount(&server)
            .await;
        // Interactive login must not run.
        Mock::given(method("GET"))
            .and(path("/oauth2/v2.0/authorize"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut auth = Authenticator::new(server.uri(), test_credentials()).unwrap();
        auth.session.access_token = Some("stale".to_string());
        auth.session.access_token_expiry = Some(Utc::now() - Duration::minutes(1));
        auth.session.refresh_token = Some("refresh-0".to_string());
        auth.session.refresh_token_expiry = Some(Utc::now() + Duration::hours(1));

        let token = auth.ensure_valid().await.unwrap();
        assert_eq!(token, "access-2");
    }

    #[tokio::test]
    async fn both_tokens_expired_performs_full_login() {
        let server = MockServer::start().await;
        mount_full_login(&server).await;

        let mut auth = Authenticator::new(server.uri(), test_credentials()).unwrap();
        auth.session.access_token_expiry = Some(Utc::now() - Duration::minutes(1));
        auth.session.refresh_token = Some("refresh-0".to_string());
        auth.session.refresh_token_expiry = Some(Utc::now() - Duration::minutes(1));

        let token = auth.ensure_valid().await.unwrap();
        assert_eq!(token, "access-1");
        assert_eq!(auth.session.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_full_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("expired"))
            .mount(&server)
            .await;
        mount_full_login(&server).await;

        let mut auth = Authenticator::new(server.uri(), test_credentials()).unwrap();
        auth.session.refresh_token = Some("refresh-0".to_string());
        auth.session.refresh_token_expiry = Some(Utc::now() + Duration::hours(1));

        let token = auth.ensure_valid().await.unwrap();
        assert_eq!(token, "access-1");
    }

    #[tokio::test]
    async fn valid_session_makes_no_network_calls() {
        let mut auth =
            Authenticator::new("http://127.0.0.1:1".to_string(), test_credentials()).unwrap();
        auth.session.access_token = Some("still-good".to_string());
        auth.session.access_token_expiry = Some(Utc::now() + Duration::minutes(30));

        let token = auth.ensure_valid().await.unwrap();
        assert_eq!(token, "still-good");
    }

    #[tokio::test]
    async fn credentials_rejection_marker_raises_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2.0/authorize"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SETTINGS_HTML))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/SelfAsserted"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"status":"400","message":"wrong password"}"#),
            )
            .mount(&server)
            .await;

        let mut auth = Authenticator::new(server.uri(), test_credentials()).unwrap();
        let err = auth.ensure_valid().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_success_authorize_aborts_with_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2.0/authorize"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let mut auth = Authenticator::new(server.uri(), test_credentials()).unwrap();
        let err = auth.ensure_valid().await.unwrap_err();
        match err {
            Error::Network { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("maintenance"));
            }
            other => panic!("expected Network, got {other:?}"),
        }
    }
}
