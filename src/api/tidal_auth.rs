use super::callback::CallbackListener;
use super::pkce::{self, PkcePair};
use super::TokenSource;
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const AUTHORIZE_URL: &str = "https://login.tidal.com/authorize";
pub const REDIRECT_URI: &str = "http://localhost:8080/callback";
const CALLBACK_BIND_ADDR: &str = "127.0.0.1:8080";
pub const SCOPES: &[&str] = &[
    "user.read",
    "collection.read",
    "collection.write",
    "playlists.read",
    "playlists.write",
];
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Tokens expiring within this window are renewed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Token as persisted in `token.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn expires_within(&self, secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(secs) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// Refresh responses may omit the refresh token; keep the previous one then.
    fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in.unwrap_or(3600)),
        }
    }
}

/// Obtains, persists and renews the OAuth token used for API calls.
pub struct AuthManager {
    client: Client,
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
    auth_base: String,
    token: tokio::sync::Mutex<Option<StoredToken>>,
}

impl AuthManager {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("failed to build HTTP client")?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_path: default_token_path()?,
            auth_base: Self::default_auth_base(),
            token: tokio::sync::Mutex::new(None),
        })
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_auth_base(mut self, base: impl Into<String>) -> Self {
        self.auth_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    fn default_auth_base() -> String {
        std::env::var("TIDAL_AUTH_BASE").unwrap_or_else(|_| "https://auth.tidal.com".into())
    }

    fn token_url(&self) -> String {
        format!("{}/v1/oauth2/token", self.auth_base)
    }

    fn basic_auth(&self) -> String {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", self.client_id, self.client_secret))
        )
    }

    /// Interactive authorization-code login with PKCE. Opens the browser (or
    /// prints the URL) and waits up to five minutes for the redirect.
    pub async fn login(&self) -> Result<StoredToken> {
        let pkce = PkcePair::generate();
        let state = uuid::Uuid::new_v4().to_string();
        let url = pkce::authorize_url(
            AUTHORIZE_URL,
            &self.client_id,
            REDIRECT_URI,
            SCOPES,
            &state,
            &pkce,
        )?;

        let listener = CallbackListener::bind(CALLBACK_BIND_ADDR, &state).await?;

        println!("Please open the following URL in your browser to authenticate:");
        println!("{}", url);
        if webbrowser::open(url.as_str()).is_err() {
            warn!("could not open a browser; open the URL above manually");
        }
        println!("\nWaiting for authentication...");

        let code = listener.wait_for_code(LOGIN_TIMEOUT).await?;
        let token = self
            .exchange_code(&code, &pkce.verifier)
            .await
            .context("failed to exchange code for token")?;

        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    /// Trade an authorization code for a token and persist it.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<StoredToken> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", REDIRECT_URI),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", verifier),
        ];
        let token = self.request_token(&params, None).await?;
        self.save_token(&token).context("failed to save token")?;
        Ok(token)
    }

    /// Non-interactive login; the resulting token has no refresh token.
    pub async fn login_with_client_credentials(&self) -> Result<StoredToken> {
        let token = self.client_credentials_token().await?;
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn client_credentials_token(&self) -> Result<StoredToken> {
        let token = self
            .request_token(&[("grant_type", "client_credentials")], None)
            .await
            .context("client credentials login failed")?;
        self.save_token(&token).context("failed to save token")?;
        Ok(token)
    }

    /// Renew `current`. Without a refresh token this falls back to the
    /// client-credentials login.
    pub async fn refresh(&self, current: &StoredToken) -> Result<StoredToken> {
        let refresh_token = match &current.refresh_token {
            Some(rt) if !rt.is_empty() => rt.clone(),
            _ => {
                debug!("no refresh token; using client credentials");
                return self.client_credentials_token().await;
            }
        };
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let token = self
            .request_token(&params, Some(refresh_token.clone()))
            .await
            .context("failed to refresh token")?;
        self.save_token(&token)
            .context("failed to save refreshed token")?;
        info!("TIDAL token refreshed, expires at {}", token.expires_at);
        Ok(token)
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<StoredToken> {
        let resp = self
            .client
            .post(self.token_url())
            .header(AUTHORIZATION, self.basic_auth())
            .form(params)
            .send()
            .await
            .context("token request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            ));
        }
        let tr: TokenResponse = resp
            .json()
            .await
            .context("failed to parse token response")?;
        Ok(tr.into_stored(previous_refresh))
    }

    /// Read the persisted token; `Ok(None)` when there is none yet.
    pub fn load_token(&self) -> Result<Option<StoredToken>> {
        let data = match std::fs::read_to_string(&self.token_path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading {}", self.token_path.display()))
            }
        };
        let token: StoredToken = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", self.token_path.display()))?;
        Ok(Some(token))
    }

    /// Write the token file, owner-only on Unix.
    pub fn save_token(&self, token: &StoredToken) -> Result<()> {
        if let Some(dir) = self
            .token_path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        let data = serde_json::to_string_pretty(token)?;
        write_private(&self.token_path, data.as_bytes())
            .with_context(|| format!("writing {}", self.token_path.display()))?;
        Ok(())
    }

    /// A token that is valid for at least another minute.
    ///
    /// A missing token file, or an expired token without a refresh token, is
    /// retried through the client-credentials login before giving up.
    pub async fn get_valid_token(&self) -> Result<StoredToken> {
        let mut lock = self.token.lock().await;
        if lock.is_none() {
            *lock = self.load_token()?;
        }

        let current = match lock.clone() {
            Some(t) => t,
            None => {
                warn!("no saved token at {}, trying client credentials", self.token_path.display());
                let token = self.client_credentials_token().await.map_err(|e| {
                    anyhow!(
                        "no saved token found, please run 'tidal-playlist auth' first ({:#})",
                        e
                    )
                })?;
                *lock = Some(token.clone());
                return Ok(token);
            }
        };

        if current.expires_within(REFRESH_MARGIN_SECS) {
            let fresh = self.refresh(&current).await.map_err(|e| {
                anyhow!(
                    "token expired and could not be renewed, please run 'tidal-playlist auth' ({:#})",
                    e
                )
            })?;
            *lock = Some(fresh.clone());
            return Ok(fresh);
        }

        Ok(current)
    }
}

#[async_trait::async_trait]
impl TokenSource for AuthManager {
    async fn bearer(&self) -> Result<String> {
        let token = self.get_valid_token().await?;
        Ok(format!("Bearer {}", token.access_token))
    }
}

/// `<config dir>/tidal-playlist/token.json`
pub fn default_token_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("cannot determine config directory"))?;
    Ok(base.join("tidal-playlist").join("token.json"))
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    f.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    f.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}
