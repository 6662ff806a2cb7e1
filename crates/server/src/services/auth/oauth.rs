//! OAuth 2.0 authorization-code sign-in for Google, Facebook and GitHub.
//!
//! Each provider differs only in endpoints, scopes and profile shape. The
//! flow is the same: redirect to the provider with a random `state`, exchange
//! the returned code for an access token, then fetch the profile.

use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use ubuntu_lend_core::AuthProvider;

use super::AuthError;
use crate::config::OAuthClientConfig;

const USER_AGENT: &str = "ubuntu-lend";

struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    scope: &'static str,
}

const fn endpoints(provider: AuthProvider) -> Option<Endpoints> {
    match provider {
        AuthProvider::Google => Some(Endpoints {
            authorize: "https://accounts.google.com/o/oauth2/v2/auth",
            token: "https://oauth2.googleapis.com/token",
            scope: "openid email profile",
        }),
        AuthProvider::Facebook => Some(Endpoints {
            authorize: "https://www.facebook.com/v19.0/dialog/oauth",
            token: "https://graph.facebook.com/v19.0/oauth/access_token",
            scope: "email public_profile",
        }),
        AuthProvider::Github => Some(Endpoints {
            authorize: "https://github.com/login/oauth/authorize",
            token: "https://github.com/login/oauth/access_token",
            scope: "read:user user:email",
        }),
        AuthProvider::Phone | AuthProvider::Credentials => None,
    }
}

/// Profile returned by a provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: AuthProvider,
    /// The provider's stable account identifier.
    pub account_id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct GithubProfile {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Split a display name into first and last name on the last space.
fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.rsplit_once(' ') {
        Some((first, last)) => (first.trim().to_string(), last.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Callback URL registered with each provider.
#[must_use]
pub fn redirect_uri(base_url: &str, provider: AuthProvider) -> String {
    format!("{base_url}/api/auth/oauth/{provider}/callback")
}

/// A configured OAuth client for one provider.
pub struct OAuthClient<'a> {
    provider: AuthProvider,
    endpoints: Endpoints,
    credentials: &'a OAuthClientConfig,
    http: &'a reqwest::Client,
}

impl<'a> OAuthClient<'a> {
    /// Build a client for `provider`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ProviderNotConfigured` for providers that are not
    /// OAuth providers or have no credentials.
    pub fn new(
        provider: AuthProvider,
        credentials: Option<&'a OAuthClientConfig>,
        http: &'a reqwest::Client,
    ) -> Result<Self, AuthError> {
        let endpoints = endpoints(provider).ok_or(AuthError::ProviderNotConfigured(provider))?;
        let credentials = credentials.ok_or(AuthError::ProviderNotConfigured(provider))?;
        Ok(Self {
            provider,
            endpoints,
            credentials,
            http,
        })
    }

    /// URL to send the browser to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuthExchange` if the URL cannot be built.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            self.endpoints.authorize,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", self.endpoints.scope),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::OAuthExchange(e.to_string()))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuthExchange` if the provider rejects the code.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http
            .post(self.endpoints.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::OAuthExchange(format!(
                "{} token exchange failed ({status}): {text}",
                self.provider
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuthExchange` if the profile request fails.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        match self.provider {
            AuthProvider::Google => self.fetch_google(access_token).await,
            AuthProvider::Facebook => self.fetch_facebook(access_token).await,
            AuthProvider::Github => self.fetch_github(access_token).await,
            other => Err(AuthError::ProviderNotConfigured(other)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AuthError::OAuthExchange(format!(
                "{} profile request failed ({})",
                self.provider,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn fetch_google(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let profile: GoogleProfile = self
            .get_json("https://openidconnect.googleapis.com/v1/userinfo", access_token)
            .await?;
        let (first_name, last_name) = match (profile.given_name, profile.family_name) {
            (Some(first), last) => (first, last.unwrap_or_default()),
            (None, _) => split_name(profile.name.as_deref().unwrap_or_default()),
        };
        Ok(OAuthProfile {
            provider: AuthProvider::Google,
            account_id: profile.sub,
            email: profile.email.filter(|_| profile.email_verified),
            first_name,
            last_name,
            avatar_url: profile.picture,
        })
    }

    async fn fetch_facebook(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let profile: FacebookProfile = self
            .get_json(
                "https://graph.facebook.com/me?fields=id,email,first_name,last_name,picture",
                access_token,
            )
            .await?;
        Ok(OAuthProfile {
            provider: AuthProvider::Facebook,
            account_id: profile.id,
            email: profile.email,
            first_name: profile.first_name.unwrap_or_default(),
            last_name: profile.last_name.unwrap_or_default(),
            avatar_url: profile.picture.map(|p| p.data.url),
        })
    }

    async fn fetch_github(&self, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let profile: GithubProfile = self
            .get_json("https://api.github.com/user", access_token)
            .await?;

        // Private emails are only listed on the emails endpoint
        let email = match profile.email {
            Some(email) => Some(email),
            None => {
                let emails: Vec<GithubEmail> = self
                    .get_json("https://api.github.com/user/emails", access_token)
                    .await?;
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
            }
        };

        let (first_name, last_name) =
            split_name(profile.name.as_deref().unwrap_or(profile.login.as_str()));
        Ok(OAuthProfile {
            provider: AuthProvider::Github,
            account_id: profile.id.to_string(),
            email,
            first_name,
            last_name,
            avatar_url: profile.avatar_url,
        })
    }
}
