use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::api_types::{
  ApiAuthError, ApiExplanationPatch, ApiNewNote, ApiNote, ApiRestError, ApiSession,
  ApiSignUpResponse, ApiUser,
};
use super::types::{Credentials, Note, NoteDraft, NoteId, NoteUpdate, Session, SignUpOutcome, User};
use super::Backend;
use crate::error::{AuthError, Error, Result};

const NOTES_TABLE: &str = "rest/v1/notes";

/// Supabase REST client (GoTrue auth + PostgREST)
#[derive(Clone)]
pub struct SupabaseClient {
  http: reqwest::Client,
  base: Url,
  api_key: String,
}

impl SupabaseClient {
  pub fn new(url: &str, api_key: String) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends with '/'
    let normalized = if url.ends_with('/') {
      url.to_string()
    } else {
      format!("{}/", url)
    };
    let base = Url::parse(&normalized)
      .map_err(|e| Error::Configuration(format!("Invalid backend URL {}: {}", url, e)))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("notefie/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base,
      api_key,
    })
  }

  #[cfg(test)]
  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| Error::Configuration(format!("Invalid endpoint {}: {}", path, e)))
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
    Ok(
      self
        .http
        .request(method, self.endpoint(path)?)
        .header("apikey", &self.api_key),
    )
  }

  fn authed(&self, method: Method, path: &str, access_token: &str) -> Result<RequestBuilder> {
    Ok(self.request(method, path)?.bearer_auth(access_token))
  }

  async fn auth_error(response: Response) -> Error {
    let status = response.status();
    let body: ApiAuthError = response.json().await.unwrap_or_default();
    debug!(%status, message = %body.message(), "auth request rejected");
    if status.is_server_error() {
      return Error::Transport(format!("auth service error ({}): {}", status, body.message()));
    }
    body.into_auth_error().into()
  }

  async fn rest_error(response: Response) -> Error {
    let status = response.status();
    let body: ApiRestError = response.json().await.unwrap_or_default();
    debug!(%status, message = %body.message(), "table request rejected");
    match status {
      StatusCode::UNAUTHORIZED => AuthError::SessionExpired.into(),
      StatusCode::FORBIDDEN => AuthError::Rejected(body.message()).into(),
      StatusCode::NOT_FOUND => Error::NotFound(body.message()),
      _ => Error::Transport(format!("backend error ({}): {}", status, body.message())),
    }
  }

  async fn session_from(response: Response) -> Result<Session> {
    if !response.status().is_success() {
      return Err(Self::auth_error(response).await);
    }
    let session: ApiSession = response.json().await?;
    Ok(session.into_session())
  }

  /// Decode a `return=representation` reply; zero rows means nothing matched.
  async fn touched_rows(response: Response, id: &NoteId) -> Result<Vec<ApiNote>> {
    if !response.status().is_success() {
      return Err(Self::rest_error(response).await);
    }
    let rows: Vec<ApiNote> = response.json().await?;
    if rows.is_empty() {
      return Err(Error::NotFound(format!("note {}", id)));
    }
    Ok(rows)
  }

  fn note_filter(id: &NoteId) -> [(&'static str, String); 1] {
    [("id", format!("eq.{}", id))]
  }
}

#[async_trait]
impl Backend for SupabaseClient {
  async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome> {
    let response = self
      .request(Method::POST, "auth/v1/signup")?
      .json(&serde_json::json!({
        "email": credentials.email,
        "password": credentials.password,
      }))
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(Self::auth_error(response).await);
    }

    match response.json::<ApiSignUpResponse>().await? {
      ApiSignUpResponse::Session(session) => Ok(SignUpOutcome::SignedIn(session.into_session())),
      ApiSignUpResponse::User(user) => {
        // An obfuscated user with no identities is returned for an email
        // that is already registered
        if user.identities.as_ref().is_some_and(|i| i.is_empty()) {
          return Err(AuthError::AlreadyRegistered.into());
        }
        Ok(SignUpOutcome::ConfirmationRequired {
          email: user.email.unwrap_or_else(|| credentials.email.clone()),
        })
      }
    }
  }

  async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
    let response = self
      .request(Method::POST, "auth/v1/token")?
      .query(&[("grant_type", "password")])
      .json(&serde_json::json!({
        "email": credentials.email,
        "password": credentials.password,
      }))
      .send()
      .await?;

    Self::session_from(response).await
  }

  async fn sign_out(&self, session: &Session) -> Result<()> {
    let response = self
      .authed(Method::POST, "auth/v1/logout", &session.access_token)?
      .send()
      .await?;

    // The local session is dropped either way; only transport errors fail
    if !response.status().is_success() {
      warn!(status = %response.status(), "logout rejected by backend");
    }
    Ok(())
  }

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
    let response = self
      .request(Method::POST, "auth/v1/token")?
      .query(&[("grant_type", "refresh_token")])
      .json(&serde_json::json!({ "refresh_token": refresh_token }))
      .send()
      .await?;

    Self::session_from(response).await
  }

  async fn get_user(&self, access_token: &str) -> Result<User> {
    let response = self
      .authed(Method::GET, "auth/v1/user", access_token)?
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(Self::auth_error(response).await);
    }
    let user: ApiUser = response.json().await?;
    Ok(user.into())
  }

  fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String> {
    let mut url = self.endpoint("auth/v1/authorize")?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("provider", provider);
      if let Some(redirect) = redirect_to {
        query.append_pair("redirect_to", redirect);
      }
    }
    Ok(url.to_string())
  }

  async fn list_notes(&self, session: &Session) -> Result<Vec<Note>> {
    let response = self
      .authed(Method::GET, NOTES_TABLE, &session.access_token)?
      .query(&[
        ("select", "*".to_string()),
        ("user_id", format!("eq.{}", session.user_id())),
        ("order", "created_at.desc".to_string()),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(Self::rest_error(response).await);
    }

    let rows: Vec<ApiNote> = response.json().await?;
    rows.into_iter().map(ApiNote::into_note).collect()
  }

  async fn insert_note(&self, session: &Session, draft: &NoteDraft) -> Result<Note> {
    let row = ApiNewNote {
      title: &draft.title,
      content: &draft.content,
      user_id: session.user_id(),
      explanation: draft.explanation(),
      created_at: Utc::now(),
    };

    let response = self
      .authed(Method::POST, NOTES_TABLE, &session.access_token)?
      .header("Prefer", "return=representation")
      .json(&[row])
      .send()
      .await?;

    if !response.status().is_success() {
      return Err(Self::rest_error(response).await);
    }

    let rows: Vec<ApiNote> = response.json().await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| Error::Transport("insert returned no row".to_string()))?
      .into_note()
  }

  async fn update_note(&self, session: &Session, id: &NoteId, update: &NoteUpdate) -> Result<()> {
    let response = self
      .authed(Method::PATCH, NOTES_TABLE, &session.access_token)?
      .query(&Self::note_filter(id))
      .header("Prefer", "return=representation")
      .json(update)
      .send()
      .await?;

    Self::touched_rows(response, id).await.map(|_| ())
  }

  async fn update_explanation(
    &self,
    session: &Session,
    id: &NoteId,
    explanation: &str,
  ) -> Result<()> {
    let response = self
      .authed(Method::PATCH, NOTES_TABLE, &session.access_token)?
      .query(&Self::note_filter(id))
      .header("Prefer", "return=representation")
      .json(&ApiExplanationPatch { explanation })
      .send()
      .await?;

    Self::touched_rows(response, id).await.map(|_| ())
  }

  async fn delete_note(&self, session: &Session, id: &NoteId) -> Result<()> {
    let response = self
      .authed(Method::DELETE, NOTES_TABLE, &session.access_token)?
      .query(&Self::note_filter(id))
      .header("Prefer", "return=representation")
      .send()
      .await?;

    Self::touched_rows(response, id).await.map(|_| ())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client() -> SupabaseClient {
    SupabaseClient::new("https://demo.supabase.co", "anon".to_string()).unwrap()
  }

  #[test]
  fn test_base_url_gets_trailing_slash() {
    let c = client();
    assert_eq!(c.base_url().as_str(), "https://demo.supabase.co/");
    assert_eq!(
      c.endpoint(NOTES_TABLE).unwrap().as_str(),
      "https://demo.supabase.co/rest/v1/notes"
    );
  }

  #[test]
  fn test_invalid_url_is_configuration_error() {
    let err = SupabaseClient::new("not a url", "k".to_string()).err().unwrap();
    assert!(matches!(err, Error::Configuration(_)));
  }

  #[test]
  fn test_authorize_url() {
    let url = client()
      .authorize_url("google", Some("http://localhost:3000/note"))
      .unwrap();
    assert_eq!(
      url,
      "https://demo.supabase.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fnote"
    );
  }
}
