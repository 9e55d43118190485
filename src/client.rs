//! Typed client for the event-budget API. Holds the session explicitly:
//! created by `login`, cleared by `logout`, restored once at startup via
//! `resume`. Every call issues at most one request and never retries; the
//! caller decides what a failure means for its form.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{
    CreateEventPayload, CreateParticipantPayload, CreatePaymentPayload, EventDto, LoginPayload,
    LoginResponse, ParticipantDto, PaymentDto, PublicUser, RegisterPayload,
};

/// The authenticated session: bearer token plus the user it belongs to.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (DNS, connect, timeout, ...).
    #[error("network error: {0}")]
    Transport(reqwest::Error),
    /// The server answered but the body was not the expected shape.
    #[error("invalid response body: {0}")]
    Decode(reqwest::Error),
    /// The server rejected the request (validation or server-side failure).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("not logged in")]
    NotLoggedIn,
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e)
        } else {
            ApiError::Transport(e)
        }
    }
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Option<ClientSession>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&ClientSession> {
        self.session.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<&str, ApiError> {
        self.session
            .as_ref()
            .map(|s| s.token.as_str())
            .ok_or(ApiError::NotLoggedIn)
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Rejected { status, message });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, body, token).await?;
        Ok(response.json().await?)
    }

    // --- auth ----------------------------------------------------------

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ApiError> {
        let payload = RegisterPayload {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send_json(Method::POST, "/auth/register", Some(&payload), None)
            .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<PublicUser, ApiError> {
        let payload = LoginPayload {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self
            .send_json(Method::POST, "/auth/login", Some(&payload), None)
            .await?;
        let user = response.user.clone();
        self.session = Some(ClientSession {
            token: response.token,
            user: response.user,
        });
        Ok(user)
    }

    /// Restores a previously issued token at startup, validating it against
    /// the server before trusting it.
    pub async fn resume(&mut self, token: String) -> Result<PublicUser, ApiError> {
        let user: PublicUser = self
            .send_json::<_, ()>(Method::GET, "/auth/me", None, Some(token.as_str()))
            .await?;
        self.session = Some(ClientSession {
            token,
            user: user.clone(),
        });
        Ok(user)
    }

    /// Ends the session. The local session is gone either way; the server
    /// row only dies if the request got through.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        let session = self.session.take().ok_or(ApiError::NotLoggedIn)?;
        self.send::<()>(Method::POST, "/auth/logout", None, Some(session.token.as_str()))
            .await?;
        Ok(())
    }

    // --- events --------------------------------------------------------

    pub async fn events(&self) -> Result<Vec<EventDto>, ApiError> {
        self.send_json::<_, ()>(Method::GET, "/events", None, Some(self.token()?))
            .await
    }

    pub async fn event(&self, event_id: &str) -> Result<EventDto, ApiError> {
        let path = format!("/events/{}", event_id);
        self.send_json::<_, ()>(Method::GET, &path, None, Some(self.token()?))
            .await
    }

    pub async fn create_event(&self, payload: &CreateEventPayload) -> Result<EventDto, ApiError> {
        self.send_json(Method::POST, "/events", Some(payload), Some(self.token()?))
            .await
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        payload: &CreateEventPayload,
    ) -> Result<EventDto, ApiError> {
        let path = format!("/events/{}", event_id);
        self.send_json(Method::PUT, &path, Some(payload), Some(self.token()?))
            .await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        let path = format!("/events/{}", event_id);
        self.send::<()>(Method::DELETE, &path, None, Some(self.token()?))
            .await?;
        Ok(())
    }

    // --- participants --------------------------------------------------

    pub async fn create_participant(
        &self,
        event_id: &str,
        payload: CreateParticipantPayload,
    ) -> Result<ParticipantDto, ApiError> {
        let path = format!("/events/{}/participants", event_id);
        let payload = payload.normalized();
        self.send_json(Method::POST, &path, Some(&payload), Some(self.token()?))
            .await
    }

    pub async fn update_participant(
        &self,
        event_id: &str,
        participant_id: &str,
        payload: CreateParticipantPayload,
    ) -> Result<ParticipantDto, ApiError> {
        let path = format!("/events/{}/participants/{}", event_id, participant_id);
        let payload = payload.normalized();
        self.send_json(Method::PUT, &path, Some(&payload), Some(self.token()?))
            .await
    }

    pub async fn delete_participant(
        &self,
        event_id: &str,
        participant_id: &str,
    ) -> Result<(), ApiError> {
        let path = format!("/events/{}/participants/{}", event_id, participant_id);
        self.send::<()>(Method::DELETE, &path, None, Some(self.token()?))
            .await?;
        Ok(())
    }

    // --- payments ------------------------------------------------------

    /// Callers attributing a payment to a participant should prepare the
    /// payload with [`CreatePaymentPayload::with_attribution`] so the payer
    /// name reflects the participant at submit time.
    pub async fn create_payment(
        &self,
        event_id: &str,
        payload: &CreatePaymentPayload,
    ) -> Result<PaymentDto, ApiError> {
        let path = format!("/events/{}/payments", event_id);
        self.send_json(Method::POST, &path, Some(payload), Some(self.token()?))
            .await
    }

    pub async fn update_payment(
        &self,
        event_id: &str,
        payment_id: &str,
        payload: &CreatePaymentPayload,
    ) -> Result<PaymentDto, ApiError> {
        let path = format!("/events/{}/payments/{}", event_id, payment_id);
        self.send_json(Method::PUT, &path, Some(payload), Some(self.token()?))
            .await
    }

    pub async fn delete_payment(&self, event_id: &str, payment_id: &str) -> Result<(), ApiError> {
        let path = format!("/events/{}/payments/{}", event_id, payment_id);
        self.send::<()>(Method::DELETE, &path, None, Some(self.token()?))
            .await?;
        Ok(())
    }
}
