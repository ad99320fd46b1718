//! HTTP client for the clinic API.
//!
//! Attaches the session's bearer token to every request. A 401 on an
//! authenticated request triggers one refresh (through the shared
//! `RefreshGate`) and one replay; a second 401 ends the session.

use std::sync::Arc;

use headers::{Authorization, HeaderMapExt};
use reqwest::{Method, Response, StatusCode, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    auth::token_fingerprint,
    error::ClientError,
    middleware::refresh_gate::{RefreshFailure, RefreshGate, RefreshOutcome, Ticket},
    models::{Claims, LoginRequest, TokenResponse},
    session::AuthSession,
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    session: AuthSession,
    gate: RefreshGate,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: AuthSession) -> Result<Self, ClientError> {
        // cookie store carries the refresh credential set by /auth/login
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                session,
                gate: RefreshGate::new(),
            }),
        })
    }

    pub fn session(&self) -> &AuthSession {
        &self.inner.session
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }

    /* -------------------------
       Auth
    --------------------------*/

    pub async fn login(&self, req: &LoginRequest) -> Result<Claims, ClientError> {
        let resp = self
            .inner
            .http
            .post(self.url(LOGIN_PATH))
            .json(req)
            .send()
            .await?;
        let body = read_body(resp).await?;
        let tokens: TokenResponse = serde_json::from_str(&body)?;
        self.session().login(&tokens.token)
    }

    /// Best-effort server logout; local credentials are dropped regardless.
    pub async fn logout(&self) {
        if self.session().is_authenticated() {
            if let Err(e) = self.send_empty(Method::POST, LOGOUT_PATH).await {
                tracing::debug!("server logout failed: {e}");
            }
        }
        self.session().logout();
    }

    /// Obtain a new bearer token using the refresh cookie.
    /// Concurrent callers share a single in-flight request.
    pub async fn refresh_token(&self) -> Result<String, ClientError> {
        let outcome = loop {
            match self.inner.gate.enter() {
                Ticket::Leader(leader) => {
                    let generation = self.session().generation();
                    let outcome = self.request_refresh(generation).await;
                    if outcome.is_err() {
                        self.session().expire_generation(generation);
                    }
                    leader.finish(&outcome);
                    break outcome;
                }
                Ticket::Waiter(rx) => match rx.await {
                    Ok(outcome) => break outcome,
                    // leader was cancelled before it finished
                    Err(_) => continue,
                },
            }
        };
        outcome.map_err(|e| {
            tracing::warn!("{e}");
            ClientError::SessionExpired
        })
    }

    async fn request_refresh(&self, generation: u64) -> RefreshOutcome {
        let resp = self
            .inner
            .http
            .post(self.url(REFRESH_PATH))
            .send()
            .await
            .map_err(|e| RefreshFailure(e.to_string()))?;
        let body = read_body(resp)
            .await
            .map_err(|e| RefreshFailure(e.to_string()))?;
        let tokens: TokenResponse =
            serde_json::from_str(&body).map_err(|e| RefreshFailure(e.to_string()))?;
        self.session()
            .set_credentials(generation, &tokens.token)
            .map_err(|e| RefreshFailure(e.to_string()))?;
        tracing::info!(token = %token_fingerprint(&tokens.token), "bearer token refreshed");
        Ok(tokens.token)
    }

    /* -------------------------
       Requests
    --------------------------*/

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let body = self.execute(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let payload = serde_json::to_value(body)?;
        let body = self.execute(Method::POST, path, Some(&payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let payload = serde_json::to_value(body)?;
        let body = self.execute(Method::PUT, path, Some(&payload)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, path).await
    }

    /// Body-less action endpoint whose response body is ignored.
    pub async fn post_action(&self, path: &str) -> Result<(), ClientError> {
        self.send_empty(Method::POST, path).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ClientError> {
        self.execute(method, path, None).await.map(|_| ())
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<String, ClientError> {
        let generation = self.session().generation();
        let token = self.session().token();
        let resp = self.send_once(&method, path, payload, token.as_deref()).await?;

        if resp.status() != StatusCode::UNAUTHORIZED || token.is_none() {
            return read_body(resp).await;
        }

        tracing::debug!(%method, path, "401, refreshing and retrying once");
        let fresh = self.refresh_token().await?;

        let retry = self.send_once(&method, path, payload, Some(&fresh)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, path, "still unauthorized after refresh");
            self.session().expire_generation(generation);
            return Err(ClientError::SessionExpired);
        }
        read_body(retry).await
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        payload: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut req = self.inner.http.request(method.clone(), self.url(path));
        if let Some(token) = token {
            req = req.headers(bearer_headers(token)?);
        }
        if let Some(payload) = payload {
            req = req.json(payload);
        }
        Ok(req.send().await?)
    }
}

fn bearer_headers(token: &str) -> Result<HeaderMap, ClientError> {
    let authz = Authorization::bearer(token)
        .map_err(|_| ClientError::InvalidToken("token is not a valid header value"))?;
    let mut headers = HeaderMap::new();
    headers.typed_insert(authz);
    Ok(headers)
}

async fn read_body(resp: Response) -> Result<String, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(ClientError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, AuthSession::new(Arc::new(MemoryTokenStore::default()))).unwrap()
    }

    #[test]
    fn joins_paths_onto_base() {
        let c = client("http://clinic.local/");
        assert_eq!(c.url("/api/patients"), "http://clinic.local/api/patients");
        assert_eq!(c.url("api/patients"), "http://clinic.local/api/patients");
    }

    #[test]
    fn bearer_header_is_typed() {
        let headers = bearer_headers("abc.def.ghi").unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc.def.ghi");
        assert!(bearer_headers("bad\ntoken").is_err());
    }
}
