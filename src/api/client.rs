//! Authenticated HTTP client for the portal API
//!
//! Wraps reqwest::Client with bearer-token injection and a one-shot refresh
//! on 401: the original request is retried once with the new access token,
//! and a failed refresh clears stored credentials so the next command tells
//! the user to log in again.

use anyhow::{bail, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Mutex;

use super::error::ApiError;
use crate::auth::TokenStore;
use crate::config::Config;
use crate::models::Contact;

/// Authenticated portal client.
pub struct PortalClient {
    http: reqwest::Client,
    base: String,
    config: Mutex<Config>,
}

/// `POST /auth/refresh` response body.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

impl PortalClient {
    /// Load the persisted session and build a client.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        if config.get_access_token().is_none() {
            bail!("Not logged in. Run 'monteverde-cli login' first.");
        }
        let base = config.api_url();
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            config: Mutex::new(config),
        })
    }

    /// The logged-in user from the persisted session.
    pub fn current_user(&self) -> Result<Contact, ApiError> {
        self.config
            .lock()
            .unwrap()
            .get_user()
            .ok_or(ApiError::NotLoggedIn)
    }

    fn access_token(&self) -> Result<String, ApiError> {
        self.config
            .lock()
            .unwrap()
            .get_access_token()
            .map(|t| t.token)
            .ok_or(ApiError::NotLoggedIn)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// GET and deserialize the payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST a JSON body and deserialize the payload.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        let value = self.request(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// PUT with no body, discarding the payload.
    pub async fn put(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::PUT, path, None).await?;
        Ok(())
    }

    /// Issue a request, refreshing the access token once on 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let resp = self.send_once(method.clone(), path, body).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("401 for {} {}, attempting token refresh", method, path);
            self.refresh_access_token().await?;
            let retry = self.send_once(method, path, body).await?;
            return check_response(retry).await;
        }

        check_response(resp).await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.access_token()?;
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut req = self.http.request(method, &url).bearer_auth(&token);
        if let Some(json) = body {
            req = req.json(json);
        }
        Ok(req.send().await?)
    }

    /// Exchange the refresh token for a new access token and persist it.
    ///
    /// A failed exchange clears all stored credentials before surfacing
    /// `SessionExpired`, so exactly one refresh is attempted per request.
    async fn refresh_access_token(&self) -> Result<(), ApiError> {
        let refresh_token = {
            let config = self.config.lock().unwrap();
            config.get_refresh_token()
        };
        let refresh_token = match refresh_token {
            Some(rt) => rt,
            None => {
                self.clear_session();
                return Err(ApiError::SessionExpired);
            }
        };

        let url = self.url("/auth/refresh");
        tracing::info!("Access token rejected, refreshing...");
        let result = async {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&refresh_token)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ApiError::SessionExpired);
            }
            let body: RefreshResponse = serde_json::from_value(resp.json().await?)?;
            Ok::<_, ApiError>(body.access_token)
        }
        .await;

        match result {
            Ok(new_token) => {
                let mut config = self.config.lock().unwrap();
                config.set_access_token(new_token);
                if let Err(e) = config.save() {
                    tracing::warn!("Failed to persist refreshed token: {:#}", e);
                }
                tracing::info!("Token refreshed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                self.clear_session();
                Err(ApiError::SessionExpired)
            }
        }
    }

    fn clear_session(&self) {
        let mut config = self.config.lock().unwrap();
        config.clear_tokens();
        if let Err(e) = config.save() {
            tracing::warn!("Failed to clear stored session: {:#}", e);
        }
    }
}

/// Check HTTP response status and unwrap the payload envelope.
async fn check_response(resp: reqwest::Response) -> Result<Value, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    let body: Value = resp.json().await?;
    Ok(unwrap_envelope(body))
}

/// Pull a human-readable message out of an error payload.
fn error_message(body: &Value) -> String {
    body.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Error en la petición")
        .to_string()
}

/// Unwrap the backend's `{success, data}` envelope when present.
fn unwrap_envelope(body: Value) -> Value {
    let success = body
        .get("success")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);
    if success {
        if let Some(data) = body.get("data") {
            return data.clone();
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_unwrap_envelope_success() {
        let body = json!({"success": true, "data": [{"id": 1}]});
        assert_eq!(unwrap_envelope(body), json!([{"id": 1}]));
    }

    #[test]
    fn test_unwrap_envelope_passthrough_without_success() {
        let body = json!([{"id": 1}, {"id": 2}]);
        assert_eq!(unwrap_envelope(body.clone()), body);
    }

    #[test]
    fn test_unwrap_envelope_success_false_keeps_body() {
        let body = json!({"success": false, "message": "Error"});
        assert_eq!(unwrap_envelope(body.clone()), body);
    }

    #[test]
    fn test_error_message_from_payload() {
        assert_eq!(
            error_message(&json!({"message": "Receptor no encontrado"})),
            "Receptor no encontrado"
        );
        assert_eq!(error_message(&Value::Null), "Error en la petición");
    }

    // -- 401/refresh flow against a scripted localhost server --

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    /// Serve canned responses, recording "METHOD /path" per request.
    ///
    /// The first `GET /usuario/*` gets a 401; the refresh endpoint answers
    /// per `refresh_ok`; everything else gets a contact record.
    async fn scripted_server(
        listener: TcpListener,
        log: Arc<Mutex<Vec<String>>>,
        refresh_ok: bool,
    ) {
        loop {
            let (mut sock, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let mut buf = vec![0u8; 4096];
            let mut head = String::new();
            loop {
                let n = match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                head.push_str(&String::from_utf8_lossy(&buf[..n]));
                if head.contains("\r\n\r\n") {
                    break;
                }
            }
            let request_line = head.lines().next().unwrap_or("").to_string();
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or("");
            let path = parts.next().unwrap_or("");

            let prior_gets = {
                let mut log = log.lock().unwrap();
                log.push(format!("{} {}", method, path));
                log.iter()
                    .filter(|r| r.starts_with("GET /usuario"))
                    .count()
                    .saturating_sub(1)
            };

            let response = if path == "/auth/refresh" {
                if refresh_ok {
                    http_response("200 OK", r#"{"access_token":"fresh-token"}"#)
                } else {
                    http_response("401 Unauthorized", r#"{"message":"Refresh inválido"}"#)
                }
            } else if prior_gets == 0 {
                http_response("401 Unauthorized", r#"{"message":"Token expirado"}"#)
            } else {
                http_response(
                    "200 OK",
                    r#"{"id":5,"nombre":"Ana Vargas","email":"ana@colegio.es","rol":"familia"}"#,
                )
            };
            let _ = sock.write_all(response.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    }

    fn test_client(addr: std::net::SocketAddr) -> PortalClient {
        // Keep save() away from the real user config during these tests
        std::env::set_var(
            "MONTEVERDE_CONFIG_DIR",
            std::env::temp_dir().join("monteverde-cli-test-config"),
        );
        let mut config = Config::default();
        config.set_access_token("stale-token".to_string());
        config.set_refresh_token("refresh-token".to_string());
        PortalClient {
            http: reqwest::Client::new(),
            base: format!("http://{}", addr),
            config: Mutex::new(config),
        }
    }

    #[tokio::test]
    async fn test_401_triggers_one_refresh_and_one_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(scripted_server(listener, log.clone(), true));

        let client = test_client(addr);
        let contact: Contact = client.get("/usuario/5").await.unwrap();
        assert_eq!(contact.id, 5);
        assert_eq!(contact.name, "Ana Vargas");

        let requests = log.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                "GET /usuario/5".to_string(),
                "POST /auth/refresh".to_string(),
                "GET /usuario/5".to_string(),
            ]
        );

        // The rotated token is what the retry ran with, and it is kept
        let token = client.config.lock().unwrap().get_access_token().unwrap();
        assert_eq!(token.token, "fresh-token");
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_session_without_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(scripted_server(listener, log.clone(), false));

        let client = test_client(addr);
        let result = client.get::<Contact>("/usuario/5").await;
        assert!(matches!(result, Err(ApiError::SessionExpired)));

        // One refresh attempt, no retry of the original request
        let requests = log.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![
                "GET /usuario/5".to_string(),
                "POST /auth/refresh".to_string(),
            ]
        );

        // Stored credentials are gone
        let config = client.config.lock().unwrap();
        assert!(config.get_access_token().is_none());
        assert!(config.get_refresh_token().is_none());
    }
}
