//! Email/password login and session lifecycle

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::TokenStore;
use crate::config::Config;
use crate::models::Contact;

/// `POST /auth/login` response body.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(alias = "user")]
    usuario: Option<Contact>,
    message: Option<String>,
}

/// Perform email/password login and persist the session.
pub async fn login(email: &str, password: &str) -> Result<()> {
    let mut config = Config::load()?;
    let url = format!("{}/auth/login", config.api_url());

    tracing::debug!("Login POST {}", url);
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .with_context(|| format!("Login request to {} failed", url))?;

    let status = resp.status();
    let body: LoginResponse = resp.json().await.context("Failed to parse login response")?;

    if !status.is_success() {
        bail!(
            "Login failed ({}): {}",
            status.as_u16(),
            body.message.as_deref().unwrap_or("no details")
        );
    }

    let access = body
        .access_token
        .context("Login response missing access_token")?;
    let user = body.usuario.context("Login response missing usuario")?;

    config.set_access_token(access);
    if let Some(rt) = body.refresh_token {
        config.set_refresh_token(rt);
    }
    tracing::info!("Logged in as {} ({})", user.name, user.role);
    config.set_user(user);
    config.save()?;

    println!("Login successful.");
    Ok(())
}

/// Clear stored credentials
pub fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_tokens();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display current auth status
pub fn status() -> Result<()> {
    let config = Config::load()?;

    match config.get_access_token() {
        Some(token) if !token.is_expired() => {
            println!("Access token: valid");
            if let Some(exp) = token.expires_at {
                println!("  expires_at: {}", exp);
            }
        }
        Some(_) => {
            println!("Access token: expired");
        }
        None => {
            println!("Access token: none");
        }
    }

    match config.get_refresh_token() {
        Some(_) => println!("Refresh tok:  present"),
        None => println!("Refresh tok:  none"),
    }

    match config.get_user() {
        Some(user) => println!("User:         {} <{}> [{}]", user.name, user.email, user.role),
        None => println!("User:         none"),
    }

    println!("API URL:      {}", config.api_url());

    if config.get_access_token().is_none() {
        println!("\nRun 'monteverde-cli login' to authenticate.");
    }

    Ok(())
}
