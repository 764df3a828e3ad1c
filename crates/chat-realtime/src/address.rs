//! Target address resolution
//!
//! A manager always connects to an absolute `ws://` or `wss://` URL. Paths
//! are resolved against the page origin, mapping `http` to `ws` and `https`
//! to `wss`.

use chat_common::ClientConfig;
use url::{ParseError, Url};

/// Address resolution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Address must be an absolute URL or start with '/': {0}")]
    NotAbsolutePath(String),

    #[error("Invalid URL {0}: {1}")]
    InvalidUrl(String, ParseError),
}

/// WebSocket scheme for a page or socket scheme
fn socket_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "ws" | "http" => Some("ws"),
        "wss" | "https" => Some("wss"),
        _ => None,
    }
}

/// Absolute URL for `address`, joining bare paths onto `origin`
fn parse_against(address: &str, origin: &str) -> Result<Url, AddressError> {
    match Url::parse(address) {
        Ok(url) => Ok(url),
        Err(ParseError::RelativeUrlWithoutBase) => {
            if !address.starts_with('/') {
                return Err(AddressError::NotAbsolutePath(address.to_string()));
            }
            let base = Url::parse(origin)
                .ok()
                .filter(|base| base.host_str().is_some())
                .ok_or_else(|| AddressError::InvalidOrigin(origin.to_string()))?;
            base.join(address)
                .map_err(|e| AddressError::InvalidUrl(address.to_string(), e))
        }
        Err(e) => Err(AddressError::InvalidUrl(address.to_string(), e)),
    }
}

/// Resolve `address` to an absolute WebSocket URL
pub fn resolve(address: &str, origin: &str) -> Result<String, AddressError> {
    let mut url = parse_against(address, origin)?;

    let scheme = socket_scheme(url.scheme())
        .ok_or_else(|| AddressError::UnsupportedScheme(url.scheme().to_string()))?;
    url.set_scheme(scheme)
        .map_err(|()| AddressError::UnsupportedScheme(url.scheme().to_string()))?;

    Ok(url.into())
}

/// Path of the WebSocket endpoint for a chat room
pub fn chat_room_path(room: &str) -> String {
    format!("/ws/chat/{}/", urlencoding::encode(room))
}

/// Append an auth token as the `token` query parameter
pub fn with_token(address: &str, token: &str) -> Result<String, AddressError> {
    let mut url =
        Url::parse(address).map_err(|e| AddressError::InvalidUrl(address.to_string(), e))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url.into())
}

/// Full room URL from client configuration
pub fn room_url(config: &ClientConfig) -> Result<String, AddressError> {
    let url = resolve(&chat_room_path(&config.server.room), &config.server.origin)?;
    match config.server.token.as_deref() {
        Some(token) => with_token(&url, token),
        None => Ok(url),
    }
}

/// Address with query, fragment and credentials removed, for logs
pub fn redact(address: &str) -> String {
    let Ok(mut url) = Url::parse(address) else {
        let end = address.find(&['?', '#'][..]).unwrap_or(address.len());
        return address[..end].to_string();
    };

    url.set_query(None);
    url.set_fragment(None);
    // Only fails for URLs that cannot carry credentials
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.into()
}
