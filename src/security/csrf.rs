//! CSRF protection using the double-submit cookie pattern.
//!
//! # State Machine
//! ```text
//! NoToken --any request--> Issued      (token generated, Set-Cookie attached)
//! Issued  --safe/exempt--> Issued      (no validation)
//! Issued  --mutating, header == cookie--> Validated
//! Issued  --mutating, header missing or != cookie--> Rejected (cookie unchanged)
//! ```
//!
//! # Design Decisions
//! - Tokens are 256 bits from the OS RNG, URL-safe base64 without padding
//! - The cookie is readable by script (no `HttpOnly`) so it can be echoed
//! - Comparison is constant-time
//! - An existing well-formed token is never rotated by the guard

use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue, Method};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::config::schema::CsrfConfig;

/// Why a mutating request was rejected. Logged, never shown to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfFailure {
    MissingCookie,
    MissingHeader,
    Mismatch,
}

impl CsrfFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsrfFailure::MissingCookie => "missing_cookie",
            CsrfFailure::MissingHeader => "missing_header",
            CsrfFailure::Mismatch => "mismatch",
        }
    }
}

impl fmt::Display for CsrfFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token bound to the current request, exposed to handlers via extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(pub String);

/// Why a request went through without failing CSRF validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfPass {
    SafeMethod,
    ExemptPath,
    Validated,
}

/// Issues and validates double-submit tokens.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    cookie_name: String,
    header_name: String,
    token_bytes: usize,
    secure: bool,
    exempt_paths: Vec<String>,
}

impl CsrfGuard {
    pub fn from_config(config: &CsrfConfig, production: bool) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.to_ascii_lowercase(),
            token_bytes: config.token_bytes,
            secure: config.secure_cookie || production,
            exempt_paths: config
                .exempt_paths
                .iter()
                .map(|p| normalize_path(p).to_string())
                .collect(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Fresh random token.
    pub fn generate_token(&self) -> String {
        let mut bytes = vec![0u8; self.token_bytes];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Whether `token` looks like something this guard issued.
    pub fn is_well_formed(&self, token: &str) -> bool {
        let encoded_len = (self.token_bytes * 4).div_ceil(3);
        token.len() == encoded_len
            && token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    }

    /// Constant-time equality of the submitted and stored token.
    pub fn validate_token(&self, provided: &str, expected: &str) -> bool {
        // Length is not secret: every issued token has the same length.
        if provided.len() != expected.len() || expected.is_empty() {
            return false;
        }
        provided.as_bytes().ct_eq(expected.as_bytes()).into()
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.exempt_paths.iter().any(|p| p == path)
    }

    /// Token carried by the request cookie, if present and well-formed.
    pub fn cookie_token(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name.trim() == self.cookie_name).then(|| value.trim().trim_matches('"').to_string())
            })
            .filter(|token| self.is_well_formed(token))
    }

    fn header_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get(self.header_name.as_str())
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Run the double-submit check for one request.
    ///
    /// `cookie_token` is the token the client already held, not one issued
    /// while handling this request.
    pub fn verify(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        cookie_token: Option<&str>,
    ) -> Result<CsrfPass, CsrfFailure> {
        if is_safe_method(method) {
            return Ok(CsrfPass::SafeMethod);
        }
        if self.is_exempt(path) {
            return Ok(CsrfPass::ExemptPath);
        }

        let cookie = cookie_token.ok_or(CsrfFailure::MissingCookie)?;
        let submitted = self.header_token(headers).ok_or(CsrfFailure::MissingHeader)?;

        if self.validate_token(submitted, cookie) {
            Ok(CsrfPass::Validated)
        } else {
            Err(CsrfFailure::Mismatch)
        }
    }

    /// `Set-Cookie` value delivering `token`.
    pub fn set_cookie(&self, token: &str) -> HeaderValue {
        let mut cookie = format!("{}={}; Path=/; SameSite=Strict", self.cookie_name, token);
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Tokens are URL-safe base64, so the value is always a valid header.
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// `Set-Cookie` value that removes the token from the client.
    pub fn clear_cookie(&self) -> HeaderValue {
        let mut cookie = format!("{}=; Path=/; SameSite=Strict; Max-Age=0", self.cookie_name);
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    /// Whether a response already sets (or clears) this guard's cookie.
    pub fn response_sets_cookie(&self, headers: &HeaderMap) -> bool {
        let prefix = format!("{}=", self.cookie_name);
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .any(|c| c.starts_with(&prefix))
    }
}

/// `GET`, `HEAD` and `OPTIONS` never change state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => path,
    }
}
