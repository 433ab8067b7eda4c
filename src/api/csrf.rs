//! Double-submit cookie protection for the POST forms.
//!
//! GET pages set a random `csrftoken` cookie and embed the same value in every
//! form; a POST is accepted only when the submitted field equals the cookie.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

pub const COOKIE_NAME: &str = "csrftoken";
pub const FORM_FIELD: &str = "csrfmiddlewaretoken";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsrfError {
    #[error("CSRF cookie not set")]
    MissingCookie,
    #[error("CSRF token missing or incorrect")]
    Mismatch,
}

fn is_well_formed(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Token carried by the request's `Cookie` header(s), if any.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == COOKIE_NAME && is_well_formed(value))
        .map(|(_, value)| value.to_string())
}

/// Reuses the caller's token or mints a new one. The header value is `Some`
/// when the cookie has to be (re)set on the response.
pub fn issue(headers: &HeaderMap) -> (String, Option<(HeaderName, HeaderValue)>) {
    if let Some(token) = cookie_token(headers) {
        return (token, None);
    }
    let token = uuid::Uuid::new_v4().simple().to_string();
    let cookie = format!("{COOKIE_NAME}={token}; Path=/; SameSite=Lax; HttpOnly");
    let header = HeaderValue::from_str(&cookie).ok().map(|v| (SET_COOKIE, v));
    (token, header)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify(headers: &HeaderMap, submitted: &str) -> Result<(), CsrfError> {
    let expected = cookie_token(headers).ok_or(CsrfError::MissingCookie)?;
    if constant_time_eq(expected.as_bytes(), submitted.trim().as_bytes()) {
        Ok(())
    } else {
        Err(CsrfError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn issues_new_token_without_cookie() {
        let (token, header) = issue(&HeaderMap::new());
        assert!(is_well_formed(&token));
        let (name, value) = header.unwrap();
        assert_eq!(name, SET_COOKIE);
        assert!(value.to_str().unwrap().starts_with(&format!("csrftoken={token};")));
    }

    #[test]
    fn reuses_existing_cookie() {
        let token = "0123456789abcdef0123456789abcdef";
        let headers = with_cookie(&format!("theme=dark; csrftoken={token}"));
        let (issued, header) = issue(&headers);
        assert_eq!(issued, token);
        assert!(header.is_none());
    }

    #[test]
    fn verify_requires_matching_token() {
        let token = "0123456789abcdef0123456789abcdef";
        let headers = with_cookie(&format!("csrftoken={token}"));
        assert_eq!(verify(&headers, token), Ok(()));
        assert_eq!(verify(&headers, "ffffffffffffffffffffffffffffffff"), Err(CsrfError::Mismatch));
        assert_eq!(verify(&headers, ""), Err(CsrfError::Mismatch));
        assert_eq!(verify(&HeaderMap::new(), token), Err(CsrfError::MissingCookie));
    }

    #[test]
    fn malformed_cookie_is_ignored() {
        let headers = with_cookie("csrftoken=<script>");
        assert!(cookie_token(&headers).is_none());
    }
}
