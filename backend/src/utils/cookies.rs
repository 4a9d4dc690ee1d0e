use std::{str::FromStr, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
pub const REFRESH_COOKIE_PATH: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            other => Err(format!("unknown SameSite value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshCookieError {
    #[error("refresh cookie is missing")]
    Missing,
    #[error("refresh cookie is not valid base64 text")]
    Undecodable,
}

/// `Set-Cookie` value carrying a refresh token, base64-encoded for transport.
pub fn refresh_cookie(token: &str, max_age: Duration, options: CookieOptions) -> String {
    with_attributes(
        format!(
            "{}={}; Path={}; Max-Age={}",
            REFRESH_COOKIE_NAME,
            URL_SAFE_NO_PAD.encode(token.as_bytes()),
            REFRESH_COOKIE_PATH,
            max_age.as_secs()
        ),
        options,
    )
}

pub fn clear_refresh_cookie(options: CookieOptions) -> String {
    with_attributes(
        format!(
            "{}=; Path={}; Max-Age=0",
            REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH
        ),
        options,
    )
}

fn with_attributes(mut cookie: String, options: CookieOptions) -> String {
    cookie.push_str("; HttpOnly; SameSite=");
    cookie.push_str(options.same_site.as_str());
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Finds the refresh cookie among `Cookie` header values and decodes it.
pub fn refresh_token_from_cookies<'a, I>(headers: I) -> Result<String, RefreshCookieError>
where
    I: IntoIterator<Item = &'a str>,
{
    let encoded = headers
        .into_iter()
        .find_map(|header| extract_cookie_value(header, REFRESH_COOKIE_NAME))
        .filter(|value| !value.is_empty())
        .ok_or(RefreshCookieError::Missing)?;

    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('=').as_bytes())
        .map_err(|_| RefreshCookieError::Undecodable)?;
    String::from_utf8(bytes).map_err(|_| RefreshCookieError::Undecodable)
}

fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}
