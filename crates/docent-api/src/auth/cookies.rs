//! Credential transport: cookies and the Authorization header

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use docent_core::AuthConfig;

/// Header carrying a refresh token for clients that do not keep cookies
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Header echoing an access token minted by the guard
pub const RENEWED_ACCESS_HEADER: &str = "x-access-token";

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub access_name: String,
    pub refresh_name: String,
    pub secure: bool,
    pub access_max_age: u64,
    pub refresh_max_age: u64,
}

impl From<&AuthConfig> for CookieSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_name: config.access_cookie.clone(),
            refresh_name: config.refresh_cookie.clone(),
            secure: config.secure_cookies,
            access_max_age: config.access_ttl_secs,
            refresh_max_age: config.refresh_ttl_secs,
        }
    }
}

impl CookieSettings {
    pub fn access_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        build_cookie(&self.access_name, token, self.access_max_age, self.secure)
    }

    pub fn refresh_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        build_cookie(&self.refresh_name, token, self.refresh_max_age, self.secure)
    }

    /// Append cookies that expire both credentials
    pub fn clear_all(&self, headers: &mut HeaderMap) {
        for name in [&self.access_name, &self.refresh_name] {
            if let Ok(cookie) = build_cookie(name, "", 0, self.secure) {
                headers.append(SET_COOKIE, cookie);
            }
        }
    }

    /// Append fresh credential cookies; `refresh` is optional
    pub fn set_tokens(&self, headers: &mut HeaderMap, access: &str, refresh: Option<&str>) {
        if let Ok(cookie) = self.access_cookie(access) {
            headers.append(SET_COOKIE, cookie);
        }
        if let Some(refresh) = refresh {
            if let Ok(cookie) = self.refresh_cookie(refresh) {
                headers.append(SET_COOKIE, cookie);
            }
        }
    }

    /// Access token from `Authorization: Bearer`, else the access cookie
    pub fn access_token(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers).or_else(|| read_cookie(headers, &self.access_name))
    }

    /// Refresh token from the refresh cookie, else the `x-refresh-token` header
    pub fn refresh_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.refresh_name).or_else(|| {
            headers
                .get(REFRESH_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    }
}

fn build_cookie(
    name: &str,
    value: &str,
    max_age: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Value of cookie `name`; empty values count as absent
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings::from(&AuthConfig::default())
    }

    #[test]
    fn test_access_cookie_attributes() {
        let cookie = settings().access_cookie("abc").unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "accessToken=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=900"
        );

        let secure = CookieSettings {
            secure: true,
            ..settings()
        };
        assert!(secure
            .refresh_cookie("xyz")
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("Max-Age=604800; Secure"));
    }

    #[test]
    fn test_clear_all_expires_both() {
        let mut headers = HeaderMap::new();
        settings().clear_all(&mut headers);

        let cookies: Vec<_> = headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("accessToken=;"));
        assert!(cookies[1].starts_with("refreshToken=;"));
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; refreshToken=r1; accessToken=".parse().unwrap());

        assert_eq!(read_cookie(&headers, "refreshToken"), Some("r1".to_string()));
        assert_eq!(read_cookie(&headers, "accessToken"), None);
        assert_eq!(read_cookie(&headers, "refresh"), None);
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(COOKIE, "accessToken=from-cookie".parse().unwrap());

        assert_eq!(
            settings().access_token(&headers),
            Some("from-header".to_string())
        );

        headers.remove(AUTHORIZATION);
        assert_eq!(
            settings().access_token(&headers),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn test_refresh_token_header_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(settings().refresh_token(&headers), None);

        headers.insert(REFRESH_TOKEN_HEADER, "r2".parse().unwrap());
        assert_eq!(settings().refresh_token(&headers), Some("r2".to_string()));
    }

    #[test]
    fn test_bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
