//! Refresh-token cookie transport.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub max_age_secs: i64,
    pub path: String,
    /// Adds `Secure` and `SameSite=Lax`.
    pub secure: bool,
}

impl CookieSettings {
    pub fn from_config(cfg: &configs::AuthConfig) -> Self {
        Self {
            name: cfg.cookie_name.clone(),
            max_age_secs: i64::try_from(cfg.cookie_max_age_secs).unwrap_or(i64::MAX),
            path: cfg.cookie_path.clone(),
            secure: cfg.cookie_secure,
        }
    }

    fn build(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.set_path(self.path.clone());
        cookie.set_http_only(true);
        cookie.set_max_age(time::Duration::seconds(self.max_age_secs));
        if self.secure {
            cookie.set_secure(true);
            cookie.set_same_site(SameSite::Lax);
        }
        cookie
    }

    pub fn set_refresh_cookie(&self, jar: CookieJar, token: String) -> CookieJar {
        jar.add(self.build(token))
    }

    /// Always emits an expiring `Set-Cookie`, whether or not the request carried the cookie.
    pub fn clear_refresh_cookie(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = self.build(String::new());
        cookie.make_removal();
        jar.add(cookie)
    }

    pub fn read_refresh_cookie(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn read_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        self.read_refresh_cookie(&CookieJar::from_headers(headers))
    }
}
