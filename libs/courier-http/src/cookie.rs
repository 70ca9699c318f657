//! Cookie reads for XSRF protection.

use parking_lot::RwLock;

/// Source of cookie values visible to the transport.
pub trait CookieStore: Send + Sync {
    /// Decoded value of the cookie called `name`.
    fn read(&self, name: &str) -> Option<String>;
}

/// Cookie store backed by a `name=value; other=value` string.
///
/// The string can be replaced at runtime, e.g. after a login response.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<String>,
}

impl CookieJar {
    #[must_use]
    pub fn new(cookies: impl Into<String>) -> Self {
        Self {
            cookies: RwLock::new(cookies.into()),
        }
    }

    pub fn set_cookies(&self, cookies: impl Into<String>) {
        *self.cookies.write() = cookies.into();
    }
}

impl CookieStore for CookieJar {
    fn read(&self, name: &str) -> Option<String> {
        let cookies = self.cookies.read();
        let raw = cookies.split(';').find_map(|pair| {
            let (key, value) = pair.trim_start().split_once('=')?;
            (key == name).then_some(value)
        })?;
        Some(
            urlencoding::decode(raw)
                .map_or_else(|_| raw.to_owned(), std::borrow::Cow::into_owned),
        )
    }
}
