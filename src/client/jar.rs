use cookie::{time::OffsetDateTime, Cookie};
use http::{header, Uri};
use parking_lot::Mutex;

use crate::{Request, RequestError, Response};

/// In-memory cookie store shared by every request of one client.
///
/// Cookies are identified by name, domain and path; storing a cookie with the
/// same identity replaces the old one.
#[derive(Debug, Default)]
pub(crate) struct CookieJar {
    cookies: Mutex<Vec<Stored>>,
}

#[derive(Debug, Clone)]
struct Stored {
    cookie: Cookie<'static>,
    // set when the cookie named no `Domain`; it then matches its origin host only
    host_only: bool,
}

impl CookieJar {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn snapshot(&self) -> Vec<Cookie<'static>> {
        self.cookies
            .lock()
            .iter()
            .map(|stored| stored.cookie.clone())
            .collect()
    }

    /// Adds every stored cookie that applies to `request` to its `Cookie` header.
    pub(crate) fn attach(&self, request: &mut Request) -> Result<(), RequestError> {
        let Some(host) = request.uri().host().map(str::to_ascii_lowercase) else {
            return Ok(());
        };
        let secure = request.uri().scheme_str() == Some("https");
        let now = OffsetDateTime::now_utc();
        let matching: Vec<_> = {
            let mut cookies = self.cookies.lock();
            cookies.retain(|stored| !stored.expired_at(now));
            cookies
                .iter()
                .filter(|stored| stored.applies(&host, request.uri().path(), secure))
                .map(|stored| stored.cookie.clone())
                .collect()
        };

        for cookie in &matching {
            request.add_cookie(cookie)?;
        }
        Ok(())
    }

    /// Records the `Set-Cookie` headers of `response`, received for `uri`.
    pub(crate) fn store(&self, uri: &Uri, response: &Response) {
        let Some(host) = uri.host().map(str::to_ascii_lowercase) else {
            return;
        };
        for value in response.get_headers(header::SET_COOKIE) {
            let parsed = value
                .to_str()
                .ok()
                .and_then(|raw| Cookie::parse(raw.to_owned()).ok());
            let Some(mut cookie) = parsed else {
                tracing::debug!(?value, "ignoring malformed Set-Cookie header");
                continue;
            };

            let domain = cookie
                .domain()
                .map(|domain| domain.trim_start_matches('.').to_ascii_lowercase())
                .filter(|domain| !domain.is_empty());
            if let Some(domain) = &domain {
                if !domain_matches(&host, domain) {
                    tracing::debug!(%host, %domain, "ignoring cookie set for a foreign domain");
                    continue;
                }
            }
            let host_only = domain.is_none();
            cookie.set_domain(domain.unwrap_or_else(|| host.clone()));
            if !cookie.path().is_some_and(|path| path.starts_with('/')) {
                cookie.set_path(default_path(uri.path()));
            }
            self.insert(Stored { cookie, host_only });
        }
    }

    fn insert(&self, new: Stored) {
        let expired = new.expired_at(OffsetDateTime::now_utc());

        let mut cookies = self.cookies.lock();
        cookies.retain(|stored| !stored.same_identity(&new.cookie));
        if expired {
            tracing::trace!(name = new.cookie.name(), "removed expired cookie");
        } else {
            cookies.push(new);
        }
    }
}

impl Stored {
    fn same_identity(&self, other: &Cookie<'_>) -> bool {
        let cookie = &self.cookie;
        cookie.name() == other.name() && cookie.domain() == other.domain() && cookie.path() == other.path()
    }

    /// `Max-Age` takes precedence over `Expires`.
    fn expired_at(&self, now: OffsetDateTime) -> bool {
        match self.cookie.max_age() {
            Some(age) => age.is_zero() || age.is_negative(),
            None => self
                .cookie
                .expires_datetime()
                .is_some_and(|expires| expires <= now),
        }
    }

    fn applies(&self, host: &str, path: &str, secure: bool) -> bool {
        let domain = self.cookie.domain().unwrap_or_default();
        let domain_ok = if self.host_only {
            host == domain
        } else {
            domain_matches(host, domain)
        };
        let path_ok = path_matches(path, self.cookie.path().unwrap_or("/"));
        let secure_ok = secure || !self.cookie.secure().unwrap_or(false);
        domain_ok && path_ok && secure_ok
    }
}

/// `host` is `domain` or one of its subdomains.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// RFC 6265 path-match: a prefix that ends at a `/` boundary.
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    match request_path.strip_prefix(cookie_path) {
        Some(rest) => cookie_path.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Directory of the request path, used when `Set-Cookie` names no path.
fn default_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_owned(),
        Some(end) => path[..end].to_owned(),
    }
}
