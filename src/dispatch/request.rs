use axum::http::{header, HeaderMap, Method, Uri};
use biscotti::{Processor, ProcessorConfig, RemovalCookie, RequestCookies, ResponseCookie, ResponseCookies};
use dashmap::DashMap;
use std::fmt;
use biscotti::time::SignedDuration;
use std::sync::Arc;
use uuid::Uuid;

/// Identifies one dispatched request in logs. Injectable into tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The parts of the incoming HTTP request visible to tasks and responders.
#[derive(Debug, Clone)]
pub struct WebRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    request_id: RequestId,
    task_suffix: Arc<str>,
}

impl WebRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, task_suffix: impl Into<Arc<str>>) -> Self {
        Self {
            method,
            uri,
            headers,
            request_id: RequestId::new(),
            task_suffix: task_suffix.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of header `name`, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Suffix of task type names, used to build task URIs.
    pub fn task_suffix(&self) -> &str {
        &self.task_suffix
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CookieChange {
    Set { value: String, max_age: Option<u32> },
    Remove,
}

/// Request cookies plus the changes a task makes to them.
///
/// Values are percent-decoded when read and percent-encoded when sent, so
/// any text can be stored. Changes are sent back as `Set-Cookie` headers
/// once the request is finished.
pub struct Cookies {
    headers: Vec<String>,
    changes: DashMap<String, CookieChange>,
    processor: Processor,
}

impl Default for Cookies {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            changes: DashMap::new(),
            processor: ProcessorConfig::default().into(),
        }
    }
}

impl Cookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps every `Cookie` header of `headers`. Headers that are not valid text are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let headers = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| match value.to_str() {
                Ok(value) => Some(value.to_string()),
                Err(e) => {
                    tracing::warn!("A request cookie header is invalid, ignoring it: {}", e);
                    None
                }
            })
            .collect();
        Self {
            headers,
            ..Self::default()
        }
    }

    fn incoming(&self, name: &str) -> Option<String> {
        let mut cookies = RequestCookies::new();
        for header in &self.headers {
            if let Err(e) = cookies.extend_from_header(header, &self.processor) {
                tracing::warn!("A request cookie is invalid, ignoring it: {}", e);
            }
        }
        cookies.get(name).map(|cookie| {
            let value = cookie.value();
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
                .to_string()
        })
    }

    /// The current value of cookie `name`, including changes made during this request.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.changes.get(name).as_deref() {
            Some(CookieChange::Set { value, .. }) => Some(value.clone()),
            Some(CookieChange::Remove) => None,
            None => self.incoming(name),
        }
    }

    /// Sets a cookie that lasts for the browser session.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.changes.insert(
            name.into(),
            CookieChange::Set {
                value: value.into(),
                max_age: None,
            },
        );
    }

    /// Sets a cookie kept for `max_age_secs` seconds. A zero age removes the cookie.
    pub fn set_persistent(&self, name: impl Into<String>, value: impl Into<String>, max_age_secs: u32) {
        if max_age_secs == 0 {
            self.remove(name);
            return;
        }
        self.changes.insert(
            name.into(),
            CookieChange::Set {
                value: value.into(),
                max_age: Some(max_age_secs),
            },
        );
    }

    pub fn remove(&self, name: impl Into<String>) {
        self.changes.insert(name.into(), CookieChange::Remove);
    }

    /// `Set-Cookie` header values for the changes, ordered by cookie name.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let mut changes: Vec<(String, CookieChange)> = self
            .changes
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        changes.sort_by(|a, b| a.0.cmp(&b.0));
        changes
            .into_iter()
            .flat_map(|(name, change)| {
                let cookie: ResponseCookie<'static> = match change {
                    CookieChange::Set { value, max_age } => {
                        let mut cookie = ResponseCookie::new(name, value).set_path("/");
                        if let Some(age) = max_age {
                            cookie = cookie.set_max_age(SignedDuration::from_secs(i64::from(age)));
                        }
                        cookie
                    }
                    CookieChange::Remove => RemovalCookie::new(name).set_path("/").into(),
                };
                let mut single = ResponseCookies::default();
                single.insert(cookie);
                single.header_values(&self.processor).collect::<Vec<_>>()
            })
            .collect()
    }
}

impl fmt::Debug for Cookies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookies")
            .field("headers", &self.headers)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookies_read_and_change() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; lang=nb"));
        let cookies = Cookies::from_headers(&headers);

        assert_eq!(cookies.get("theme").as_deref(), Some("dark"));
        cookies.set("theme", "light");
        cookies.remove("lang");
        cookies.set_persistent("session", "abc", 3600);

        assert_eq!(cookies.get("theme").as_deref(), Some("light"));
        assert_eq!(cookies.get("lang"), None);

        let set = cookies.set_cookie_headers();
        assert_eq!(set.len(), 3);
        assert!(set[0].starts_with("lang=;"), "{}", set[0]);
        assert!(set[0].contains("Max-Age=0"), "{}", set[0]);
        assert!(set[1].starts_with("session=abc;"), "{}", set[1]);
        assert!(set[1].contains("Max-Age=3600"), "{}", set[1]);
        assert!(set[2].starts_with("theme=light;"), "{}", set[2]);
        assert!(set[2].contains("Path=/"), "{}", set[2]);
        assert!(!set[2].contains("Max-Age"), "{}", set[2]);
    }

    #[test]
    fn test_zero_age_removes() {
        let cookies = Cookies::new();
        cookies.set_persistent("token", "x", 0);
        let set = cookies.set_cookie_headers();
        assert_eq!(set.len(), 1);
        assert!(set[0].starts_with("token=;"), "{}", set[0]);
        assert!(set[0].contains("Max-Age=0"), "{}", set[0]);
    }

    #[test]
    fn test_values_cannot_add_attributes() {
        let cookies = Cookies::new();
        cookies.set("session", "abc; Domain=evil.example; HttpOnly");
        let set = cookies.set_cookie_headers();
        assert_eq!(set.len(), 1);
        assert!(set[0].starts_with("session=abc"), "{}", set[0]);
        assert!(!set[0].contains("; Domain"), "{}", set[0]);
        assert!(!set[0].contains("; HttpOnly"), "{}", set[0]);
        assert_eq!(set[0].matches(';').count(), 1, "{}", set[0]);
        assert_eq!(
            cookies.get("session").as_deref(),
            Some("abc; Domain=evil.example; HttpOnly")
        );
    }

    #[test]
    fn test_quoted_and_encoded_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("name=\"Ada\"; note=a%3Bb%20c"),
        );
        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.get("name").as_deref(), Some("Ada"));
        assert_eq!(cookies.get("note").as_deref(), Some("a;b c"));
        assert_eq!(cookies.get("other"), None);
    }

    #[test]
    fn test_web_request_accessors() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("/from"));
        let id = RequestId::new();
        let request = WebRequest::new(Method::POST, Uri::from_static("/app/save?x=1"), headers, "Task")
            .with_request_id(id);
        assert_eq!(request.path(), "/app/save");
        assert_eq!(request.header("referer"), Some("/from"));
        assert_eq!(request.request_id(), id);
        assert_eq!(request.task_suffix(), "Task");
    }
}
