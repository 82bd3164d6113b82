//! Black-box test driver for tasks
//!
//! [`TaskHarness`] sends a request for a task through a complete
//! [`Dispatcher`] and captures what came back, so tests can check rendered
//! content and redirects without a running server.
//!
//! ```rust,ignore
//! let harness = TaskHarness::new(dispatcher);
//! let result = harness.action_with::<GreetingTask>(&[("name", "Ada")]).await?;
//! result.assert_has_content(&["Hello, Ada", "!!!Hello, World"]);
//! ```

use crate::dispatch::Dispatcher;
use crate::task::Task;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::Response;

/// Prefix of an expected string that must NOT be present.
pub const NOT: &str = "!!!";

/// Drives tasks through a dispatcher the way a browser would.
#[derive(Clone)]
pub struct TaskHarness {
    dispatcher: Dispatcher,
}

impl TaskHarness {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs task `T` without request parameters.
    pub async fn action<T: Task>(&self) -> anyhow::Result<RenderResult> {
        self.action_with::<T>(&[]).await
    }

    /// Runs task `T` with `params` as the query string.
    pub async fn action_with<T: Task>(&self, params: &[(&str, &str)]) -> anyhow::Result<RenderResult> {
        let mut uri = format!("/{}", self.dispatcher.registry().uri_name::<T>());
        if !params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().copied())
                .finish();
            uri.push('?');
            uri.push_str(&query);
        }
        let referer = format!("http://{}-test", crate::task::simple_type_name::<T>());
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::REFERER, referer)
            .body(Body::empty())?;
        RenderResult::from_response(self.dispatcher.dispatch(request).await).await
    }
}

/// What the dispatcher answered.
#[derive(Debug, Clone)]
pub struct RenderResult {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RenderResult {
    pub async fn from_response(response: Response) -> anyhow::Result<Self> {
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await?;
        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body: body.to_vec(),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// The `Location` of a redirect.
    pub fn redirect(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// The body as text.
    pub fn content(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn binary_content(&self) -> &[u8] {
        &self.body
    }

    /// Asserts that the content contains every entry; entries starting with
    /// [`NOT`] must be absent instead.
    pub fn assert_has_content(&self, contents: &[&str]) {
        assert_has(&self.content(), contents);
    }

    /// Asserts that this is a redirect whose location matches `contents` like
    /// [`RenderResult::assert_has_content`].
    pub fn assert_redirect_to(&self, contents: &[&str]) {
        assert!(self.is_redirect(), "Expected a redirect, got {}", self.status);
        assert_has(self.redirect().unwrap_or_default(), contents);
    }
}

fn assert_has(s: &str, contents: &[&str]) {
    for content in contents {
        match content.strip_prefix(NOT) {
            Some(absent) => assert!(!s.contains(absent), "Found {} in {}", absent, s),
            None => assert!(s.contains(content), "Did not find {} in: {}", content, s),
        }
    }
}
