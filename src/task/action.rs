use super::{simple_type_name, uri_name, Task};
use crate::dispatch::WebRequest;
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::io::{self, Write};

/// Writes the body of a binary response.
pub type BinaryWriter = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send>;

/// How a request is finished once the task's action has run.
pub enum PostAction {
    /// Render the task's own template.
    Default,
    /// Render the named template from the task's template directory.
    Template(String),
    /// Already rendered content.
    Content(String),
    /// Hand the response over to a [`Responder`].
    Custom(Box<dyn Responder>),
    /// Raw bytes with their content type.
    Binary {
        content_type: String,
        writer: BinaryWriter,
    },
}

impl PostAction {
    pub fn template(name: impl Into<String>) -> Self {
        PostAction::Template(name.into())
    }

    pub fn content(content: impl Into<String>) -> Self {
        PostAction::Content(content.into())
    }

    /// Sends `s` as UTF-8 `text/plain`; no template is used.
    pub fn raw_string_utf8(s: impl Into<String>) -> Self {
        let s = s.into();
        Self::binary("text/plain", move |out| out.write_all(s.as_bytes()))
    }

    pub fn binary<F>(content_type: impl Into<String>, writer: F) -> Self
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
    {
        PostAction::Binary {
            content_type: content_type.into(),
            writer: Box::new(writer),
        }
    }

    pub fn custom(responder: impl Responder) -> Self {
        PostAction::Custom(Box::new(responder))
    }

    /// Redirects to the page the client came from.
    pub fn redirect_to_referer() -> Self {
        Self::custom(|request: &WebRequest| -> anyhow::Result<Response> {
            let referer = request
                .header(header::REFERER.as_str())
                .ok_or_else(|| anyhow::anyhow!("No Referer header to redirect to"))?;
            found(referer)
        })
    }

    /// Redirects to the task `T` next to the current URI, with an optional query string.
    pub fn redirect_to_task<T: Task>(query: Option<&str>) -> Self {
        let query = query.map(str::to_string);
        Self::custom(move |request: &WebRequest| -> anyhow::Result<Response> {
            let path = request.uri().path();
            let base = &path[..path.rfind('/').map_or(0, |k| k + 1)];
            let mut location = format!(
                "{}{}",
                base,
                uri_name(simple_type_name::<T>(), request.task_suffix())
            );
            if let Some(query) = &query {
                location.push('?');
                location.push_str(query);
            }
            found(&location)
        })
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            PostAction::Default => "default",
            PostAction::Template(_) => "template",
            PostAction::Content(_) => "content",
            PostAction::Custom(_) => "custom",
            PostAction::Binary { .. } => "binary",
        }
    }
}

impl From<()> for PostAction {
    fn from(_: ()) -> Self {
        PostAction::Default
    }
}

impl fmt::Debug for PostAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostAction::Template(name) => f.debug_tuple("Template").field(name).finish(),
            PostAction::Content(content) => f.debug_tuple("Content").field(content).finish(),
            PostAction::Binary { content_type, .. } => f
                .debug_struct("Binary")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
            other => f.write_str(other.kind_name()),
        }
    }
}

/// Full control over the response, bypassing templates and headers set by the dispatcher.
#[async_trait]
pub trait Responder: Send + 'static {
    async fn respond(self: Box<Self>, request: &WebRequest) -> anyhow::Result<Response>;
}

#[async_trait]
impl<F> Responder for F
where
    F: FnOnce(&WebRequest) -> anyhow::Result<Response> + Send + 'static,
{
    async fn respond(self: Box<Self>, request: &WebRequest) -> anyhow::Result<Response> {
        (*self)(request)
    }
}

/// A `302 Found` pointing at `location`.
pub(crate) fn found(location: &str) -> anyhow::Result<Response> {
    let location = HeaderValue::from_str(location)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
