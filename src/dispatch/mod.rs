//! URI dispatch
//!
//! The [`Dispatcher`] is the axum fallback handler of an application. For each
//! request it:
//!
//! 1. redirects the empty path to the default URI,
//! 2. serves static files by extension,
//! 3. maps the last path segment to a task (unknown names redirect to the default URI),
//! 4. builds the request's object provider and lifecycle handlers,
//! 5. renders the task's embedded tasks depth-first, then the task itself,
//! 6. finishes the response according to the task kind.
//!
//! Any failure is logged with the URI and handed to the [`ExceptionFilter`].

mod assets;
mod pipeline;
mod request;

pub use assets::{cache_forever_headers, no_cache_headers, StaticResources};
pub use pipeline::PAGE_TEMPLATE;
pub use request::{Cookies, RequestId, WebRequest};

use crate::config::AppConfig;
use crate::di::{LifecycleHandlers, ObjectProvider};
use crate::exception::{DiagnosticFilter, ExceptionFilter, ProductionFilter};
use crate::input::{DynamicInput, InputParsers};
use crate::render::Renderer;
use crate::task::{found, TaskRegistry};
use crate::template::{DirTemplates, TemplateEngine, TemplateRenderer};
use axum::extract::{FromRequest, Query, Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::{Form, Router};
use pipeline::{Finished, Pipeline};
use std::sync::Arc;
use tracing::Instrument;

type LifecycleFactory = Arc<dyn Fn() -> LifecycleHandlers + Send + Sync>;

struct Inner {
    config: AppConfig,
    registry: TaskRegistry,
    renderer: Renderer,
    objects: ObjectProvider,
    parsers: InputParsers,
    lifecycle: LifecycleFactory,
    statics: Option<StaticResources>,
    filter: Arc<dyn ExceptionFilter>,
}

/// Resolves request URIs to tasks and serves them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn builder(config: AppConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.inner.registry
    }

    /// A router sending every request to this dispatcher.
    pub fn router(&self) -> Router {
        Router::new().fallback(handle).with_state(self.clone())
    }

    /// Serves one request. Never fails: errors become the exception filter's response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let request_id = RequestId::new();
        let uri = request.uri().clone();
        let span = tracing::info_span!("dispatch", request_id = %request_id, uri = %uri);
        async move {
            match self.serve(request, request_id).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!("Failed serving {}: {:?}", uri, err);
                    self.inner.filter.catch(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn serve(&self, request: Request, request_id: RequestId) -> anyhow::Result<Response> {
        let inner = &self.inner;
        let path = request.uri().path().to_string();
        if path.is_empty() || path == "/" {
            return found(&format!("/{}", inner.config.default_uri));
        }
        if let Some(statics) = &inner.statics {
            if let Some(response) = statics.serve(&path).await {
                return Ok(response);
            }
        }

        tracing::info!(
            "Serving URI: {}{}",
            path,
            if inner.config.diagnostic { " [debug mode]" } else { "" }
        );
        let Some(entry) = inner.registry.resolve_uri(&path) else {
            tracing::info!("No task found, sending to default URI");
            return found(&inner.config.default_uri);
        };

        let web_request = Arc::new(
            WebRequest::new(
                request.method().clone(),
                request.uri().clone(),
                request.headers().clone(),
                inner.registry.suffix(),
            )
            .with_request_id(request_id),
        );
        let cookies = Arc::new(Cookies::from_headers(request.headers()));
        let params = read_params(request).await?;
        let input = Arc::new(DynamicInput::from_pairs(params, inner.parsers.clone()));

        let finished = {
            let inner = self.inner.clone();
            let web_request = web_request.clone();
            let cookies = cookies.clone();
            tokio::task::spawn_blocking(move || {
                let mut provider = inner.objects.clone();
                provider
                    .register_arc(web_request)
                    .register_arc(cookies)
                    .register(request_id);
                let pipeline = Pipeline {
                    registry: &inner.registry,
                    renderer: &inner.renderer,
                    provider,
                    handlers: (inner.lifecycle)(),
                    input,
                };
                pipeline.run(&entry)
            })
            .await??
        };

        let mut response = match finished {
            Finished::Respond(responder) => responder.respond(&web_request).await?,
            Finished::Bytes { content_type, body } => {
                let content_type = HeaderValue::from_str(&content_type)?;
                ([(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            Finished::Html(content) => {
                let mut response = (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    content,
                )
                    .into_response();
                no_cache_headers(response.headers_mut());
                response
            }
        };
        for cookie in cookies.set_cookie_headers() {
            response
                .headers_mut()
                .append(header::SET_COOKIE, HeaderValue::from_str(&cookie)?);
        }
        Ok(response)
    }
}

async fn handle(State(dispatcher): State<Dispatcher>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}

/// Query parameters followed by the fields of a url-encoded POST body.
async fn read_params(request: Request) -> anyhow::Result<Vec<(String, String)>> {
    let Query(mut params) = Query::<Vec<(String, String)>>::try_from_uri(request.uri())?;
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if *request.method() == Method::POST && is_form {
        let Form(fields) = Form::<Vec<(String, String)>>::from_request(request, &()).await?;
        params.extend(fields);
    }
    Ok(params)
}

/// Collects what a [`Dispatcher`] needs; missing pieces are derived from the [`AppConfig`].
pub struct DispatcherBuilder {
    config: AppConfig,
    registry: Option<TaskRegistry>,
    templates: Option<Arc<dyn TemplateRenderer>>,
    objects: ObjectProvider,
    parsers: InputParsers,
    lifecycle: Option<LifecycleFactory>,
    statics: Option<StaticResources>,
    filter: Option<Arc<dyn ExceptionFilter>>,
}

impl DispatcherBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            templates: None,
            objects: ObjectProvider::new(),
            parsers: InputParsers::new(),
            lifecycle: None,
            statics: None,
            filter: None,
        }
    }

    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the template engine read from `template_root`.
    ///
    /// A replacement engine gets the `cached` function only through
    /// [`TemplateEngine::with_static_resources`].
    pub fn templates(mut self, templates: impl TemplateRenderer) -> Self {
        self.templates = Some(Arc::new(templates));
        self
    }

    /// Process-wide objects, copied into the provider of every request.
    pub fn objects(mut self, objects: ObjectProvider) -> Self {
        self.objects = objects;
        self
    }

    /// Parsers for application input types.
    pub fn parsers(mut self, parsers: InputParsers) -> Self {
        self.parsers = parsers;
        self
    }

    /// Builds the lifecycle handlers of each request.
    pub fn lifecycle<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> LifecycleHandlers + Send + Sync + 'static,
    {
        self.lifecycle = Some(Arc::new(factory));
        self
    }

    pub fn static_resources(mut self, statics: StaticResources) -> Self {
        self.statics = Some(statics);
        self
    }

    pub fn exception_filter(mut self, filter: impl ExceptionFilter) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn build(self) -> Dispatcher {
        let config = self.config;
        let statics = self.statics.or_else(|| {
            config
                .static_root
                .clone()
                .map(|root| StaticResources::new(root).caching(!config.diagnostic))
        });
        let templates: Arc<dyn TemplateRenderer> = match self.templates {
            Some(templates) => templates,
            None => {
                let mut engine = TemplateEngine::new(DirTemplates::new(config.template_root.clone()))
                    .caching(!config.diagnostic);
                if let Some(statics) = &statics {
                    engine = engine.with_static_resources(statics.clone());
                }
                Arc::new(engine)
            }
        };
        let filter: Arc<dyn ExceptionFilter> = match self.filter {
            Some(filter) => filter,
            None if config.diagnostic => Arc::new(DiagnosticFilter),
            None => Arc::new(ProductionFilter),
        };
        let lifecycle: LifecycleFactory = match self.lifecycle {
            Some(lifecycle) => lifecycle,
            None => Arc::new(LifecycleHandlers::new),
        };
        let inner = Inner {
            registry: self
                .registry
                .unwrap_or_else(|| TaskRegistry::with_suffix(config.task_suffix.as_str())),
            renderer: Renderer::new(templates).strict(config.strict_injection),
            objects: self.objects,
            parsers: self.parsers,
            lifecycle,
            statics,
            filter,
            config,
        };
        tracing::info!(
            "Dispatcher ready with {} tasks{}",
            inner.registry.len(),
            if inner.config.diagnostic { " [debug mode]" } else { "" }
        );
        Dispatcher {
            inner: Arc::new(inner),
        }
    }
}
