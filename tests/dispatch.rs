use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::io::Write;
use std::sync::Mutex;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use trellis::prelude::*;
use trellis::task::Dependencies as Deps;
use trellis::testing::{TaskHarness, NOT};

#[derive(Output)]
struct GreetingOutput {
    name: String,
}

#[derive(Input)]
struct GreetingInput {
    name: Option<String>,
}

struct GreetingTask {
    attrs: Attrs,
}

impl Task for GreetingTask {
    type Output = GreetingOutput;

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    fn page_title(&self) -> String {
        "Greeting".to_string()
    }
}

fn new_greeting() -> anyhow::Result<GreetingTask> {
    Ok(GreetingTask { attrs: Attrs::new() })
}

fn greeting(task: &mut GreetingTask, input: Input<GreetingInput>) -> anyhow::Result<()> {
    let name = input.name.clone().unwrap_or_else(|| "World".to_string());
    task.attrs.set(GreetingOutput::NAME, name);
    Ok(())
}

#[derive(Output)]
struct BrokenOutput {
    name: String,
    nick: String,
}

struct BrokenTask {
    attrs: Attrs,
}

impl Task for BrokenTask {
    type Output = BrokenOutput;

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

#[derive(Output)]
struct VisitsOutput {
    visits: i64,
}

struct VisitsTask {
    attrs: Attrs,
}

impl Task for VisitsTask {
    type Output = VisitsOutput;

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

fn visits(task: &mut VisitsTask, cookies: Arc<Cookies>) -> anyhow::Result<()> {
    let previous: i64 = cookies.get("visits").map(|v| v.parse::<i64>()).transpose()?.unwrap_or(0);
    cookies.set("visits", (previous + 1).to_string());
    task.attrs.set(VisitsOutput::VISITS, previous + 1);
    Ok(())
}

struct ForwardTask {
    attrs: Attrs,
}

impl Task for ForwardTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

/// Records the order actions ran in.
#[derive(Default)]
struct RenderLog(Mutex<Vec<&'static str>>);

impl RenderLog {
    fn push(&self, name: &'static str) {
        self.0.lock().unwrap().push(name);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

macro_rules! embedded_task {
    ($name:ident, $attribute:literal, $deps:expr) => {
        struct $name {
            attrs: Attrs,
        }

        impl Task for $name {
            type Output = ();

            fn attrs(&self) -> &Attrs {
                &self.attrs
            }

            fn depends_on(&self) -> Deps {
                $deps
            }
        }

        impl EmbeddedTask for $name {
            const ATTRIBUTE: &'static str = $attribute;
        }
    };
}

embedded_task!(InnerTask, "inner", Deps::none());
embedded_task!(LeftTask, "left", Deps::none().with::<InnerTask>());
embedded_task!(RightTask, "right", Deps::none());

struct LayoutTask {
    attrs: Attrs,
}

impl Task for LayoutTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    fn depends_on(&self) -> Deps {
        Deps::none().with::<LeftTask>().with::<RightTask>()
    }
}

embedded_task!(WidgetTask, "widget", Deps::none());

struct DashboardTask {
    attrs: Attrs,
}

impl Task for DashboardTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    fn depends_on(&self) -> Deps {
        Deps::none().with::<WidgetTask>()
    }
}

struct ExportTask {
    attrs: Attrs,
}

impl Task for ExportTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

struct NoteTask {
    attrs: Attrs,
}

impl Task for NoteTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

struct Session;

struct FailingTask {
    attrs: Attrs,
}

impl Task for FailingTask {
    type Output = ();

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

struct SessionEvents(Arc<Mutex<Vec<&'static str>>>);

impl LifecycleHandler<Session> for SessionEvents {
    fn on_init(&self, _session: &Session) -> anyhow::Result<()> {
        self.0.lock().unwrap().push("begin");
        Ok(())
    }

    fn on_error(&self, _session: &Session, _error: &anyhow::Error) -> anyhow::Result<()> {
        self.0.lock().unwrap().push("rollback");
        Ok(())
    }

    fn on_success(&self, _session: &Session) -> anyhow::Result<()> {
        self.0.lock().unwrap().push("commit");
        Ok(())
    }
}

fn templates() -> TemplateEngine {
    TemplateEngine::new(
        MemoryTemplates::new()
            .with("page", "<title>{{ pagetitle }}</title>{{ body }}")
            .with("pages/greeting", "Hello, {{ name }}")
            .with("pages/broken", "{{ name }} {{ nick }}")
            .with("pages/visits", "{{ visits }}")
            .with("pages/layout", "{{ left }} {{ right }}")
            .with("pages/dashboard", "{{ widget }}")
            .with("embedded/inner", "inner")
            .with("embedded/left", "left[{{ inner }}]")
            .with("embedded/right", "right"),
    )
}

fn registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.page(new_greeting, greeting).unwrap();
    registry
        .page(
            || -> anyhow::Result<BrokenTask> { Ok(BrokenTask { attrs: Attrs::new() }) },
            |task: &mut BrokenTask| -> anyhow::Result<()> {
                task.attrs.set(BrokenOutput::NAME, "Ada".to_string());
                Ok(())
            },
        )
        .unwrap();
    registry
        .ajax(
            || -> anyhow::Result<VisitsTask> { Ok(VisitsTask { attrs: Attrs::new() }) },
            visits,
        )
        .unwrap();
    registry
        .ajax(
            || -> anyhow::Result<ForwardTask> { Ok(ForwardTask { attrs: Attrs::new() }) },
            |_task: &mut ForwardTask| -> anyhow::Result<PostAction> {
                Ok(PostAction::redirect_to_task::<GreetingTask>(Some("name=Bob")))
            },
        )
        .unwrap();
    registry
        .ajax(
            || -> anyhow::Result<FailingTask> { Ok(FailingTask { attrs: Attrs::new() }) },
            |_task: &mut FailingTask, _session: Arc<Session>| -> anyhow::Result<()> {
                anyhow::bail!("boom")
            },
        )
        .unwrap();

    registry
        .embedded(
            || -> anyhow::Result<InnerTask> { Ok(InnerTask { attrs: Attrs::new() }) },
            |_task: &mut InnerTask, log: Arc<RenderLog>| -> anyhow::Result<()> {
                log.push("inner");
                Ok(())
            },
        )
        .unwrap();
    registry
        .embedded(
            || -> anyhow::Result<LeftTask> { Ok(LeftTask { attrs: Attrs::new() }) },
            |_task: &mut LeftTask, log: Arc<RenderLog>| -> anyhow::Result<()> {
                log.push("left");
                Ok(())
            },
        )
        .unwrap();
    registry
        .embedded(
            || -> anyhow::Result<RightTask> { Ok(RightTask { attrs: Attrs::new() }) },
            |_task: &mut RightTask, log: Arc<RenderLog>| -> anyhow::Result<()> {
                log.push("right");
                Ok(())
            },
        )
        .unwrap();
    registry
        .embedded(
            || -> anyhow::Result<WidgetTask> { Ok(WidgetTask { attrs: Attrs::new() }) },
            |_task: &mut WidgetTask| -> anyhow::Result<PostAction> {
                Ok(PostAction::redirect_to_referer())
            },
        )
        .unwrap();
    registry
        .page(
            || -> anyhow::Result<DashboardTask> { Ok(DashboardTask { attrs: Attrs::new() }) },
            |_task: &mut DashboardTask| -> anyhow::Result<()> { Ok(()) },
        )
        .unwrap();
    registry
        .ajax(
            || -> anyhow::Result<ExportTask> { Ok(ExportTask { attrs: Attrs::new() }) },
            |_task: &mut ExportTask| -> anyhow::Result<PostAction> {
                Ok(PostAction::binary("text/csv", |out| out.write_all(b"id,name\n1,Ada\n")))
            },
        )
        .unwrap();
    registry
        .ajax(
            || -> anyhow::Result<NoteTask> { Ok(NoteTask { attrs: Attrs::new() }) },
            |_task: &mut NoteTask| -> anyhow::Result<PostAction> {
                Ok(PostAction::raw_string_utf8("Grüße <b>"))
            },
        )
        .unwrap();
    registry
        .page(
            || -> anyhow::Result<LayoutTask> { Ok(LayoutTask { attrs: Attrs::new() }) },
            |_task: &mut LayoutTask, log: Arc<RenderLog>| -> anyhow::Result<()> {
                log.push("layout");
                Ok(())
            },
        )
        .unwrap();
    registry
}

struct TestApp {
    dispatcher: Dispatcher,
    log: Arc<RenderLog>,
    session_events: Arc<Mutex<Vec<&'static str>>>,
}

impl TestApp {
    fn new(config: AppConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let log = Arc::new(RenderLog::default());
        let session_events = Arc::new(Mutex::new(Vec::new()));

        let mut objects = ObjectProvider::new();
        objects.register_arc(log.clone()).register(Session);

        let events = session_events.clone();
        let dispatcher = Dispatcher::builder(config)
            .registry(registry())
            .templates(templates())
            .objects(objects)
            .lifecycle(move || {
                let mut handlers = LifecycleHandlers::new();
                handlers.register::<Session, _>(SessionEvents(events.clone()));
                handlers
            })
            .build();
        Self {
            dispatcher,
            log,
            session_events,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let app = self.dispatcher.router().layer(TraceLayer::new_for_http());
        let response = app.oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        (
            parts.status,
            parts.headers,
            String::from_utf8(bytes.to_vec()).unwrap(),
        )
    }

    async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

#[tokio::test]
async fn test_page_is_wrapped_and_not_cached() {
    let app = TestApp::new(AppConfig::default());
    let (status, headers, body) = app.get("/app/greeting").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<title>Greeting</title>Hello, World");
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(headers[header::PRAGMA], "no-cache");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache, must-revalidate");
    assert!(headers.contains_key(header::EXPIRES));
}

#[tokio::test]
async fn test_binary_results_skip_templates() {
    let app = TestApp::new(AppConfig::default());

    let (status, headers, body) = app.get("/app/export").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    assert_eq!(body, "id,name\n1,Ada\n");

    let (status, headers, body) = app.get("/app/note").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body, "Grüße <b>");
}

#[tokio::test]
async fn test_embedded_task_must_render_content() {
    let app = TestApp::new(AppConfig::default());
    let (status, _, body) = app.get("/app/dashboard").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body.contains("Embedded task WidgetTask returned unsupported result custom"),
        "{}",
        body
    );
}

#[tokio::test]
async fn test_embedded_task_has_no_uri_of_its_own() {
    let app = TestApp::new(AppConfig::default());
    let (status, _, body) = app.get("/app/inner").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("of kind embedded cannot produce a top-level response"), "{}", body);
}

#[tokio::test]
async fn test_query_and_form_parameters() {
    let app = TestApp::new(AppConfig::default());
    let (_, _, body) = app.get("/app/greeting?name=Ada").await;
    assert!(body.ends_with("Hello, Ada"));

    let post = Request::post("/app/greeting")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("name=Grace+Hopper"))
        .unwrap();
    let (_, _, body) = app.send(post).await;
    assert!(body.ends_with("Hello, Grace Hopper"));
}

#[tokio::test]
async fn test_embedded_tasks_render_depth_first() {
    let app = TestApp::new(AppConfig::default());
    let (status, _, body) = app.get("/app/layout").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.ends_with("left[inner] right"), "{}", body);
    assert_eq!(app.log.entries(), vec!["inner", "left", "right", "layout"]);
}

#[tokio::test]
async fn test_missing_attribute_fails_the_request() {
    let app = TestApp::new(AppConfig::default());
    let (status, _, body) = app.get("/app/broken").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("<pre>"));
    assert!(body.contains("Missing attributes: nick in template pages/broken"), "{}", body);
}

#[tokio::test]
async fn test_production_hides_failure_details() {
    let app = TestApp::new(AppConfig::production());
    let (status, _, body) = app.get("/app/broken").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Internal Server Error");
}

#[tokio::test]
async fn test_unknown_and_empty_paths_redirect() {
    let app = TestApp::new(AppConfig::default());

    let (status, headers, _) = app.get("/").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "/index");

    let (status, headers, _) = app.get("/app/nothingHere").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], "index");
}

#[tokio::test]
async fn test_cookies_round_trip() {
    let app = TestApp::new(AppConfig::default());
    let request = Request::get("/app/visits")
        .header(header::COOKIE, "visits=4; theme=dark")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "5");
    let set_cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("visits=5"), "{}", set_cookie);
    assert!(set_cookie.contains("Path=/"), "{}", set_cookie);
    assert!(!set_cookie.contains("theme"));
}

#[tokio::test]
async fn test_lifecycle_sees_failed_action() {
    let app = TestApp::new(AppConfig::default());
    let (status, _, body) = app.get("/app/failing").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("boom"));
    assert_eq!(*app.session_events.lock().unwrap(), vec!["begin", "rollback"]);
}

#[tokio::test]
async fn test_static_files_bypass_tasks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("js")).unwrap();
    std::fs::write(dir.path().join("js/app.js"), "main();").unwrap();

    let config = AppConfig {
        static_root: Some(dir.path().to_path_buf()),
        ..AppConfig::default()
    };
    let app = TestApp::new(config);
    let (status, headers, body) = app.get("/app/app.js").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "main();");
    assert_eq!(headers[header::PRAGMA], "cache");

    let (status, _, _) = app.get("/app/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_harness_content_and_redirect() {
    let app = TestApp::new(AppConfig::default());
    let harness = TaskHarness::new(app.dispatcher.clone());

    let result = harness
        .action_with::<GreetingTask>(&[("name", "Ada & Bob")])
        .await
        .unwrap();
    assert_eq!(result.status(), StatusCode::OK);
    let absent = format!("{}Hello, World", NOT);
    result.assert_has_content(&["Hello, Ada &amp; Bob", absent.as_str()]);

    let result = harness.action::<ForwardTask>().await.unwrap();
    result.assert_redirect_to(&["/greeting", "name=Bob"]);
}
