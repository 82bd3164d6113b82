//! A single page with an embedded menu, typed input and a cookie counter.
//!
//! ```sh
//! cargo run --example greeting
//! ```
//!
//! Then open <http://127.0.0.1:3000/>.

use serde_json::json;
use strum_macros::{Display, EnumIter};
use trellis::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, InputEnum, EnumIter, Display)]
enum Mood {
    #[strum(to_string = "Cheerful")]
    Happy,
    #[strum(to_string = "Grumpy")]
    Sad,
}

#[derive(Output)]
struct MenuOutput {
    links: serde_json::Value,
    visits: Option<i64>,
}

struct MenuTask {
    attrs: Attrs,
}

impl Task for MenuTask {
    type Output = MenuOutput;

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

impl EmbeddedTask for MenuTask {
    const ATTRIBUTE: &'static str = "menu";
}

fn menu(task: &mut MenuTask, cookies: Arc<Cookies>) -> anyhow::Result<()> {
    let visits = cookies
        .get("visits")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
        + 1;
    cookies.set_persistent("visits", visits.to_string(), 3600);

    task.attrs
        .set(
            MenuOutput::LINKS,
            json!([
                { "href": "greeting", "text": "Home" },
                { "href": "greeting?name=Ferris", "text": "Ferris" },
            ]),
        )
        .set(MenuOutput::VISITS, (visits > 1).then_some(visits));
    Ok(())
}

#[derive(Output)]
struct GreetingOutput {
    name: String,
    moods: Vec<DropdownElement>,
}

#[derive(Input)]
struct GreetingInput {
    name: Option<String>,
    mood: Option<Mood>,
}

struct GreetingTask {
    attrs: Attrs,
    title: String,
}

impl Task for GreetingTask {
    type Output = GreetingOutput;

    fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    fn depends_on(&self) -> Dependencies {
        Dependencies::none().with::<MenuTask>()
    }

    fn page_title(&self) -> String {
        self.title.clone()
    }
}

fn greeting(task: &mut GreetingTask, input: Input<GreetingInput>) -> anyhow::Result<()> {
    let name = input.name.clone().unwrap_or_else(|| "World".to_string());
    task.title = format!("Greeting {}", name);
    task.attrs
        .set(GreetingOutput::NAME, name)
        .set(GreetingOutput::MOODS, DropdownElement::from_enum(input.mood));
    Ok(())
}

fn tasks() -> anyhow::Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    registry
        .embedded(
            || -> anyhow::Result<MenuTask> { Ok(MenuTask { attrs: Attrs::new() }) },
            menu,
        )?
        .page(
            || -> anyhow::Result<GreetingTask> {
                Ok(GreetingTask {
                    attrs: Attrs::new(),
                    title: String::new(),
                })
            },
            greeting,
        )?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let settings = ConfigService::new();
    let mut config = AppConfig::from_config(&settings)?;
    if settings.get("TRELLIS_DEFAULT_URI").is_none() {
        config.default_uri = "greeting".to_string();
    }
    if settings.get("TRELLIS_TEMPLATE_ROOT").is_none() {
        config.template_root = "demos/templates".into();
    }
    if config.static_root.is_none() {
        config.static_root = Some("demos/static".into());
    }

    let dispatcher = Dispatcher::builder(config).registry(tasks()?).build();
    let app = Application::new(dispatcher).merge(
        Router::new().route("/health", axum::routing::get(|| async { "OK" })),
    );

    let port = settings.get("PORT").unwrap_or_else(|| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    app.serve(listener).await?;
    Ok(())
}
