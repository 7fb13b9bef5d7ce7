//! Demo server for the request pipeline.
//!
//! Serves a couple of example routes so the pipeline can be exercised
//! with curl:
//!
//! ```text
//! GET  /hello/:name?          greeter service + optional url param
//! POST /notes                 JSON or form body, guarded by x-api-key
//! ```

use std::path::PathBuf;

use axum::http::Method;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use request_pipeline::config::{load_config, HttpConfig};
use request_pipeline::observability::{logging, metrics};
use request_pipeline::schema::{integer, object, string};
use request_pipeline::{
    Guard, HttpError, HttpServer, Moment, Request, Response, ResponseInterceptor, Route,
    ServiceProvider, ServiceRegistry, Services,
};

#[derive(Parser)]
#[command(name = "request-pipeline")]
#[command(about = "HTTP request pipeline demo server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

struct Greeter {
    greeting: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HttpConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("request-pipeline v0.1.0 starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        max_body_size = config.route.body.max_body_size,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = ServiceRegistry::new()
        .with(
            "greeter",
            ServiceProvider::singleton(|_| {
                Ok(Greeter {
                    greeting: "Hello".to_string(),
                })
            }),
        )
        .with("api_key", ServiceProvider::value("letmein".to_string()));

    let mut server = HttpServer::with_services(config, registry);
    server
        .add_route(
            Route::new("/hello/:name?", |req: Request, services: Services| async move {
                let greeter = services.require::<Greeter>("greeter")?;
                let name = req
                    .url_param("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("world")
                    .to_string();
                Ok::<_, HttpError>(json!({ "message": format!("{}, {name}!", greeter.greeting) }))
            })
            .url_param("name", string().optional())
            .requires(["greeter"])
            .intercept_response(
                ResponseInterceptor::named("powered-by", |response: Response, _| async move {
                    response.with_header("x-powered-by", "request-pipeline")
                })
                .at([Moment::Always]),
            ),
        )
        .add_route(
            Route::new("/notes", |req: Request, _services| async move {
                let note = req.body.clone().unwrap_or_default();
                Response::json(axum::http::StatusCode::CREATED, json!({ "created": note }))
            })
            .method(Method::POST)
            .body(
                object()
                    .field("title", string().min_len(1).max_len(120))
                    .field("priority", integer().min(0.0).max(5.0).optional()),
            )
            .guard(
                Guard::named("api-key", |req: Request, _route, services: Services| async move {
                    let expected = services.get::<String>("api_key");
                    matches!((req.header_str("x-api-key"), expected), (Some(given), Some(expected)) if given == expected.as_str())
                })
                .requires(["api_key"]),
            ),
        );

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
