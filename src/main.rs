use crate::{
    app::App,
    cli::{Command, ServeArgs, Session},
    handler::{
        handle_create_link, handle_health, handle_list_links, handle_method_not_allowed,
        handle_preflight,
    },
    remote::DEFAULT_POLAR_API_URL,
};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method},
    routing::{get, post},
};
use clap::Parser;
use dub_rs::DubApi;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;
mod credentials;
mod dashboard;
mod handler;
mod in_flight;
mod models;
mod remote;
mod short_urls;
mod signals;
mod store;
#[cfg(test)]
mod test_util;

#[cfg(not(debug_assertions))]
#[must_use]
pub const fn is_debug() -> bool {
    false
}

#[cfg(debug_assertions)]
#[must_use]
pub const fn is_debug() -> bool {
    true
}

#[derive(Parser, Debug)]
#[command(version, about = "Polar checkout links, shortened with Dub")]
struct Arguments {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Logging level of the Rust log", env = "RUST_LOG")]
    #[clap(default_value_t = String::from("info,tower_http=debug"))]
    rust_log_level: String,

    #[arg(long, global = true, default_value = ".polar-dub", env = "DATA_DIR")]
    data_dir: PathBuf,

    #[arg(
        long,
        global = true,
        default_value_t = 30,
        help = "Timeout for calls to Polar, Dub and the proxy",
        env = "UPSTREAM_TIMEOUT_SECS"
    )]
    upstream_timeout_secs: u64,

    #[arg(long, global = true, default_value_t = String::from(DEFAULT_POLAR_API_URL), env = "POLAR_API_URL")]
    polar_api_url: String,

    #[arg(long, global = true, default_value_t = String::from("http://localhost:3001"), env = "PROXY_URL")]
    proxy_url: String,
}

const ALLOWED_HEADERS: [&str; 9] = [
    "x-csrf-token",
    "x-requested-with",
    "accept",
    "accept-version",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "x-api-version",
];

fn setup_cors(frontend_url: Option<String>) -> CorsLayer {
    let origin = match frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => {
            tracing::info!("cors setup: origin {:?}", origin);
            AllowOrigin::exact(origin)
        }
        Some(Err(e)) => {
            tracing::warn!("invalid frontend url, allowing any origin: {e}");
            AllowOrigin::mirror_request()
        }
        None => {
            tracing::info!("cors setup: any origin");
            AllowOrigin::mirror_request()
        }
    };

    CorsLayer::new()
        .allow_credentials(true)
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers(ALLOWED_HEADERS.map(HeaderName::from_static))
}

pub fn router(app: Arc<App>, frontend_url: Option<String>) -> Router {
    Router::new()
        .route(
            "/api/dub/links",
            post(handle_create_link)
                .get(handle_list_links)
                .options(handle_preflight)
                .fallback(handle_method_not_allowed),
        )
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(setup_cors(frontend_url))
        .with_state(app)
}

async fn serve(args: ServeArgs, timeout: Duration) -> anyhow::Result<()> {
    let dub = DubApi::new()
        .with_url(&args.dub_api_url)
        .with_timeout(timeout)?;

    tracing::info!(upstream = dub.url(), "dub client configured");

    let router = router(App::new(Arc::new(dub)), args.frontend_url);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    tracing::info!("listening on http://{}", addr);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    signals::create_term_signal_handler(tx);

    let listener = TcpListener::bind(addr).await?;

    let graceful = axum::serve(listener, router).with_graceful_shutdown(async {
        rx.await.ok();
    });

    if let Err(e) = graceful.await {
        tracing::error!("server error: {}", e);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(args.rust_log_level.clone()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(is_debug())
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::info!(
        git_sha = env!("VERGEN_GIT_SHA"),
        git_dirty = env!("VERGEN_GIT_DIRTY"),
        "starting polar-dub"
    );

    let timeout = Duration::from_secs(args.upstream_timeout_secs);

    match args.command {
        Command::Serve(serve_args) => serve(serve_args, timeout).await,
        command => {
            let session = Session {
                data_dir: args.data_dir,
                polar_api_url: args.polar_api_url,
                proxy_url: args.proxy_url,
                timeout,
            };
            cli::run(command, &session).await
        }
    }
}
