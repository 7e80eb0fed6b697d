use std::process;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use pristine_pay::{
    assistant::{Assistant, GeminiModel},
    config::{Config, PaymentBackend},
    db::{InMemoryRepository, Repository},
    gateway::{PaymentGateway, PaymentProcessor, SandboxProcessor, StripeProcessor},
    routes::{self, AppState},
    terminal::{CheckoutLinks, Terminal, TerminalTimings},
    AppError,
};

#[tokio::main]
async fn main() {
    // settings are read before logging exists, report problems on stderr
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (file_writer, _file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global subscriber: {err}");
        process::exit(1);
    }

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => {
            tracing::info!("Listening on port: {}", config.port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = match process_begin(&config) {
        Ok(router) => {
            tracing::info!("Routes constructed successfully");
            router
        }
        Err(err) => {
            tracing::error!("Failed to construct routes: {}", err);
            process::exit(1);
        }
    };

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

fn process_begin(config: &Config) -> Result<Router, AppError> {
    let processor: Arc<dyn PaymentProcessor> = match config.backend {
        PaymentBackend::Stripe => Arc::new(StripeProcessor::new(config.stripe_secret_key.clone())),
        PaymentBackend::Sandbox => {
            tracing::warn!("using the in-memory sandbox processor, no real charges are made");
            Arc::new(SandboxProcessor::new())
        }
    };
    let gateway = Arc::new(PaymentGateway::new(processor));
    tracing::info!("payment processor: {}", gateway.processor_name());

    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::seeded()?);
    let terminal = Terminal::new(
        gateway.clone(),
        repo.clone(),
        CheckoutLinks::new(config.public_origin.clone()),
        TerminalTimings::default(),
    );

    let model = GeminiModel::new(config.gemini_api_key.clone(), config.gemini_model.clone());
    let assistant = Arc::new(Assistant::new(Arc::new(model)));

    if config.stripe_publishable_key.is_none() {
        tracing::warn!("STRIPE_PUBLISHABLE_KEY is not set, customer payment pages will fail");
    }

    Ok(routes::app(AppState {
        gateway,
        terminal,
        repo,
        assistant,
        cart: Arc::default(),
        publishable_key: config.stripe_publishable_key.clone(),
    }))
}
