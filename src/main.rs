use std::{process, sync::Arc};

use scoreprint::{
    application::{
        delivery::{DeliveryClient, DeviceDeliveryClient, RetryPolicy},
        error::AppError,
        jobs::{EngineConfig, PrintEngine},
        render::{Renderer, ResultDocumentRenderer},
        repos::SubmissionsRepo,
        results::ResultService,
    },
    config,
    infra::{
        catalog::load_catalog,
        error::InfraError,
        http::{self, HttpState},
        printer,
        shutdown::shutdown_signal,
        submissions::FsSubmissionStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Check(_) => run_check(settings).await,
    }
}

async fn run_check(settings: config::Settings) -> Result<(), AppError> {
    let catalog = load_catalog(&settings.storage.tests_file).await?;
    info!(
        target = "scoreprint::check",
        tests = catalog.len(),
        results_dir = %settings.storage.results_dir.display(),
        printer = ?settings.printer.backend,
        "configuration is valid"
    );
    Ok(())
}

fn engine_config(jobs: &config::JobsSettings) -> EngineConfig {
    EngineConfig {
        queue_capacity: jobs.queue_capacity,
        retry: RetryPolicy::new(jobs.max_attempts, jobs.retry_interval),
        ..EngineConfig::default()
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let catalog = Arc::new(load_catalog(&settings.storage.tests_file).await?);
    let submissions: Arc<dyn SubmissionsRepo> = Arc::new(FsSubmissionStore::new(
        settings.storage.results_dir.clone(),
    ));
    let renderer: Arc<dyn Renderer> = Arc::new(ResultDocumentRenderer::new(
        submissions.clone(),
        catalog.clone(),
    ));
    let device = printer::build_device(&settings.printer.backend);
    let client: Arc<dyn DeliveryClient> = Arc::new(
        DeviceDeliveryClient::new(device).with_attempt_timeout(settings.jobs.attempt_timeout),
    );

    let engine = PrintEngine::spawn(engine_config(&settings.jobs), renderer.clone(), client);
    let state = HttpState {
        results: ResultService::new(catalog, submissions, renderer, engine.submitter()),
        tasks: engine.store().clone(),
    };
    let router = http::build_router(state, &settings.http)?;

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "scoreprint::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = shutdown_signal().await {
                error!(
                    target = "scoreprint::serve",
                    error = %err,
                    "cannot listen for shutdown signals; stop the process forcibly"
                );
                std::future::pending::<()>().await;
            }
        })
        .await;

    let grace = settings.server.graceful_shutdown;
    match tokio::time::timeout(grace, engine.shutdown(settings.jobs.shutdown_policy)).await {
        Ok(Ok(())) => info!(target = "scoreprint::serve", "print engine stopped"),
        Ok(Err(err)) => error!(
            target = "scoreprint::serve",
            error = %err,
            "print engine stopped abnormally"
        ),
        Err(_) => warn!(
            target = "scoreprint::serve",
            grace = ?grace,
            "print engine did not stop within the graceful shutdown window"
        ),
    }

    served.map_err(|err| AppError::unexpected(format!("server error: {err}")))
}
