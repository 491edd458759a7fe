use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{error, info};
use raven_manager::{
    api::Api,
    config::AppConfig,
    http_client::https_client,
    raven_api_client::RavenApiClient,
    session::SessionController,
    vehicle_lookup::NhtsaVehicleLookup,
};
use std::io::Write;
use tokio::signal::unix::{SignalKind, signal};

type UiApi = Api<RavenApiClient<NhtsaVehicleLookup>>;

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

fn initialize() {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));
}

async fn run() -> Result<()> {
    initialize();

    let config = AppConfig::load().context("failed to load configuration")?;
    info!("using API domain {}", config.api.domain);

    let client = https_client()?;
    let vehicle_lookup = NhtsaVehicleLookup::new(
        client.clone(),
        &config.vehicle_lookup,
        config.timeouts.vehicle_lookup,
    );
    let raven_client = RavenApiClient::new(
        client,
        &config.api.domain,
        config.timeouts,
        vehicle_lookup,
    );
    let api = Data::new(UiApi::new(SessionController::new(
        raven_client,
        config.api.credentials.clone(),
    )));

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let bind_address = format!("{}:{}", config.ui.bind_address, config.ui.port);
    info!("starting server on http://{bind_address}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(api.clone())
            .configure(UiApi::configure)
    })
    .bind(&bind_address)
    .context("failed to bind server")?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
        },
    }

    server_handle.stop(true).await;

    match server_task.await {
        Ok(result) => result.context("server failed"),
        Err(e) => Err(e).context("server task failed"),
    }
}
