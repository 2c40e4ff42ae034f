//! Streaming bridge binary entrypoint: parses CLI flags and
//! configuration, wires up the HTTP/WebSocket and gRPC surfaces, and
//! watches for `SIGINT`/`SIGTERM` to drain in-flight sessions, following
//! the teacher's `main.rs` shape (`dotenv` + `clap` + `slog` + an
//! `actix::System` hosting both a `tonic` server via `Arbiter::spawn`
//! and an `actix-web` `HttpServer`).

mod cli;
mod config;
mod error;
mod grpc;
mod http;
mod logging;
mod state;
mod supervisor;
mod ws;

use std::process::ExitCode;

use slog::{error, info};

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let matches = cli::parse_args();
    let _log_guard = logging::init_logger(matches.is_present("json_logs"));
    let logger = slog_scope::logger();

    let mut settings = match config::ServerSettings::load(matches.value_of("config")) {
        Ok(settings) => settings,
        Err(e) => {
            error!(logger, "failed to load configuration"; "error" => %e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(addr) = matches.value_of("http_addr") {
        settings.http_addr = addr.to_string();
    }
    if let Some(addr) = matches.value_of("grpc_addr") {
        settings.grpc_addr = addr.to_string();
    }

    let state = match state::AppState::new(settings, logger.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!(logger, "failed to initialize server state"; "error" => %e);
            return ExitCode::FAILURE;
        }
    };

    let grpc_addr: std::net::SocketAddr = match state.settings.grpc_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(logger, "invalid grpc_addr"; "error" => %e);
            return ExitCode::FAILURE;
        }
    };
    let signaling_server = grpc::SignalingService::new(state.clone()).into_server();
    let grpc_logger = logger.clone();
    actix::Arbiter::spawn(async move {
        if let Err(e) = tonic::transport::Server::builder()
            .add_service(signaling_server)
            .serve(grpc_addr)
            .await
        {
            error!(grpc_logger, "grpc server exited"; "error" => %e);
        }
    });
    info!(logger, "grpc signaling server started"; "addr" => %grpc_addr);

    let shutdown_state = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(shutdown_state.logger, "shutdown signal received, draining sessions");
            shutdown_state.shutdown.cancel();
            if let Err(e) = shutdown_state.rtp_pool.release_all().await {
                error!(shutdown_state.logger, "failed to release rtp ports on shutdown"; "error" => %e);
            }
            actix::System::current().stop();
        }
    });

    match http::run(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(logger, "http server exited"; "error" => %e);
            ExitCode::FAILURE
        }
    }
}
