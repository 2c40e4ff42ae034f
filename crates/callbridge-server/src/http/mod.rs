//! The HTTP/WebSocket surface: `CallContext` webhooks (§4.5) plus the
//! per-provider WebSocket upgrade (§4.4), assembled the way the teacher's
//! `api::run` wires its `App` in `mock/control-api/src/api/mod.rs` —
//! `App::new()` + shared `Data` + `middleware::Logger` + `web::resource`.

pub mod webhooks;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use slog::info;

use crate::state::AppState;

/// Runs the HTTP server until it's told to stop; bound address comes
/// from `state.settings.http_addr`.
pub async fn run(state: Arc<AppState>) -> std::io::Result<()> {
    let addr = state.settings.http_addr.clone();
    info!(state.logger, "starting http server"; "addr" => &addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(
                web::resource("/call-context")
                    .route(web::post().to(webhooks::save)),
            )
            .service(
                web::resource("/call-context/{context_id}")
                    .route(web::get().to(webhooks::get))
                    .route(web::delete().to(webhooks::delete)),
            )
            .service(
                web::resource("/call-context/{context_id}/claim")
                    .route(web::post().to(webhooks::claim)),
            )
            .service(
                web::resource("/call-context/{context_id}/complete")
                    .route(web::post().to(webhooks::complete)),
            )
            .service(
                web::resource("/call-context/{context_id}/field")
                    .route(web::patch().to(webhooks::update_field)),
            )
            .service(
                web::resource("/ws/{provider}/{assistant_id}/{conversation_id}")
                    .route(web::get().to(crate::ws::create_ws)),
            )
    })
    .bind(&addr)?
    .run()
    .await
}
