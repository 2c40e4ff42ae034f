//! WebSocket upgrade route for telephony providers (§4.4), grounded on
//! the teacher's `create_ws` handler in `mock/control-api/src/api/ws.rs`:
//! parse the path, look up the provider's credential, hand off to
//! [`actix_web_actors::ws::start`].

mod session;

pub use session::{Provider, WsSession};

use std::sync::Arc;

use actix_web::web::{Data, Path, Payload};
use actix_web::{Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use callbridge_telephony::ProviderCredential;

use crate::state::AppState;

/// `/ws/{provider}/{assistant_id}/{conversation_id}`.
pub async fn create_ws(
    request: HttpRequest,
    path: Path<(String, String, String)>,
    state: Data<Arc<AppState>>,
    payload: Payload,
) -> Result<HttpResponse, Error> {
    let (provider_name, assistant_id, conversation_id) = path.into_inner();

    let provider = Provider::parse(&provider_name)
        .map_err(actix_web::error::ErrorBadRequest)?;

    let credential = state
        .settings
        .providers
        .credentials
        .get(&provider_name)
        .map(|c| ProviderCredential {
            id: c.id.clone(),
            secret: c.secret.clone(),
        })
        .ok_or_else(|| {
            actix_web::error::ErrorUnauthorized(format!(
                "no credential configured for provider {provider_name:?}"
            ))
        })?;

    ws::start(
        WsSession::new(
            state.get_ref().clone(),
            provider,
            assistant_id,
            conversation_id,
            credential,
        ),
        &request,
        payload,
    )
}
