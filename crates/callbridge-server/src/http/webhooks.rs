//! REST wrapper over the `CallContext` store (§4.5): the out-of-band
//! setup webhooks a telephony provider or outbound dialer calls before a
//! media connection exists, mirroring the teacher's `api::create`/`get`/
//! `delete` REST-wrapper-over-a-client shape.

use std::sync::Arc;

use actix_web::web::{Data, Json, Path};
use actix_web::HttpResponse;
use callbridge_context::CallContext;
use serde::{Deserialize, Serialize};
use slog::error;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub text: String,
}

fn err(text: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse { text: text.into() })
}

#[derive(Debug, Deserialize)]
pub struct SaveCallContextRequest {
    pub direction: String,
    pub assistant_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub auth_type: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub caller_number: String,
    #[serde(default)]
    pub callee_number: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default)]
    pub assistant_provider_id: String,
}

#[derive(Debug, Serialize)]
pub struct SaveCallContextResponse {
    pub context_id: String,
}

pub async fn save(state: Data<Arc<AppState>>, body: Json<SaveCallContextRequest>) -> HttpResponse {
    let mut cc = match body.direction.as_str() {
        "inbound" => CallContext::new_inbound(&body.assistant_id, &body.conversation_id),
        "outbound" => CallContext::new_outbound(&body.assistant_id, &body.conversation_id),
        other => return err(format!("unknown direction {other:?}")),
    };
    cc.project_id = body.project_id.clone();
    cc.organization_id = body.organization_id.clone();
    cc.auth_token = body.auth_token.clone();
    cc.auth_type = body.auth_type.clone();
    cc.provider = body.provider.clone();
    cc.caller_number = body.caller_number.clone();
    cc.callee_number = body.callee_number.clone();
    cc.from_number = body.from_number.clone();
    cc.assistant_provider_id = body.assistant_provider_id.clone();

    match state.context_store.save(cc).await {
        Ok(context_id) => HttpResponse::Ok().json(SaveCallContextResponse { context_id }),
        Err(e) => {
            error!(state.logger, "call context save failed"; "error" => %e);
            err(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CallContextResponse {
    pub context_id: String,
    pub status: String,
    pub assistant_id: String,
    pub conversation_id: String,
    pub channel_uuid: String,
    pub provider: String,
    pub direction: String,
}

impl From<CallContext> for CallContextResponse {
    fn from(cc: CallContext) -> Self {
        Self {
            context_id: cc.context_id,
            status: cc.status.to_string(),
            assistant_id: cc.assistant_id,
            conversation_id: cc.conversation_id,
            channel_uuid: cc.channel_uuid,
            provider: cc.provider,
            direction: cc.direction.to_string(),
        }
    }
}

pub async fn get(state: Data<Arc<AppState>>, path: Path<String>) -> HttpResponse {
    match state.context_store.get(&path.into_inner()).await {
        Ok(cc) => HttpResponse::Ok().json(CallContextResponse::from(cc)),
        Err(e) => err(e.to_string()),
    }
}

pub async fn claim(state: Data<Arc<AppState>>, path: Path<String>) -> HttpResponse {
    match state.context_store.claim(&path.into_inner()).await {
        Ok(cc) => HttpResponse::Ok().json(CallContextResponse::from(cc)),
        Err(e) => err(e.to_string()),
    }
}

pub async fn complete(state: Data<Arc<AppState>>, path: Path<String>) -> HttpResponse {
    match state.context_store.complete(&path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => err(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    pub field: String,
    pub value: String,
}

pub async fn update_field(
    state: Data<Arc<AppState>>,
    path: Path<String>,
    body: Json<UpdateFieldRequest>,
) -> HttpResponse {
    match state
        .context_store
        .update_field(&path.into_inner(), &body.field, &body.value)
        .await
    {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => err(e.to_string()),
    }
}

pub async fn delete(state: Data<Arc<AppState>>, path: Path<String>) -> HttpResponse {
    match state.context_store.delete(&path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(e) => err(e.to_string()),
    }
}
