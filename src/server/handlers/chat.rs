use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::model::encode_value;
use crate::server::payload::ChatPayload;
use crate::server::relay::{completion_from_reply, to_upstream_messages};
use crate::server::request_logging::log_chat_request;
use crate::server::session::Session;
use crate::server::AppState;

const ROUTE: &str = "/api/chat";

pub async fn process_message(
    State(app_state): State<Arc<AppState>>,
    ChatPayload(request): ChatPayload,
) -> Result<Response, GatewayError> {
    let start_time = Utc::now();
    let session = Session::prepare(
        app_state.sessions.as_ref(),
        &app_state.config.chat.system_prompt,
        request,
    )
    .await;

    let reply = match app_state
        .backend
        .complete(to_upstream_messages(&session.messages))
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            log_chat_request(ROUTE, &session.id, start_time, Some(&e));
            return Err(e);
        }
    };

    let completion = completion_from_reply(reply, session.state());
    let body = encode_value(&completion)?;

    let session_id = session.id.clone();
    session
        .finish(app_state.sessions.as_ref(), completion.message)
        .await;
    log_chat_request(ROUTE, &session_id, start_time, None);

    Ok(Json(body).into_response())
}
