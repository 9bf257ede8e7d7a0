use chrono::{DateTime, Utc};

use crate::error::GatewayError;

// 记录聊天请求日志（路由、会话、结果与耗时）
pub fn log_chat_request(
    route: &str,
    session_id: &str,
    start_time: DateTime<Utc>,
    error: Option<&GatewayError>,
) {
    let response_time_ms = (Utc::now() - start_time).num_milliseconds();

    match error {
        None => tracing::info!(
            route,
            session_id,
            response_time_ms,
            "Chat request completed"
        ),
        Some(e) => tracing::warn!(
            route,
            session_id,
            response_time_ms,
            code = e.code(),
            "Chat request failed: {}",
            e
        ),
    }
}
