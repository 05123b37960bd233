use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use orderbot_core::errors::{ApplicationError, DomainError, InterfaceError};
use orderbot_core::flows::ConversationId;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ServerState;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone, Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub replies: Vec<String>,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: &'static str,
    correlation_id: String,
}

pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            error: self.0.to_string(),
            message: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn post_message(
    State(state): State<ServerState>,
    Path(conversation_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if conversation_id.trim().is_empty() {
        warn!(
            event_name = "ingress.message_rejected",
            correlation_id = %correlation_id,
            "message without conversation id"
        );
        let error = ApplicationError::from(DomainError::MissingConversationId);
        return Err(ApiError(error.into_interface(correlation_id)));
    }

    let conversation_id = ConversationId::from(conversation_id.trim());
    info!(
        event_name = "ingress.message_received",
        conversation_id = %conversation_id,
        correlation_id = %correlation_id,
        "received inbound message over http"
    );

    let outcome =
        state.service.handle_message(&conversation_id, &request.text, &correlation_id).await;

    Ok(Json(MessageResponse {
        replies: outcome.replies,
        stage: outcome.to.as_str().to_owned(),
        order_id: outcome.receipt.map(|receipt| receipt.order_id.to_string()),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::messages::MessageResponse;
    use crate::router;
    use crate::test_support::state_with_pool;

    fn post(conversation: &str, text: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/v1/conversations/{conversation}/messages"))
            .header("content-type", "application/json")
            .header("x-correlation-id", "req-1")
            .body(Body::from(serde_json::json!({ "text": text }).to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn full_order_over_http() {
        let app = router(state_with_pool(None));
        let mut last = None;

        for input in
            ["hola", "pedido", "Ana", "Calle 1", "3001234567", "jabon", "Jabon Azul", "3", "fin"]
        {
            let response = app.clone().oneshot(post("573001234567", input)).await.expect("call");
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
            last = Some(serde_json::from_slice::<MessageResponse>(&bytes).expect("json"));
        }

        let last = last.expect("response");
        assert_eq!(last.stage, "start");
        assert_eq!(last.order_id.as_deref(), Some("PED-00001"));
        assert_eq!(last.replies.len(), 2);
        assert!(last.replies[0].contains("Total: $15"));
        assert!(last.replies[1].contains("PED-00001"));
    }

    #[tokio::test]
    async fn blank_conversation_id_is_a_bad_request() {
        let app = router(state_with_pool(None));

        let response = app.oneshot(post("%20", "hola")).await.expect("call");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["correlation_id"], "req-1");
        assert_eq!(body["error"], "bad request: message has no conversation id");
        assert_eq!(
            body["message"],
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[tokio::test]
    async fn health_route_is_mounted() {
        let app = router(state_with_pool(None));
        let request = Request::builder().uri("/health").body(Body::empty()).expect("request");

        let response = app.oneshot(request).await.expect("call");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
