use std::any::Any;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_LENGTH, StatusCode},
    response::{IntoResponse, Response},
};
use tower_http::catch_panic::ResponseForPanic;

use crate::{error::ErrorDiagnostic, response::ApiResponse, state::AppState};

/// Turns a handler panic into the standard 500 envelope. The panic message
/// is only echoed back in debug mode.
#[derive(Debug, Clone, Copy)]
pub struct PanicResponse {
    pub debug: bool,
}

impl ResponseForPanic for PanicResponse {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let detail = panic_message(err.as_ref());
        tracing::error!(panic = %detail, "handler panicked");

        let response = ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "server unknown error")
            .into_response();
        if self.debug {
            with_error_field(response, detail)
        } else {
            response
        }
    }
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Copies [`ErrorDiagnostic`] into the body as `"error"` when running in debug mode.
pub async fn attach_diagnostic(State(state): State<AppState>, response: Response) -> Response {
    if !state.config.run_mode.is_debug() {
        return response;
    }
    inject_diagnostic(response).await
}

async fn inject_diagnostic(response: Response) -> Response {
    let Some(ErrorDiagnostic(detail)) = response.extensions().get::<ErrorDiagnostic>().cloned()
    else {
        return response;
    };
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "could not buffer error body");
            return Response::from_parts(parts, Body::empty());
        }
    };
    let body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.insert("error".into(), serde_json::Value::String(detail));
            parts.headers.remove(CONTENT_LENGTH);
            Body::from(serde_json::Value::Object(map).to_string())
        }
        _ => Body::from(bytes),
    };
    Response::from_parts(parts, body)
}

fn with_error_field(response: Response, detail: String) -> Response {
    let (parts, _) = response.into_parts();
    let body = serde_json::json!({
        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "message": "server unknown error",
        "error": detail,
    });
    let mut response = Response::from_parts(parts, Body::from(body.to_string()));
    response.headers_mut().remove(CONTENT_LENGTH);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn diagnostic_is_injected_into_body() {
        let response = ApiError::Internal(anyhow::anyhow!("pool timed out")).into_response();
        let response = inject_diagnostic(response).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "server unknown error");
        assert_eq!(json["error"], "pool timed out");
    }

    #[tokio::test]
    async fn responses_without_diagnostic_are_untouched() {
        let response = inject_diagnostic(ApiError::Forbidden.into_response()).await;
        let json = body_json(response).await;
        assert_eq!(json, serde_json::json!({"code": 403, "message": "need admin authority"}));
    }

    #[tokio::test]
    async fn panic_detail_only_in_debug() {
        let mut release = PanicResponse { debug: false };
        let json = body_json(release.response_for_panic(Box::new("boom"))).await;
        assert_eq!(json["code"], 500);
        assert!(json.get("error").is_none());

        let mut debug = PanicResponse { debug: true };
        let json = body_json(debug.response_for_panic(Box::new(String::from("boom")))).await;
        assert_eq!(json["message"], "server unknown error");
        assert_eq!(json["error"], "boom");
    }
}
