//! JSON error responses with the service's status-code discipline.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use bn_domain::error::Error;

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a domain error onto the HTTP surface: 422 validation, 404 not
/// found, 409 conflict, 400 bad request, 502 upstream, 500 otherwise.
pub fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        Error::Provider { .. } => StatusCode::BAD_GATEWAY,
        Error::Store(_) | Error::Io(_) | Error::Json(_) | Error::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    api_error(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (Error::Validation("v".into()), 422),
            (Error::NotFound("n".into()), 404),
            (Error::Conflict("c".into()), 409),
            (Error::BadRequest("b".into()), 400),
            (
                Error::Provider {
                    provider: "openai".into(),
                    message: "m".into(),
                },
                502,
            ),
            (Error::Store("s".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(&err).status().as_u16(), expected);
        }
    }
}
