use crate::{errors::ServiceError, ApiResponse};
use axum::{
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Header installed by the upstream identity layer. The storefront never
/// authenticates; it trusts this value the way it would trust a session.
pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";

pub fn success_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn created_response<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

pub fn no_content_response() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(Into::into)
}

/// Extracts the authenticated customer id forwarded by the identity layer.
pub fn customer_identity(headers: &HeaderMap) -> Result<i64, ServiceError> {
    headers
        .get(CUSTOMER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "missing or malformed {} header",
                CUSTOMER_ID_HEADER
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_customer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CUSTOMER_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(customer_identity(&headers).unwrap(), 42);
    }

    #[test]
    fn missing_header_is_a_validation_error() {
        let headers = HeaderMap::new();
        assert!(matches!(
            customer_identity(&headers),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn garbage_header_is_a_validation_error() {
        let mut headers = HeaderMap::new();
        headers.insert(CUSTOMER_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert!(customer_identity(&headers).is_err());
    }
}
