/// Success envelope
///
/// Every JSON response has the shape `{code, data, message, pagination?}`,
/// where `code` repeats the HTTP status. Errors use the same shape (see
/// [`crate::error`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use salescrm_shared::pagination::Pagination;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: u16,
    pub data: T,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    envelope: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn with_status(status: StatusCode, data: T, message: &str) -> Self {
        Self {
            status,
            envelope: Envelope {
                code: status.as_u16(),
                data,
                message: message.to_string(),
                pagination: None,
            },
        }
    }

    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data, "Success")
    }

    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data, "Created")
    }

    pub fn page(data: T, pagination: Pagination) -> Self {
        let mut response = Self::ok(data);
        response.envelope.pagination = Some(pagination);
        response
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.envelope.message = message.into();
        self
    }
}

impl ApiResponse<Option<()>> {
    /// `data: null` with a message, e.g. after a delete
    pub fn empty(message: impl Into<String>) -> Self {
        Self::ok(None).message(message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_page_envelope() {
        let response = ApiResponse::page(vec![1, 2], Pagination::new(2, 2, 5)).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(response).await,
            json!({
                "code": 200,
                "data": [1, 2],
                "message": "Success",
                "pagination": {"page": 2, "pageSize": 2, "total": 5, "totalPages": 3}
            })
        );
    }

    #[tokio::test]
    async fn test_created_and_empty() {
        let response = ApiResponse::created(json!({"id": 1})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let value = body(response).await;
        assert_eq!(value["code"], 201);
        assert!(value.get("pagination").is_none());

        let value = body(ApiResponse::empty("Account deleted").into_response()).await;
        assert!(value["data"].is_null());
        assert_eq!(value["message"], "Account deleted");
    }
}
