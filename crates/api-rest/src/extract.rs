//! Request extractors whose rejections use the `{"message"}` error body.

use axum::extract::FromRequest;

use crate::error::ApiError;

/// A JSON request body. Missing content type, malformed JSON and wrong field types all come
/// back as 400 with a message.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
