use std::convert::Infallible;

use serde_json::json;
use warp::{
    filters::body::BodyDeserializeError,
    http::StatusCode,
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader, PayloadTooLarge,
        UnsupportedMediaType,
    },
    Rejection, Reply,
};

use crate::error::ApiError;

/// Renders every rejection as a JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found" }))
    } else if let Some(e) = err.find::<ApiError>() {
        if let ApiError::Internal(info) = e {
            log::error!("Request failed: {info}");
        }
        (e.status(), e.body())
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": format!("Malformed request body: {e}") }),
        )
    } else if err.find::<InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": "Malformed query string" }),
        )
    } else if err.find::<MissingHeader>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": "Missing request header" }),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Request body is too large" }),
        )
    } else if err.find::<LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            json!({ "detail": "Content-Length is required" }),
        )
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "detail": "Unsupported media type" }),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed" }),
        )
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "detail": "Internal server error" }),
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}
