//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::OrderNotFound
            | Self::CocktailNotFound
            | Self::InventoryRecordNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::OrderInvalidState
            | Self::OrderAlreadyDelivered
            | Self::OrderAlreadyCancelled => StatusCode::CONFLICT,

            // 422 Unprocessable
            Self::InsufficientStock | Self::IngredientNotStocked => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 400 Bad Request
            Self::ValidationFailed | Self::InvalidRequest => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable
            Self::DeviceNotConnected | Self::FulfillmentUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
