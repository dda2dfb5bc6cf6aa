//! Unified error codes for barbot
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 6xxx: Inventory / recipe errors
//! - 7xxx: Device errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 4xxx: Order ====================
    OrderNotFound = 4001,
    /// The order's current status forbids the requested transition
    OrderInvalidState = 4002,
    OrderAlreadyDelivered = 4003,
    OrderAlreadyCancelled = 4004,

    // ==================== 6xxx: Inventory ====================
    InsufficientStock = 6001,
    IngredientNotStocked = 6002,
    InventoryRecordNotFound = 6003,
    CocktailNotFound = 6101,

    // ==================== 7xxx: Device ====================
    DeviceNotConnected = 7001,
    FulfillmentUnavailable = 7003,

    // ==================== 9xxx: System ====================
    DatabaseError = 9002,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidRequest => "Invalid request",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderInvalidState => "Order state does not allow this operation",
            ErrorCode::OrderAlreadyDelivered => "Order has already been delivered",
            ErrorCode::OrderAlreadyCancelled => "Order has already been cancelled",

            // Inventory
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::IngredientNotStocked => "Ingredient is not stocked for this event",
            ErrorCode::InventoryRecordNotFound => "Inventory record not found",
            ErrorCode::CocktailNotFound => "Cocktail not found",

            // Device
            ErrorCode::DeviceNotConnected => "Device is not connected",
            ErrorCode::FulfillmentUnavailable => "Fulfillment service is not running",

            // System
            ErrorCode::DatabaseError => "Database error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            5 => Ok(ErrorCode::InvalidRequest),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderInvalidState),
            4003 => Ok(ErrorCode::OrderAlreadyDelivered),
            4004 => Ok(ErrorCode::OrderAlreadyCancelled),

            // Inventory
            6001 => Ok(ErrorCode::InsufficientStock),
            6002 => Ok(ErrorCode::IngredientNotStocked),
            6003 => Ok(ErrorCode::InventoryRecordNotFound),
            6101 => Ok(ErrorCode::CocktailNotFound),

            // Device
            7001 => Ok(ErrorCode::DeviceNotConnected),
            7003 => Ok(ErrorCode::FulfillmentUnavailable),

            // System
            9002 => Ok(ErrorCode::DatabaseError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}
