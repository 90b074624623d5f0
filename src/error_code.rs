use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Application-level error codes. Serialized as their integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success,
    System,
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Service,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 7] = [
        ErrorCode::Success,
        ErrorCode::System,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::NotFound,
        ErrorCode::Validation,
        ErrorCode::Service,
    ];

    pub fn code(self) -> i32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::System => 500,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::Validation => 422,
            ErrorCode::Service => 400,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation succeeded",
            ErrorCode::System => "System error",
            ErrorCode::Unauthorized => "Unauthorized access",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::Validation => "Data validation failed",
            ErrorCode::Service => "Service processing failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown error code: {0}")]
pub struct UnknownErrorCode(pub i32);

impl TryFrom<i32> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(UnknownErrorCode(code))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        ErrorCode::try_from(code).map_err(serde::de::Error::custom)
    }
}
