use serde_json::{json, Value};

use crate::ErrorCode;

/// Business-logic failure carrying a numeric code and optional payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
    code: i32,
    data: Option<Value>,
}

impl ServiceError {
    /// New error with the default code 400.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorCode::Service.code(),
            data: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// The matching [`ErrorCode`], if the numeric code is a known one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::try_from(self.code).ok()
    }

    /// Response body: `{"code", "message", "data"}`.
    pub fn to_body(&self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "data": self.data,
        })
    }
}

impl From<ErrorCode> for ServiceError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code.message()).with_code(code.code())
    }
}
