//! Generic response envelope shared with the authority service

use serde::{Deserialize, Serialize};

/// `{ responseCode, responseMessage, responseData }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse<T> {
    #[serde(default)]
    pub response_code: u16,

    #[serde(default)]
    pub response_message: String,

    pub response_data: Option<T>,
}

impl<T> BaseResponse<T> {
    /// Build an envelope; missing message/status default to `"Success"` / 200
    pub fn new(data: Option<T>, message: Option<String>, status: Option<u16>) -> Self {
        Self {
            response_code: status.unwrap_or(200),
            response_message: message.unwrap_or_else(|| "Success".to_string()),
            response_data: data,
        }
    }

    pub fn ok(data: T) -> Self {
        Self::new(Some(data), None, None)
    }

    pub fn error(status: u16, message: impl Into<String>, data: Option<T>) -> Self {
        Self::new(data, Some(message.into()), Some(status))
    }

    pub fn into_data(self) -> Option<T> {
        self.response_data
    }
}
