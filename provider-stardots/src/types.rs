//! StarDots API response types
//!
//! Every endpoint wraps its payload in the same envelope:
//! `{"success": bool, "message": str, "data": ..., "ts": ms}`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StarDotsError};

/// Common response envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,

    #[serde(default)]
    pub message: Option<String>,

    pub data: Option<T>,

    /// Server time in milliseconds
    #[serde(default)]
    pub ts: Option<i64>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning `success: false` or a missing payload into errors.
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            return Err(StarDotsError::Rejected(
                self.message.unwrap_or_else(|| "no message".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| StarDotsError::ParseError("response has no data".to_string()))
    }

    /// Check `success` for endpoints whose payload is not needed.
    pub fn ensure_success(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(StarDotsError::Rejected(
                self.message.unwrap_or_else(|| "no message".to_string()),
            ))
        }
    }
}

/// `GET /openapi/file/list` payload
#[derive(Debug, Deserialize)]
pub struct FileListData {
    #[serde(default)]
    pub list: Vec<FileEntry>,
}

/// One stored object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Object name, with the category encoded into it
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,
}

/// `PUT /openapi/file/upload` payload
#[derive(Debug, Deserialize)]
pub struct UploadData {
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST /openapi/file/ticket` payload
#[derive(Debug, Deserialize)]
pub struct TicketData {
    pub ticket: String,
}

/// `POST /openapi/file/ticket` body
#[derive(Debug, Serialize)]
pub struct TicketRequest<'a> {
    pub space: &'a str,
    pub filename: &'a str,
}

/// `DELETE /openapi/file/delete` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest<'a> {
    pub space: &'a str,
    pub filename_list: Vec<&'a str>,
}
