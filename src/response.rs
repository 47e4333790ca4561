//! Response records written back to the caller, one JSON line each

use serde::Serialize;

use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Outcome of one command. `Users` serializes as a bare JSON array; every
/// other shape is an object led by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Created { status: Status, inserted_id: i64 },
    Users(Vec<User>),
    Updated { status: Status, updated: u64 },
    Deleted { status: Status, deleted: u64 },
    Error { status: Status, message: String },
}

impl Response {
    pub fn created(inserted_id: i64) -> Self {
        Response::Created { status: Status::Ok, inserted_id }
    }

    pub fn updated(rows: u64) -> Self {
        Response::Updated { status: Status::Ok, updated: rows }
    }

    pub fn deleted(rows: u64) -> Self {
        Response::Deleted { status: Status::Ok, deleted: rows }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { status: Status::Error, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encode as a single line of JSON (no trailing newline)
    pub fn to_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<crate::Error> for Response {
    fn from(err: crate::Error) -> Self {
        Response::error(err.to_string())
    }
}
