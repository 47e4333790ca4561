//! User records - the only entity in the store
//!
//! `id` is assigned by the backend on insertion and never supplied by a
//! caller. Both `name` and `email` are nullable.

use serde::{Deserialize, Serialize};

/// A stored row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key generated by the store
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Payload for inserting a user. Carries no `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl NewUser {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self { name, email }
    }
}

/// Partial replacement of a user's fields. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserChanges {
    /// Build a change set, treating empty strings as "not supplied".
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        Self {
            name: name.filter(|v| !v.is_empty()),
            email: email.filter(|v| !v.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Column/value pairs to write, in a stable order
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::with_capacity(2);
        if let Some(name) = &self.name {
            out.push(("name", name.as_str()));
        }
        if let Some(email) = &self.email {
            out.push(("email", email.as_str()));
        }
        out
    }
}
