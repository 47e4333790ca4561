//! Command Parser - one line of text into one typed command
//!
//! Grammar (keywords are case-insensitive):
//!
//! ```text
//! CREATE USER name=<value> email=<value>
//! READ USERS
//! UPDATE USER id=<integer> [name=<value>] [email=<value>]
//! DELETE USER id=<integer>
//! ```
//!
//! Parsing never touches the store. Dispatch is the only step with side
//! effects, and it runs once per parsed command.

pub mod lexer;

use std::collections::HashMap;
use std::str::FromStr;

use crate::response::Response;
use crate::storage::UserStore;
use crate::user::{NewUser, UserChanges};
use crate::{Error, Result, NO_FIELDS_TO_UPDATE};

/// A validated instruction, each variant carrying only its legal fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateUser(NewUser),
    ListUsers,
    UpdateUser { id: i64, changes: UserChanges },
    DeleteUser { id: i64 },
}

impl Command {
    /// Parse one input line into a command
    pub fn parse(line: &str) -> Result<Self> {
        let words = lexer::split(line)?;
        if words.is_empty() {
            return Err(Error::Parse("Empty command.".to_string()));
        }
        if words.len() < 2 {
            return Err(Error::UnknownCommand);
        }

        let action = words[0].to_uppercase();
        let target = words[1].to_uppercase();
        let rest = &words[2..];

        match (action.as_str(), target.as_str()) {
            ("CREATE", "USER") => {
                let mut args = Arguments::parse(rest)?;
                Ok(Command::CreateUser(NewUser::new(args.take("name"), args.take("email"))))
            }
            ("READ", "USERS") => Ok(Command::ListUsers),
            ("UPDATE", "USER") => {
                let mut args = Arguments::parse(rest)?;
                let id = args.id()?;
                let changes = UserChanges::new(args.take("name"), args.take("email"));
                if changes.is_empty() {
                    return Err(Error::Validation(NO_FIELDS_TO_UPDATE.to_string()));
                }
                Ok(Command::UpdateUser { id, changes })
            }
            ("DELETE", "USER") => {
                let args = Arguments::parse(rest)?;
                Ok(Command::DeleteUser { id: args.id()? })
            }
            _ => Err(Error::UnknownCommand),
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateUser(_) => "create_user",
            Command::ListUsers => "list_users",
            Command::UpdateUser { .. } => "update_user",
            Command::DeleteUser { .. } => "delete_user",
        }
    }

    /// Run the command against the store and shape the response record
    pub async fn dispatch<S>(self, store: &S) -> Result<Response>
    where
        S: UserStore + ?Sized,
    {
        match self {
            Command::CreateUser(user) => {
                let id = store.insert(&user).await?;
                Ok(Response::created(id))
            }
            Command::ListUsers => Ok(Response::Users(store.list().await?)),
            Command::UpdateUser { id, changes } => {
                let rows = store.update(id, &changes).await?;
                Ok(Response::updated(rows))
            }
            Command::DeleteUser { id } => {
                let rows = store.delete(id).await?;
                Ok(Response::deleted(rows))
            }
        }
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// `key=value` words following the two keywords. A repeated key keeps
/// its last value; unrecognised keys are carried but never read.
struct Arguments {
    values: HashMap<String, String>,
}

impl Arguments {
    fn parse(words: &[String]) -> Result<Self> {
        let mut values = HashMap::with_capacity(words.len());
        for word in words {
            let (key, value) = word.split_once('=').ok_or_else(|| {
                Error::Parse(format!("Malformed argument '{}': expected key=value", word))
            })?;
            values.insert(key.to_string(), value.to_string());
        }
        Ok(Self { values })
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    fn id(&self) -> Result<i64> {
        let raw = self
            .values
            .get("id")
            .ok_or_else(|| Error::Validation("Missing required argument 'id'".to_string()))?;
        raw.trim()
            .parse()
            .map_err(|_| Error::Validation(format!("Invalid id '{}': expected an integer", raw)))
    }
}
