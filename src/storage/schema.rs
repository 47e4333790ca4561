//! Database schema definitions

/// SQL to create the users table on PostgreSQL
pub const CREATE_USERS_TABLE_POSTGRES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    name VARCHAR,
    email VARCHAR
)
"#;

/// SQL to create the users table on SQLite
pub const CREATE_USERS_TABLE_SQLITE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,
    email TEXT
)
"#;

pub const SELECT_USERS: &str = "SELECT id, name, email FROM users ORDER BY id";

/// Build `UPDATE users SET a = <p1>, b = <p2> WHERE id = <pN>`.
///
/// `placeholder` renders the n-th (1-based) parameter marker for the
/// dialect. Parameters bind columns first, then the id.
pub fn update_statement(columns: &[&str], placeholder: impl Fn(usize) -> String) -> String {
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = {}", col, placeholder(i + 1)))
        .collect();
    format!(
        "UPDATE users SET {} WHERE id = {}",
        sets.join(", "),
        placeholder(columns.len() + 1)
    )
}
