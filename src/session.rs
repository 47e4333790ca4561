//! Command Loop - reads lines, dispatches commands, writes one JSON line each
//!
//! States: `Starting` -> `AwaitingCommand` -> `Terminated`.
//!
//! The loop leaves `AwaitingCommand` only on end of input, an `exit` line,
//! or the shutdown future resolving. A failing command becomes an error
//! record and the loop keeps going.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::command::Command;
use crate::response::Response;
use crate::storage::UserStore;
use crate::{Error, Result};

/// Emitted once, before the first command is read
pub const READY_LINE: &str = "MCP CRUD Server Ready";

/// Emitted on an explicit `exit`
pub const FAREWELL_LINE: &str = "Exiting MCP CRUD Agent...";

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    EndOfInput,
    Exit,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    AwaitingCommand,
    Terminated(Termination),
}

/// One sequential command stream bound to a store and an output sink
pub struct Session<'a, S: ?Sized, W> {
    store: &'a S,
    output: W,
    state: LoopState,
    command_timeout: Option<Duration>,
    processed: u64,
}

impl<'a, S, W> Session<'a, S, W>
where
    S: UserStore + ?Sized,
    W: AsyncWrite + Unpin,
{
    pub fn new(store: &'a S, output: W) -> Self {
        Self {
            store,
            output,
            state: LoopState::Starting,
            command_timeout: None,
            processed: 0,
        }
    }

    /// Bound every dispatch to `timeout`
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of command lines answered so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Drive the loop until input ends, `exit` is read or `shutdown` fires.
    ///
    /// Only output failures and input read failures are returned as errors;
    /// everything that goes wrong inside a command is answered in-band.
    pub async fn run<R, F>(&mut self, mut input: R, shutdown: F) -> Result<Termination>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        if let LoopState::Terminated(reason) = self.state {
            return Ok(reason);
        }

        self.write_line(READY_LINE).await?;
        self.state = LoopState::AwaitingCommand;
        tracing::info!("Ready for commands");

        tokio::pin!(shutdown);
        let mut buf = Vec::new();

        let reason = loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = &mut shutdown => break Termination::Interrupted,
                read = input.read_until(b'\n', &mut buf) => read?,
            };
            if read == 0 {
                break Termination::EndOfInput;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) if is_exit(line) => {
                    self.write_line(FAREWELL_LINE).await?;
                    break Termination::Exit;
                }
                Ok(line) => self.handle_line(line).await,
                Err(e) => Response::error(format!("Invalid UTF-8 input: {}", e)),
            };
            self.respond(&response).await?;
        };

        self.state = LoopState::Terminated(reason);
        tracing::info!(?reason, processed = self.processed, "Command loop terminated");
        Ok(reason)
    }

    /// Parse and dispatch one line, folding any failure into an error record
    pub async fn handle_line(&self, line: &str) -> Response {
        match self.execute(line).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Command failed");
                Response::from(err)
            }
        }
    }

    async fn execute(&self, line: &str) -> Result<Response> {
        let command = Command::parse(line.trim())?;
        tracing::debug!(command = command.kind(), "Dispatching");

        match self.command_timeout {
            Some(limit) => tokio::time::timeout(limit, command.dispatch(self.store))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => command.dispatch(self.store).await,
        }
    }

    async fn respond(&mut self, response: &Response) -> Result<()> {
        let line = response.to_line()?;
        self.write_line(&line).await?;
        self.processed += 1;
        Ok(())
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.output.write_all(line.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await?;
        Ok(())
    }
}

/// Exactly the word `exit`, in any case, surrounded by optional whitespace
fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::user::{NewUser, User, UserChanges};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    async fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.provision().await.unwrap();
        store
    }

    async fn run_lines<S: UserStore + ?Sized>(store: &S, input: &str) -> (Termination, Vec<String>) {
        let mut session = Session::new(store, Vec::new());
        let reason = session
            .run(input.as_bytes(), std::future::pending())
            .await
            .unwrap();
        assert_eq!(session.state(), LoopState::Terminated(reason));
        let out = String::from_utf8(session.into_output()).unwrap();
        (reason, out.lines().map(str::to_string).collect())
    }

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let store = store().await;
        let (_, lines) = run_lines(
            &store,
            "CREATE USER name=Alice email=alice@example.com\nREAD USERS\n",
        )
        .await;

        assert_eq!(lines[0], READY_LINE);
        let created = parse(&lines[1]);
        assert_eq!(created["status"], "ok");
        let id = created["inserted_id"].as_i64().unwrap();

        let users = parse(&lines[2]);
        assert_eq!(
            users,
            json!([{ "id": id, "name": "Alice", "email": "alice@example.com" }])
        );
    }

    #[tokio::test]
    async fn test_update_changes_only_supplied_fields() {
        let store = store().await;
        let id = store
            .insert(&NewUser::new(Some("A".to_string()), Some("a@x.com".to_string())))
            .await
            .unwrap();

        let input = format!("UPDATE USER id={id} name=B\nREAD USERS\n");
        let (_, lines) = run_lines(&store, &input).await;

        assert_eq!(parse(&lines[1]), json!({ "status": "ok", "updated": 1 }));
        assert_eq!(parse(&lines[2]), json!([{ "id": id, "name": "B", "email": "a@x.com" }]));
    }

    #[tokio::test]
    async fn test_update_without_fields_is_rejected() {
        let store = store().await;
        let id = store
            .insert(&NewUser::new(Some("A".to_string()), Some("a@x.com".to_string())))
            .await
            .unwrap();

        let (_, lines) = run_lines(&store, &format!("UPDATE USER id={id}\n")).await;
        assert_eq!(
            parse(&lines[1]),
            json!({ "status": "error", "message": "No fields to update." })
        );

        let users = store.list().await.unwrap();
        assert_eq!(users[0].name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_delete_missing_reports_zero() {
        let store = store().await;
        let (_, lines) = run_lines(&store, "DELETE USER id=99999\n").await;
        assert_eq!(parse(&lines[1]), json!({ "status": "ok", "deleted": 0 }));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let store = store().await;
        let (_, lines) = run_lines(&store, "FROBNICATE THING\n").await;
        assert_eq!(
            parse(&lines[1]),
            json!({ "status": "error", "message": "Unknown command." })
        );
    }

    #[tokio::test]
    async fn test_malformed_id_modifies_nothing() {
        let store = store().await;
        let id = store
            .insert(&NewUser::new(Some("A".to_string()), None))
            .await
            .unwrap();

        let (_, lines) = run_lines(&store, "UPDATE USER id=abc name=X\n").await;
        let resp = parse(&lines[1]);
        assert_eq!(resp["status"], "error");
        assert!(resp["message"].as_str().unwrap().contains("abc"));

        let users = store.list().await.unwrap();
        assert_eq!(users, vec![User { id, name: Some("A".to_string()), email: None }]);
    }

    #[tokio::test]
    async fn test_quoted_value_keeps_inner_space() {
        let store = store().await;
        let (_, lines) = run_lines(&store, "CREATE USER name=\"Jane Doe\" email=jane@x.com\n").await;
        assert_eq!(parse(&lines[1])["status"], "ok");

        let users = store.list().await.unwrap();
        assert_eq!(users[0].name.as_deref(), Some("Jane Doe"));
    }

    #[tokio::test]
    async fn test_exit_emits_single_farewell() {
        let store = store().await;
        let (reason, lines) = run_lines(&store, "READ USERS\n  EXIT \nCREATE USER name=late\n").await;

        assert_eq!(reason, Termination::Exit);
        assert_eq!(lines, vec![READY_LINE.to_string(), "[]".to_string(), FAREWELL_LINE.to_string()]);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_end_of_input_has_no_farewell() {
        let store = store().await;
        let (reason, lines) = run_lines(&store, "READ USERS").await;

        assert_eq!(reason, Termination::EndOfInput);
        assert_eq!(lines, vec![READY_LINE.to_string(), "[]".to_string()]);
    }

    #[tokio::test]
    async fn test_exit_is_whole_word_only() {
        let store = store().await;
        let (reason, lines) = run_lines(&store, "e\nx\nexits\n").await;

        assert_eq!(reason, Termination::EndOfInput);
        assert_eq!(lines.len(), 4);
        for line in &lines[1..] {
            assert_eq!(parse(line)["status"], "error");
        }
    }

    #[tokio::test]
    async fn test_each_line_dispatched_once() {
        let store = store().await;
        let (_, lines) = run_lines(&store, "CREATE USER name=Once\n").await;

        assert_eq!(lines.len(), 2);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let store = store().await;
        let input = "CREATE USER name=\"broken\nCREATE USER Alice\n\nUPDATE USER name=x\nCREATE USER name=ok\n";
        let (reason, lines) = run_lines(&store, input).await;

        assert_eq!(reason, Termination::EndOfInput);
        // One output line per input line, plus the ready line
        assert_eq!(lines.len(), 6);
        assert_eq!(parse(&lines[1])["message"], "No closing quotation");
        assert_eq!(parse(&lines[2])["status"], "error");
        assert_eq!(parse(&lines[3])["message"], "Empty command.");
        assert_eq!(parse(&lines[4])["message"], "Missing required argument 'id'");
        assert_eq!(parse(&lines[5])["status"], "ok");
    }

    #[tokio::test]
    async fn test_store_errors_are_reported_in_band() {
        // No provisioning, so the table is missing
        let store = SqliteStore::open_in_memory().unwrap();
        let (_, lines) = run_lines(&store, "READ USERS\nREAD USERS\n").await;

        assert_eq!(lines.len(), 3);
        for line in &lines[1..] {
            let resp = parse(line);
            assert_eq!(resp["status"], "error");
            assert!(resp["message"].as_str().unwrap().contains("no such table"));
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_an_error() {
        let store = store().await;
        let mut input = b"READ USERS\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(b"READ USERS\n");

        let mut session = Session::new(&store, Vec::new());
        session.run(&input[..], std::future::pending()).await.unwrap();
        assert_eq!(session.processed(), 3);

        let out = String::from_utf8(session.into_output()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert!(parse(lines[2])["message"].as_str().unwrap().starts_with("Invalid UTF-8"));
        assert_eq!(lines[3], "[]");
    }

    #[tokio::test]
    async fn test_interrupt_terminates_without_farewell() {
        let store = store().await;
        let mut session = Session::new(&store, Vec::new());
        let reason = session
            .run(&b"CREATE USER name=x\n"[..], std::future::ready(()))
            .await
            .unwrap();

        assert_eq!(reason, Termination::Interrupted);
        let out = String::from_utf8(session.into_output()).unwrap();
        assert_eq!(out, format!("{}\n", READY_LINE));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminated_is_absorbing() {
        let store = store().await;
        let mut session = Session::new(&store, Vec::new());
        assert_eq!(session.state(), LoopState::Starting);

        let first = session.run(&b"exit\n"[..], std::future::pending()).await.unwrap();
        let second = session.run(&b"READ USERS\n"[..], std::future::pending()).await.unwrap();
        assert_eq!(first, Termination::Exit);
        assert_eq!(second, Termination::Exit);

        let out = String::from_utf8(session.into_output()).unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    struct SlowStore;

    #[async_trait]
    impl UserStore for SlowStore {
        async fn provision(&self) -> crate::Result<()> {
            Ok(())
        }

        async fn insert(&self, _user: &NewUser) -> crate::Result<i64> {
            Ok(1)
        }

        async fn list(&self) -> crate::Result<Vec<User>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn update(&self, _id: i64, _changes: &UserChanges) -> crate::Result<u64> {
            Ok(0)
        }

        async fn delete(&self, _id: i64) -> crate::Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let store = SlowStore;
        let mut session = Session::new(&store, Vec::new())
            .with_command_timeout(Some(Duration::from_millis(20)));
        session
            .run(&b"READ USERS\nCREATE USER\n"[..], std::future::pending())
            .await
            .unwrap();

        let out = String::from_utf8(session.into_output()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            parse(lines[1]),
            json!({ "status": "error", "message": "Command timed out after 20ms" })
        );
        assert_eq!(parse(lines[2]), json!({ "status": "ok", "inserted_id": 1 }));
    }
}
