//! Command tuples and the dataplane store boundary.
//!
//! A reconciliation pass produces an ordered list of [`Command`]s. Each one
//! is handed to a [`CommandSink`] exactly once and in order; the dataplane
//! applies them in arrival order so the sequence must never be reshuffled.

use std::fmt;

use crate::error::{CfgMgrError, CfgMgrResult};

/// Target used for commands that are not bound to a single interface.
pub const TARGET_ALL: &str = "ALL";

/// Store operation carried with every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create or overwrite.
    Set,
    /// Remove.
    Delete,
}

impl Operation {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "SET",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(path, command, target, operation)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Configuration path the command was derived from.
    pub path: String,
    /// Single-line command text in the dataplane grammar.
    pub command: String,
    /// Interface name, or [`TARGET_ALL`].
    pub target: String,
    /// Store operation.
    pub op: Operation,
}

impl Command {
    /// Creates a `SET` command.
    pub fn set(
        path: impl Into<String>,
        command: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            command: command.into(),
            target: target.into(),
            op: Operation::Set,
        }
    }

    /// Creates a `DELETE` command.
    pub fn delete(
        path: impl Into<String>,
        command: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            command: command.into(),
            target: target.into(),
            op: Operation::Delete,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op, self.target, self.command)
    }
}

/// Receiver of reconciliation commands.
pub trait CommandSink {
    /// Stores one command. Errors abort the pass.
    fn store(&mut self, path: &str, command: &str, target: &str, op: Operation)
        -> CfgMgrResult<()>;
}

/// Source of scoped dataplane sinks.
///
/// Implementations open a session per dataplane, run `pass` against it and
/// close the session again, so one call brackets one reconciliation pass.
pub trait Dataplanes {
    /// Runs `pass` once for every connected dataplane.
    fn for_each_dataplane(
        &mut self,
        pass: &mut dyn FnMut(&mut dyn CommandSink) -> CfgMgrResult<()>,
    ) -> CfgMgrResult<()>;
}

/// Sink that keeps every command in memory.
///
/// Used by tests and by the `diff` subcommand of the daemon.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    commands: Vec<Command>,
    passes: usize,
    fail_after: Option<usize>,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that refuses every command after the first `n`.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    /// All recorded commands in arrival order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Command texts in arrival order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.command.as_str()).collect()
    }

    /// Number of dataplane passes that were opened on this sink.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Returns true if nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandSink for RecordingSink {
    fn store(
        &mut self,
        path: &str,
        command: &str,
        target: &str,
        op: Operation,
    ) -> CfgMgrResult<()> {
        if let Some(limit) = self.fail_after {
            if self.commands.len() >= limit {
                return Err(CfgMgrError::transport(command, "sink closed"));
            }
        }
        self.commands.push(Command {
            path: path.to_string(),
            command: command.to_string(),
            target: target.to_string(),
            op,
        });
        Ok(())
    }
}

impl Dataplanes for RecordingSink {
    fn for_each_dataplane(
        &mut self,
        pass: &mut dyn FnMut(&mut dyn CommandSink) -> CfgMgrResult<()>,
    ) -> CfgMgrResult<()> {
        self.passes += 1;
        pass(self)
    }
}
