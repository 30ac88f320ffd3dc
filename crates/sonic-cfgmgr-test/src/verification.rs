//! Verification helpers for testing configuration managers
//!
//! Provides assertion helpers over the command stream a reconciliation pass
//! delivered to a sink.

use sonic_cfgmgr_common::{Command, Operation, TARGET_ALL};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected command '{expected}' not found in {actual:?}")]
    CommandNotFound { expected: String, actual: Vec<String> },

    #[error("Unexpected command '{command}'")]
    UnexpectedCommand { command: String },

    #[error("Expected {expected} commands matching '{pattern}', found {actual}")]
    CountMismatch {
        pattern: String,
        expected: usize,
        actual: usize,
    },

    #[error("Command '{first}' must precede '{second}'")]
    OrderViolation { first: String, second: String },

    #[error("Command stream mismatch: expected {expected:?}, got {actual:?}")]
    SequenceMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Command stream verifier
pub struct CommandVerifier {
    captured_commands: Vec<Command>,
}

impl CommandVerifier {
    /// Create a new command verifier
    pub fn new(captured_commands: impl Into<Vec<Command>>) -> Self {
        Self {
            captured_commands: captured_commands.into(),
        }
    }

    fn texts(&self) -> Vec<String> {
        self.captured_commands
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    fn position(&self, pattern: &str) -> Option<usize> {
        self.captured_commands
            .iter()
            .position(|c| c.command.contains(pattern))
    }

    /// Verify that a command containing `expected` was sent
    pub fn assert_command_executed(&self, expected: &str) -> VerifyResult<()> {
        match self.position(expected) {
            Some(_) => Ok(()),
            None => Err(VerificationError::CommandNotFound {
                expected: expected.to_string(),
                actual: self.texts(),
            }),
        }
    }

    /// Verify that no command containing `unexpected` was sent
    pub fn assert_command_not_executed(&self, unexpected: &str) -> VerifyResult<()> {
        match self.position(unexpected) {
            Some(i) => Err(VerificationError::UnexpectedCommand {
                command: self.captured_commands[i].command.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Verify the number of commands sent
    pub fn assert_command_count(&self, expected: usize) -> VerifyResult<()> {
        self.assert_matching_count("", expected)
    }

    /// Verify how many commands contain `pattern`
    pub fn assert_matching_count(&self, pattern: &str, expected: usize) -> VerifyResult<()> {
        let actual = self
            .captured_commands
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count();
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                pattern: pattern.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that the last command matching `first` precedes the first
    /// command matching `second`
    pub fn assert_order(&self, first: &str, second: &str) -> VerifyResult<()> {
        let last_first = self
            .captured_commands
            .iter()
            .rposition(|c| c.command.contains(first));
        let first_second = self.position(second);
        match (last_first, first_second) {
            (Some(a), Some(b)) if a < b => Ok(()),
            (None, _) => self.assert_command_executed(first),
            (_, None) => self.assert_command_executed(second),
            _ => Err(VerificationError::OrderViolation {
                first: first.to_string(),
                second: second.to_string(),
            }),
        }
    }

    /// Verify the exact command texts
    pub fn assert_sequence(&self, expected: &[&str]) -> VerifyResult<()> {
        let actual = self.texts();
        if actual != expected {
            return Err(VerificationError::SequenceMismatch {
                expected: expected.iter().map(|s| s.to_string()).collect(),
                actual,
            });
        }
        Ok(())
    }

    /// Verify that the stream ends in exactly one `qos commit`
    pub fn assert_committed_once(&self) -> VerifyResult<()> {
        self.assert_matching_count("qos commit", 1)?;
        match self.captured_commands.last() {
            Some(c) if c.command == "qos commit" && c.target == TARGET_ALL && c.op == Operation::Set => {
                Ok(())
            }
            _ => Err(VerificationError::OrderViolation {
                first: "everything".to_string(),
                second: "qos commit".to_string(),
            }),
        }
    }

    /// Verify that every command targets one of `targets` or ALL
    pub fn assert_targets_within(&self, targets: &[&str]) -> VerifyResult<()> {
        match self
            .captured_commands
            .iter()
            .find(|c| c.target != TARGET_ALL && !targets.contains(&c.target.as_str()))
        {
            Some(c) => Err(VerificationError::UnexpectedCommand {
                command: c.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Get all captured commands
    pub fn captured_commands(&self) -> &[Command] {
        &self.captured_commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Vec<Command> {
        vec![
            Command::delete("qos/dp0s1", "qos dp0s1 disable", "dp0s1"),
            Command::set("qos/dp0s1/port", "qos dp0s1 port subports 1", "dp0s1"),
            Command::set("qos/dp0s1/enable", "qos dp0s1 enable", "dp0s1"),
            Command::set("qos/commit", "qos commit", TARGET_ALL),
        ]
    }

    #[test]
    fn test_command_verifier() {
        let verifier = CommandVerifier::new(stream());

        assert!(verifier.assert_command_executed("port subports").is_ok());
        assert!(verifier.assert_command_not_executed("nonexistent").is_ok());
        assert!(verifier.assert_command_count(4).is_ok());
        assert!(verifier.assert_matching_count("dp0s1", 3).is_ok());
        assert!(verifier.assert_committed_once().is_ok());
        assert!(verifier.assert_targets_within(&["dp0s1"]).is_ok());

        assert!(verifier.assert_command_count(3).is_err());
        assert!(verifier.assert_command_executed("nonexistent").is_err());
        assert!(verifier.assert_targets_within(&["dp0s2"]).is_err());
    }

    #[test]
    fn test_order() {
        let verifier = CommandVerifier::new(stream());
        assert!(verifier.assert_order("disable", "enable").is_ok());
        assert!(matches!(
            verifier.assert_order("enable", "disable"),
            Err(VerificationError::OrderViolation { .. })
        ));
        assert!(matches!(
            verifier.assert_order("missing", "enable"),
            Err(VerificationError::CommandNotFound { .. })
        ));
    }

    #[test]
    fn test_sequence() {
        let verifier = CommandVerifier::new(stream());
        assert!(verifier
            .assert_sequence(&[
                "qos dp0s1 disable",
                "qos dp0s1 port subports 1",
                "qos dp0s1 enable",
                "qos commit",
            ])
            .is_ok());
        assert!(verifier.assert_sequence(&["qos commit"]).is_err());
    }
}
