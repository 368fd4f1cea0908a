use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// A required command field is absent.
    #[error("{0}")]
    ContractViolation(&'static str),
    #[error("{0}")]
    InvalidStreamId(String),
    /// The engine rejected the call.
    #[error("{0}")]
    Server(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("dedicated channel unavailable: {0}")]
    ResourceExhaustion(String),
}

impl CommandError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            CommandError::ContractViolation(_) | CommandError::InvalidStreamId(_)
        )
    }

    /// Failures raised while executing a native call, as opposed to input validation.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            CommandError::Server(_)
                | CommandError::Transport(_)
                | CommandError::ResourceExhaustion(_)
        )
    }
}

/// Returns the field or a contract violation carrying `message`.
pub fn require<'a, T>(value: &'a Option<T>, message: &'static str) -> Result<&'a T, CommandError> {
    value
        .as_ref()
        .ok_or(CommandError::ContractViolation(message))
}

/// A failed element of a response stream, correlated with the command that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure<C> {
    pub command: C,
    pub cause: CommandError,
}

impl<C> CommandFailure<C> {
    pub fn new(command: C, cause: CommandError) -> Self {
        Self { command, cause }
    }
}

impl<C> fmt::Display for CommandFailure<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command failed: {}", self.cause)
    }
}

impl<C: fmt::Debug> std::error::Error for CommandFailure<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
