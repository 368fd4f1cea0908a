use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::command_error::{require, CommandError},
    native::NativeStreamCommands,
};

/// Trims a stream down to `count` entries, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrimCommand {
    pub key: Option<Bytes>,
    pub count: Option<u64>,
    /// Lets the engine keep a few more entries if that is cheaper for it.
    pub approximate: bool,
}

impl TrimCommand {
    pub fn stream(key: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn to(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn approximate(mut self, approximate: bool) -> Self {
        self.approximate = approximate;
        self
    }
}

pub struct XtrimArguments {
    key: Bytes,
    approximate: bool,
    count: u64,
}

impl XtrimArguments {
    pub fn parse(command: &TrimCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();
        let count = *require(&command.count, "Count must not be null")?;

        Ok(Self {
            key,
            approximate: command.approximate,
            count,
        })
    }
}

/// Returns the number of entries removed.
pub async fn xtrim(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XtrimArguments,
) -> Result<u64, CommandError> {
    channel
        .xtrim(arguments.key, arguments.approximate, arguments.count)
        .await
}
