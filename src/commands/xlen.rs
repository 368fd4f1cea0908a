use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::command_error::{require, CommandError},
    native::NativeStreamCommands,
};

/// A command that only needs the stream key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyCommand {
    pub key: Option<Bytes>,
}

impl KeyCommand {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }
}

pub struct XlenArguments {
    key: Bytes,
}

impl XlenArguments {
    pub fn parse(command: &KeyCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();

        Ok(Self { key })
    }
}

pub async fn xlen(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XlenArguments,
) -> Result<u64, CommandError> {
    channel.xlen(arguments.key).await
}
