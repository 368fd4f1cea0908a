use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::{
        command_error::{require, CommandError},
        stream_utils::record_ids_to_strings,
    },
    native::NativeStreamCommands,
    stream::RecordId,
};

/// Removes entries from a stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteCommand {
    pub key: Option<Bytes>,
    pub record_ids: Vec<RecordId>,
}

impl DeleteCommand {
    pub fn stream(key: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
            record_ids: Vec::new(),
        }
    }

    pub fn records(mut self, record_ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.record_ids.extend(record_ids);
        self
    }
}

pub struct XdelArguments {
    key: Bytes,
    ids: Vec<String>,
}

impl XdelArguments {
    pub fn parse(command: &DeleteCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();

        if command.record_ids.is_empty() {
            return Err(CommandError::ContractViolation("RecordIds must not be empty"));
        }

        Ok(Self {
            key,
            ids: record_ids_to_strings(&command.record_ids),
        })
    }
}

/// Returns the number of entries actually deleted.
pub async fn xdel(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XdelArguments,
) -> Result<u64, CommandError> {
    channel.xdel(arguments.key, arguments.ids).await
}
