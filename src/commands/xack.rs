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

/// Acknowledges entries as processed by a consumer group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcknowledgeCommand {
    pub key: Option<Bytes>,
    pub group: Option<String>,
    pub record_ids: Vec<RecordId>,
}

impl AcknowledgeCommand {
    pub fn stream(key: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn records(mut self, record_ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.record_ids.extend(record_ids);
        self
    }
}

pub struct XackArguments {
    key: Bytes,
    group: Bytes,
    ids: Vec<String>,
}

impl XackArguments {
    pub fn parse(command: &AcknowledgeCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();
        let group = require(&command.group, "Group must not be null")?;

        if command.record_ids.is_empty() {
            return Err(CommandError::ContractViolation("RecordIds must not be empty"));
        }

        Ok(Self {
            key,
            group: Bytes::copy_from_slice(group.as_bytes()),
            ids: record_ids_to_strings(&command.record_ids),
        })
    }
}

/// Returns the number of entries removed from the group's pending list.
pub async fn xack(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XackArguments,
) -> Result<u64, CommandError> {
    channel
        .xack(arguments.key, arguments.group, arguments.ids)
        .await
}
