use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::{
        command_error::{require, CommandError},
        stream_utils::to_native_consumer,
    },
    native::{NativeConsumer, NativeStreamCommands, NativeStreamOffset},
    stream::{Consumer, ReadOffset},
};

/// Consumer group lifecycle action. Each variant carries exactly what it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupAction {
    Create { read_offset: ReadOffset },
    DeleteConsumer { consumer_name: String },
    Destroy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupCommand {
    pub key: Option<Bytes>,
    pub group_name: Option<String>,
    pub action: GroupAction,
}

impl GroupCommand {
    pub fn create_group(read_offset: ReadOffset) -> Self {
        Self::with_action(GroupAction::Create { read_offset })
    }

    pub fn delete_consumer(consumer: Consumer) -> Self {
        Self {
            key: None,
            group_name: Some(consumer.group),
            action: GroupAction::DeleteConsumer {
                consumer_name: consumer.name,
            },
        }
    }

    pub fn destroy_group() -> Self {
        Self::with_action(GroupAction::Destroy)
    }

    fn with_action(action: GroupAction) -> Self {
        Self {
            key: None,
            group_name: None,
            action,
        }
    }

    pub fn at(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }
}

pub enum XgroupArguments {
    Create {
        offset: NativeStreamOffset,
        group: Bytes,
    },
    DeleteConsumer {
        key: Bytes,
        consumer: NativeConsumer,
    },
    Destroy {
        key: Bytes,
        group: Bytes,
    },
}

impl XgroupArguments {
    pub fn parse(command: &GroupCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();
        let group_name = require(&command.group_name, "GroupName must not be null")?;

        let arguments = match &command.action {
            GroupAction::Create { read_offset } => XgroupArguments::Create {
                offset: NativeStreamOffset::new(key, read_offset.offset()),
                group: Bytes::copy_from_slice(group_name.as_bytes()),
            },
            GroupAction::DeleteConsumer { consumer_name } => XgroupArguments::DeleteConsumer {
                key,
                consumer: to_native_consumer(&Consumer::new(
                    group_name.as_str(),
                    consumer_name.as_str(),
                )),
            },
            GroupAction::Destroy => XgroupArguments::Destroy {
                key,
                group: Bytes::copy_from_slice(group_name.as_bytes()),
            },
        };

        Ok(arguments)
    }
}

/// Maps a boolean engine reply to the status strings callers expect.
pub fn status_from_bool(success: bool) -> String {
    if success {
        "OK".to_string()
    } else {
        "Error".to_string()
    }
}

/// Runs the group action. Group creation passes the engine's status through;
/// the boolean replies of the other actions become "OK" or "Error".
pub async fn xgroup(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XgroupArguments,
) -> Result<String, CommandError> {
    match arguments {
        XgroupArguments::Create { offset, group } => channel.xgroup_create(offset, group).await,
        XgroupArguments::DeleteConsumer { key, consumer } => channel
            .xgroup_delconsumer(key, consumer)
            .await
            .map(status_from_bool),
        XgroupArguments::Destroy { key, group } => channel
            .xgroup_destroy(key, group)
            .await
            .map(status_from_bool),
    }
}
