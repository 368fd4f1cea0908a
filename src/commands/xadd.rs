use std::{str::FromStr, sync::Arc};

use bytes::Bytes;

use crate::{
    commands::command_error::{require, CommandError},
    native::{NativeStreamCommands, XAddArgs},
    stream::{Body, RecordId},
};

/// Appends one entry to a stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddRecord {
    pub key: Option<Bytes>,
    pub id: RecordId,
    pub body: Option<Body>,
}

impl AddRecord {
    pub fn of(body: Body) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn to(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }
}

pub struct XaddArguments {
    key: Bytes,
    args: XAddArgs,
    body: Body,
}

impl XaddArguments {
    pub fn parse(command: &AddRecord) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();
        let body = require(&command.body, "Body must not be null")?.clone();

        let mut args = XAddArgs::default();
        if !command.id.should_be_auto_generated() {
            args = args.id(command.id.value());
        }

        Ok(Self { key, args, body })
    }
}

/// Returns the identifier the engine assigned or confirmed.
pub async fn xadd(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XaddArguments,
) -> Result<RecordId, CommandError> {
    let value = channel
        .xadd(arguments.key, arguments.args, arguments.body)
        .await?;

    RecordId::from_str(&value)
        .map_err(|_| CommandError::Server(format!("ERR Unexpected XADD reply '{}'", value)))
}
