use std::sync::Arc;

use crate::{
    commands::{
        command_error::{require, CommandError},
        router::{route, ExecutionChannel},
        stream_utils::{to_native_consumer, to_native_stream_offsets, to_read_args, to_record_stream},
    },
    native::{NativeConsumer, NativeStreamCommands, NativeStreamOffset, XReadArgs},
    stream::{Consumer, ReadOptions, RecordStream, StreamOffset},
};

/// Reads from one or more streams, optionally as a member of a consumer group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadCommand {
    pub stream_offsets: Vec<StreamOffset>,
    pub read_options: Option<ReadOptions>,
    pub consumer: Option<Consumer>,
}

impl ReadCommand {
    pub fn new(stream_offsets: impl IntoIterator<Item = StreamOffset>) -> Self {
        Self {
            stream_offsets: stream_offsets.into_iter().collect(),
            read_options: Some(ReadOptions::empty()),
            consumer: None,
        }
    }

    pub fn read_options(mut self, read_options: ReadOptions) -> Self {
        self.read_options = Some(read_options);
        self
    }

    pub fn as_consumer(mut self, consumer: Consumer) -> Self {
        self.consumer = Some(consumer);
        self
    }
}

/// Validated read, already translated to native arguments.
pub struct XreadArguments {
    channel: ExecutionChannel,
    offsets: Vec<NativeStreamOffset>,
    args: XReadArgs,
    consumer: Option<NativeConsumer>,
}

impl XreadArguments {
    pub fn parse(command: &ReadCommand) -> Result<Self, CommandError> {
        if command.stream_offsets.is_empty() {
            return Err(CommandError::ContractViolation(
                "StreamOffsets must not be empty",
            ));
        }

        let read_options = require(&command.read_options, "ReadOptions must not be null")?;

        Ok(Self {
            channel: route(read_options),
            offsets: to_native_stream_offsets(&command.stream_offsets),
            args: to_read_args(read_options),
            consumer: command.consumer.as_ref().map(to_native_consumer),
        })
    }

    /// The channel this read has to run on.
    pub fn channel(&self) -> ExecutionChannel {
        self.channel
    }
}

/// Plain read without a consumer, group read otherwise. Group reads also mark
/// delivered entries as pending for the consumer.
pub fn do_read(channel: Arc<dyn NativeStreamCommands>, arguments: XreadArguments) -> RecordStream {
    let messages = match arguments.consumer {
        None => channel.xread(arguments.args, arguments.offsets),
        Some(consumer) => channel.xreadgroup(consumer, arguments.args, arguments.offsets),
    };

    to_record_stream(messages)
}
