//! Stream-in, stream-out front end for the stream commands.
//!
//! Each operation takes a stream of commands and returns a stream with exactly
//! one element per command: a [`CommandResponse`] on success or a
//! [`CommandFailure`] carrying the command back. Commands that change a stream
//! run strictly one after the other and the next command is only pulled once
//! the previous response was taken.

use std::{fmt, future::Future, sync::Arc};

use async_stream::stream;
use futures::{pin_mut, stream::BoxStream, Stream, StreamExt};
use tracing::{debug, warn};

use crate::{
    commands::{
        xack::{self, XackArguments},
        xadd::{self, XaddArguments},
        xdel::{self, XdelArguments},
        xgroup::{self, XgroupArguments},
        xlen::{self, XlenArguments},
        xrange::{self, XrangeArguments},
        xread::{do_read, XreadArguments},
        xtrim::{self, XtrimArguments},
        AcknowledgeCommand, AddRecord, CommandError, CommandFailure, CommandResponse,
        DeleteCommand, ExecutionChannel, GroupCommand, KeyCommand, RangeCommand, ReadCommand,
        TrimCommand,
    },
    config::AdapterConfig,
    connection::{execute_dedicated, execute_shared, ConnectionProvider},
    native::NativeStreamCommands,
    stream::{RecordId, RecordStream},
};

/// Responses of one adapter operation, in input order.
pub type ResponseStream<C, R> = BoxStream<'static, Result<CommandResponse<C, R>, CommandFailure<C>>>;

#[derive(Clone)]
pub struct StreamCommandAdapter {
    provider: Arc<dyn ConnectionProvider>,
    config: AdapterConfig,
}

impl fmt::Debug for StreamCommandAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCommandAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StreamCommandAdapter {
    pub fn new(provider: Arc<dyn ConnectionProvider>, config: AdapterConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Appends records. Responds with the id the engine assigned.
    pub fn xadd<S>(&self, commands: S) -> ResponseStream<AddRecord, RecordId>
    where
        S: Stream<Item = AddRecord> + Send + 'static,
    {
        ordered(
            "xadd",
            Arc::clone(&self.provider),
            commands,
            XaddArguments::parse,
            xadd::xadd,
        )
    }

    /// Acknowledges pending records. Responds with the number acknowledged.
    pub fn xack<S>(&self, commands: S) -> ResponseStream<AcknowledgeCommand, u64>
    where
        S: Stream<Item = AcknowledgeCommand> + Send + 'static,
    {
        ordered(
            "xack",
            Arc::clone(&self.provider),
            commands,
            XackArguments::parse,
            xack::xack,
        )
    }

    /// Deletes records. Responds with the number deleted.
    pub fn xdel<S>(&self, commands: S) -> ResponseStream<DeleteCommand, u64>
    where
        S: Stream<Item = DeleteCommand> + Send + 'static,
    {
        ordered(
            "xdel",
            Arc::clone(&self.provider),
            commands,
            XdelArguments::parse,
            xdel::xdel,
        )
    }

    /// Manages consumer groups. Responds with "OK" or "Error", or the status
    /// the engine returned for group creation.
    pub fn xgroup<S>(&self, commands: S) -> ResponseStream<GroupCommand, String>
    where
        S: Stream<Item = GroupCommand> + Send + 'static,
    {
        ordered(
            "xgroup",
            Arc::clone(&self.provider),
            commands,
            XgroupArguments::parse,
            xgroup::xgroup,
        )
    }

    /// Trims streams. Responds with the number of records removed.
    pub fn xtrim<S>(&self, commands: S) -> ResponseStream<TrimCommand, u64>
    where
        S: Stream<Item = TrimCommand> + Send + 'static,
    {
        ordered(
            "xtrim",
            Arc::clone(&self.provider),
            commands,
            XtrimArguments::parse,
            xtrim::xtrim,
        )
    }

    /// Stream lengths. Up to `max_concurrent_lengths` lookups run at once,
    /// responses still come back in input order.
    pub fn xlen<S>(&self, commands: S) -> ResponseStream<KeyCommand, u64>
    where
        S: Stream<Item = KeyCommand> + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);

        commands
            .map(move |command| {
                let provider = Arc::clone(&provider);

                async move {
                    let arguments = match XlenArguments::parse(&command) {
                        Ok(arguments) => arguments,
                        Err(cause) => return Err(CommandFailure::new(command, cause)),
                    };

                    match xlen::xlen(provider.shared(), arguments).await {
                        Ok(length) => Ok(CommandResponse::new(command, length)),
                        Err(cause) => {
                            warn!(command = ?command, error = %cause, "xlen failed");
                            Err(CommandFailure::new(command, cause))
                        }
                    }
                }
            })
            .buffered(self.config.max_concurrent_lengths.max(1))
            .boxed()
    }

    /// Ascending range scans. Records are fetched once the response's output
    /// stream is polled.
    pub fn xrange<S>(&self, commands: S) -> ResponseStream<RangeCommand, RecordStream>
    where
        S: Stream<Item = RangeCommand> + Send + 'static,
    {
        scan(Arc::clone(&self.provider), commands, xrange::xrange)
    }

    /// Descending range scans.
    pub fn xrevrange<S>(&self, commands: S) -> ResponseStream<RangeCommand, RecordStream>
    where
        S: Stream<Item = RangeCommand> + Send + 'static,
    {
        scan(Arc::clone(&self.provider), commands, xrange::xrevrange)
    }

    /// Reads, one response per command. Blocking reads run on a dedicated
    /// channel that is held until the output stream ends or is dropped.
    pub fn read<S>(&self, commands: S) -> ResponseStream<ReadCommand, RecordStream>
    where
        S: Stream<Item = ReadCommand> + Send + 'static,
    {
        let provider = Arc::clone(&self.provider);

        commands
            .map(move |command| {
                let arguments = match XreadArguments::parse(&command) {
                    Ok(arguments) => arguments,
                    Err(cause) => {
                        debug!(command = ?command, error = %cause, "rejected read");
                        return Err(CommandFailure::new(command, cause));
                    }
                };

                let execution_channel = arguments.channel();
                debug!(channel = ?execution_channel, offsets = command.stream_offsets.len(), "routing read");

                let output = match execution_channel {
                    ExecutionChannel::Dedicated => execute_dedicated(
                        Arc::clone(&provider),
                        move |channel| do_read(channel, arguments),
                    ),
                    ExecutionChannel::Shared => execute_shared(
                        Arc::clone(&provider),
                        move |channel| do_read(channel, arguments),
                    ),
                };

                Ok(CommandResponse::new(command, output))
            })
            .boxed()
    }
}

/// Runs side-effecting commands in input order with one native call in
/// flight. Rejected commands are reported and skipped; an engine or
/// transport failure is reported and ends the stream.
fn ordered<C, A, R, P, E, F, S>(
    operation: &'static str,
    provider: Arc<dyn ConnectionProvider>,
    commands: S,
    parse: P,
    execute: E,
) -> ResponseStream<C, R>
where
    C: fmt::Debug + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
    S: Stream<Item = C> + Send + 'static,
    P: Fn(&C) -> Result<A, CommandError> + Send + 'static,
    E: Fn(Arc<dyn NativeStreamCommands>, A) -> F + Send + 'static,
    F: Future<Output = Result<R, CommandError>> + Send + 'static,
{
    stream! {
        pin_mut!(commands);

        while let Some(command) = commands.next().await {
            let arguments = match parse(&command) {
                Ok(arguments) => arguments,
                Err(cause) => {
                    debug!(operation, command = ?command, error = %cause, "rejected command");
                    yield Err(CommandFailure::new(command, cause));
                    continue;
                }
            };

            match execute(provider.shared(), arguments).await {
                Ok(output) => yield Ok(CommandResponse::new(command, output)),
                Err(cause) if cause.is_contract_violation() => {
                    debug!(operation, command = ?command, error = %cause, "rejected command");
                    yield Err(CommandFailure::new(command, cause));
                }
                Err(cause) => {
                    warn!(operation, command = ?command, error = %cause, "command failed, ending response stream");
                    yield Err(CommandFailure::new(command, cause));
                    break;
                }
            }
        }
    }
    .boxed()
}

fn scan<S, E>(
    provider: Arc<dyn ConnectionProvider>,
    commands: S,
    execute: E,
) -> ResponseStream<RangeCommand, RecordStream>
where
    S: Stream<Item = RangeCommand> + Send + 'static,
    E: Fn(Arc<dyn NativeStreamCommands>, XrangeArguments) -> RecordStream + Copy + Send + 'static,
{
    commands
        .map(move |command| {
            let arguments = match XrangeArguments::parse(&command) {
                Ok(arguments) => arguments,
                Err(cause) => {
                    debug!(command = ?command, error = %cause, "rejected range");
                    return Err(CommandFailure::new(command, cause));
                }
            };

            let output = execute_shared(Arc::clone(&provider), move |channel| {
                execute(channel, arguments)
            });

            Ok(CommandResponse::new(command, output))
        })
        .boxed()
}
