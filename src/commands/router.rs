use crate::stream::ReadOptions;

/// The kind of connection a unit of work runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionChannel {
    /// Pooled, multiplexed connection for calls that never block.
    Shared,
    /// Connection owned exclusively by one blocking call.
    Dedicated,
}

/// Picks the channel for a read.
///
/// A read with a block duration of zero or more may suspend on the server for
/// that whole duration (forever for zero), so it gets a connection of its own.
/// Everything else runs on the shared connection.
pub fn route(read_options: &ReadOptions) -> ExecutionChannel {
    match read_options.get_block() {
        Some(millis) if millis >= 0 => ExecutionChannel::Dedicated,
        _ => ExecutionChannel::Shared,
    }
}
