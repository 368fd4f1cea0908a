mod command_error;
mod command_response;
pub mod router;
pub mod stream_utils;
pub mod xack;
pub mod xadd;
pub mod xdel;
pub mod xgroup;
pub mod xlen;
pub mod xrange;
pub mod xread;
pub mod xtrim;

pub use command_error::{require, CommandError, CommandFailure};
pub use command_response::CommandResponse;
pub use router::{route, ExecutionChannel};
pub use xack::AcknowledgeCommand;
pub use xadd::AddRecord;
pub use xdel::DeleteCommand;
pub use xgroup::{GroupAction, GroupCommand};
pub use xlen::KeyCommand;
pub use xrange::RangeCommand;
pub use xread::ReadCommand;
pub use xtrim::TrimCommand;
