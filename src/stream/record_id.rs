use std::{fmt, str::FromStr};

use crate::commands::CommandError;

/// Identifier of a stream entry.
///
/// Concrete identifiers have the format "timestamp-sequence" and are totally
/// ordered by timestamp first, then by sequence. The two auto variants are only
/// meaningful when adding entries: `*` lets the engine pick the whole identifier
/// and `timestamp-*` lets it pick the sequence part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordId {
    Concrete { millis: u64, sequence: u64 },
    AutoSequence(u64),
    AutoGenerate,
}

impl RecordId {
    pub const MIN: RecordId = RecordId::Concrete {
        millis: 0,
        sequence: 0,
    };

    pub const MAX: RecordId = RecordId::Concrete {
        millis: u64::MAX,
        sequence: u64::MAX,
    };

    pub fn of(millis: u64, sequence: u64) -> Self {
        RecordId::Concrete { millis, sequence }
    }

    pub fn auto_generate() -> Self {
        RecordId::AutoGenerate
    }

    /// Whether the engine should assign the complete identifier on write.
    pub fn should_be_auto_generated(&self) -> bool {
        matches!(self, RecordId::AutoGenerate)
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, RecordId::Concrete { .. })
    }

    /// The string form sent to the engine.
    pub fn value(&self) -> String {
        self.to_string()
    }

    pub fn timestamp(&self) -> Option<u64> {
        match self {
            RecordId::Concrete { millis, .. } | RecordId::AutoSequence(millis) => Some(*millis),
            RecordId::AutoGenerate => None,
        }
    }

    pub fn sequence(&self) -> Option<u64> {
        match self {
            RecordId::Concrete { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::AutoGenerate
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Concrete { millis, sequence } => write!(f, "{}-{}", millis, sequence),
            RecordId::AutoSequence(millis) => write!(f, "{}-*", millis),
            RecordId::AutoGenerate => write!(f, "*"),
        }
    }
}

impl FromStr for RecordId {
    type Err = CommandError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == "*" {
            return Ok(RecordId::AutoGenerate);
        }

        let split_value = value.split('-').collect::<Vec<&str>>();

        if split_value.len() != 2 {
            return Err(CommandError::InvalidStreamId(
                "Invalid stream ID format".to_string(),
            ));
        }

        let millis = split_value[0].parse::<u64>().map_err(|_| {
            CommandError::InvalidStreamId("Timestamp specified must be greater than 0".to_string())
        })?;

        if split_value[1] == "*" {
            return Ok(RecordId::AutoSequence(millis));
        }

        let sequence = split_value[1].parse::<u64>().map_err(|_| {
            CommandError::InvalidStreamId("Sequence specified must be greater than 0".to_string())
        })?;

        Ok(RecordId::Concrete { millis, sequence })
    }
}
