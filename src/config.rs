use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    /// Size of the dedicated channel pool used by blocking reads.
    pub dedicated_channels: usize,
    /// How long a blocking read waits for a dedicated channel before failing.
    pub dedicated_acquire_timeout: Duration,
    /// Length commands allowed in flight at once.
    pub max_concurrent_lengths: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            dedicated_channels: 4,
            dedicated_acquire_timeout: Duration::from_secs(5),
            max_concurrent_lengths: 16,
        }
    }
}

impl AdapterConfig {
    /// Builds a config from command line arguments. The first argument is the
    /// program name and gets skipped.
    pub fn from_args<I: IntoIterator<Item = String>>(
        command_line_args: I,
    ) -> Result<Self, ConfigError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut config = AdapterConfig::default();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--dedicated-channels" => {
                    let dedicated_channels: usize = parse_flag_value(iter.next())?;

                    if dedicated_channels < 1 {
                        return Err(ConfigError::InvalidCommandLineFlagValue);
                    }

                    config.dedicated_channels = dedicated_channels;
                }
                "--acquire-timeout-ms" => {
                    config.dedicated_acquire_timeout =
                        Duration::from_millis(parse_flag_value(iter.next())?);
                }
                "--max-concurrent-lengths" => {
                    let max_concurrent_lengths: usize = parse_flag_value(iter.next())?;

                    if max_concurrent_lengths < 1 {
                        return Err(ConfigError::InvalidCommandLineFlagValue);
                    }

                    config.max_concurrent_lengths = max_concurrent_lengths;
                }
                _ => return Err(ConfigError::InvalidCommandLineFlag),
            }
        }

        Ok(config)
    }
}

fn parse_flag_value<T: std::str::FromStr>(value: Option<String>) -> Result<T, ConfigError> {
    let Some(value) = value else {
        return Err(ConfigError::InvalidCommandLineFlagValue);
    };

    value
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidCommandLineFlagValue)
}
