use std::num::NonZeroUsize;

use snafu::OptionExt;

use crate::error::{Error, InvalidConfigSnafu};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity of the event intake, and of the broker buffer behind it
    pub events: usize,
    /// Upper bound on the number of events handed out by one `get`
    pub max_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            events: 4096,
            max_batch_size: 2048,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.events == 0 {
            return InvalidConfigSnafu {
                message: "events must be greater than 0",
            }
            .fail();
        }
        if self.max_batch_size == 0 {
            return InvalidConfigSnafu {
                message: "max_batch_size must be greater than 0",
            }
            .fail();
        }
        Ok(())
    }

    pub fn capacity(&self) -> Result<NonZeroUsize, Error> {
        self.validate()?;
        NonZeroUsize::new(self.events).context(InvalidConfigSnafu {
            message: "events must be greater than 0",
        })
    }
}
