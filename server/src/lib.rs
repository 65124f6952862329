#![forbid(unsafe_code)]

use snafu::{Location, Snafu};

mod broker;
mod consumer;

pub use broker::Broker;
pub use consumer::{Batch, Consumer};
pub use memq_common::Config;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid broker config"))]
    Config {
        source: memq_common::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("broker has shutdown"))]
    Shutdown {
        #[snafu(implicit)]
        location: Location,
    },
}
