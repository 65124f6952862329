#![forbid(unsafe_code)]

pub mod ack;
pub mod config;
pub mod error;
pub mod intake;
pub mod request;

pub use config::Config;
pub use error::Error;
