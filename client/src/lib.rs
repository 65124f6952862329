#![forbid(unsafe_code)]

mod open_state;
pub mod producer;

pub use producer::{AckProducer, ForgetfulProducer, Producer, ProducerBuilder};
