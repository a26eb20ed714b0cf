//! Command processing engine
//!
//! The two pure stages of the prepare pipeline:
//!
//! - [`SchemaValidator`]: headers + body into a normalized command
//! - [`EventTransformer`]: normalized command into an event envelope

pub mod rules;
pub mod transformer;
pub mod validator;

pub use transformer::{
    Clock, EventTransformer, FixedClock, IdGenerator, RandomIdGenerator, SequentialIdGenerator,
    SystemClock,
};
pub use validator::SchemaValidator;
