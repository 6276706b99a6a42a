//! Channel primitives connecting the viewer core to its collaborators.

pub mod relay;

pub use relay::{Relay, RelayError, drain, relay};
