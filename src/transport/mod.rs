//! Transport module - accepting TCP connections as channels.

mod tcp;

pub use tcp::{ChannelFactory, ChannelListener};
