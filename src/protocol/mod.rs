//! Protocol module - decoder contract and the WebSocket frame chain.
//!
//! - [`Decoder`] / [`DecoderFactory`]: what the channel's decode loop drives
//! - [`websocket`]: the multi-stage WebSocket frame decoder

mod decoder;
pub mod websocket;

pub use decoder::{Decoder, DecoderFactory};
