//! TCP listener and per-connection channel factory.
//!
//! # Example
//!
//! ```no_run
//! use sockpipe::protocol::websocket::WebSocketDecoder;
//! use sockpipe::transport::ChannelListener;
//! use sockpipe::ChannelOptions;
//!
//! # async fn run() -> sockpipe::Result<()> {
//! let listener = ChannelListener::bind(
//!     "127.0.0.1:9000",
//!     ChannelOptions::default(),
//!     WebSocketDecoder::from_options,
//! )
//! .await?;
//!
//! loop {
//!     let mut parts = listener.accept().await?;
//!     tokio::spawn(async move {
//!         while let Some(frame) = parts.units.recv().await {
//!             println!("{:?} ({} bytes)", frame.opcode, frame.payload_len());
//!         }
//!     });
//! }
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::channel::{Channel, ChannelParts};
use crate::error::Result;
use crate::options::ChannelOptions;
use crate::protocol::{Decoder, DecoderFactory};

type UnitOf<F> = <<F as DecoderFactory>::Decoder as Decoder>::Unit;

/// Builds a channel, with a fresh decoder, for each accepted connection.
pub struct ChannelFactory<F> {
    options: Arc<ChannelOptions>,
    decoders: F,
}

impl<F: DecoderFactory> ChannelFactory<F> {
    /// Create a factory. Fails if `options` do not validate.
    pub fn new(options: ChannelOptions, decoders: F) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options: Arc::new(options),
            decoders,
        })
    }

    pub fn options(&self) -> &Arc<ChannelOptions> {
        &self.options
    }

    /// Open a channel over an accepted connection.
    pub fn create(&self, stream: TcpStream) -> Result<ChannelParts<UnitOf<F>>> {
        stream.set_nodelay(self.options.no_delay)?;
        let peer = stream.peer_addr().ok();

        let decoder = self.decoders.create(&self.options);
        let (reader, writer) = stream.into_split();
        let parts = Channel::open_split(reader, writer, decoder, self.options.clone(), peer)?;

        tracing::debug!(id = parts.channel.id(), peer = ?peer, "Channel opened");
        Ok(parts)
    }
}

/// TCP listener that hands out ready channels.
pub struct ChannelListener<F> {
    listener: TcpListener,
    factory: ChannelFactory<F>,
}

impl<F: DecoderFactory> ChannelListener<F> {
    /// Bind to `addr`.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        options: ChannelOptions,
        decoders: F,
    ) -> Result<Self> {
        let factory = ChannelFactory::new(options, decoders)?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, factory })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<ChannelParts<UnitOf<F>>> {
        let (stream, _addr) = self.listener.accept().await?;
        self.factory.create(stream)
    }

    pub fn factory(&self) -> &ChannelFactory<F> {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::protocol::websocket::{build_frame, FrameHeader, OpCode, WebSocketDecoder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_factory_rejects_invalid_options() {
        let options = ChannelOptions::default().with_receive_buffer_size(0);
        let result = ChannelFactory::new(options, WebSocketDecoder::from_options);
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }

    #[tokio::test]
    async fn test_accept_opens_channel() {
        let listener = ChannelListener::bind(
            "127.0.0.1:0",
            ChannelOptions::default(),
            WebSocketDecoder::from_options,
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut parts = listener.accept().await.unwrap();

        assert_eq!(
            parts.channel.peer_addr(),
            Some(client.local_addr().unwrap())
        );

        client
            .write_all(&build_frame(&FrameHeader::new(OpCode::Ping, 0), &[]))
            .await
            .unwrap();
        let ping = parts.units.recv().await.unwrap();
        assert_eq!(ping.opcode, OpCode::Ping);
        assert_eq!(ping.payload_len(), 0);

        parts.channel.send(&b"pong"[..]).await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_each_connection_gets_fresh_decoder() {
        let listener = ChannelListener::bind(
            "127.0.0.1:0",
            ChannelOptions::default(),
            WebSocketDecoder::from_options,
        )
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        // Leave a partial header on the first connection.
        let mut first = TcpStream::connect(addr).await.unwrap();
        let _first_parts = listener.accept().await.unwrap();
        first.write_all(&[0x82]).await.unwrap();

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut second_parts = listener.accept().await.unwrap();
        second
            .write_all(&build_frame(&FrameHeader::new(OpCode::Text, 2), b"hi"))
            .await
            .unwrap();

        let unit = second_parts.units.recv().await.unwrap();
        assert_eq!(unit.opcode, OpCode::Text);
        assert_eq!(unit.payload.to_vec(), b"hi".to_vec());
    }
}
