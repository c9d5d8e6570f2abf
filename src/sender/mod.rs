//! Delivers encoded records to spectatord over UDP.
//!
//! Records are grouped into chunks of at most [`CHUNK_SIZE`] so that a single
//! datagram stays small. A failed write replaces the socket before the next
//! attempt, which recovers from a local socket that went bad (for example
//! after the interface it was bound through changed). Each chunk gets at most
//! [`MAX_ATTEMPTS`] writes. Delivery beyond the local write is not confirmed.

mod line;

pub use line::{encode, encode_all};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use std::io::{Error, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

/// Maximum number of records written in one datagram.
pub const CHUNK_SIZE: usize = 32;

/// Maximum number of writes for a single chunk.
pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("unable to connect to {address}: {source}")]
    Connection { address: String, source: Error },
    #[error("unable to write to {address} after {attempts} attempts: {source}")]
    Write {
        address: String,
        attempts: usize,
        source: Error,
    },
}

/// An open outbound handle. Dropping it closes it.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error>;
}

/// Opens connections to a destination address.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, address: &str) -> Result<Self::Connection, Error>;
}

/// Connected UDP sockets, bound to an ephemeral local port.
pub struct Udp;

pub struct UdpConnection {
    socket: UdpSocket,
}

#[async_trait]
impl Connector for Udp {
    type Connection = UdpConnection;

    async fn connect(&self, address: &str) -> Result<UdpConnection, Error> {
        let target = tokio::net::lookup_host(address)
            .await?
            .next()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("could not resolve {address}"),
                )
            })?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        Ok(UdpConnection { socket })
    }
}

#[async_trait]
impl Connection for UdpConnection {
    async fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.socket.send(payload).await.map(|_| ())
    }
}

pub struct Transport<C: Connector = Udp> {
    address: String,
    connector: C,
    connection: Option<C::Connection>,
}

impl Transport<Udp> {
    pub async fn connect(address: impl Into<String>) -> Result<Self, SendError> {
        Self::with_connector(address, Udp).await
    }
}

impl<C: Connector> Transport<C> {
    pub async fn with_connector(
        address: impl Into<String>,
        connector: C,
    ) -> Result<Self, SendError> {
        let mut transport = Self {
            address: address.into(),
            connector,
            connection: None,
        };

        transport.reconnect().await?;

        Ok(transport)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send all records in order, [`CHUNK_SIZE`] at a time. Stops at the first
    /// chunk that can't be delivered; later chunks are not attempted.
    pub async fn send_all(&mut self, records: &[Vec<u8>]) -> Result<(), SendError> {
        for chunk in records.chunks(CHUNK_SIZE) {
            self.send_chunk(chunk).await?;
        }

        Ok(())
    }

    /// Write the chunk as one datagram, replacing the connection after each
    /// failed write.
    pub async fn send_chunk(&mut self, chunk: &[Vec<u8>]) -> Result<(), SendError> {
        let payload = chunk.concat();

        // a previous reconnect may have failed
        if self.connection.is_none() {
            self.reconnect().await?;
        }

        let mut attempts = 0;

        loop {
            attempts += 1;

            let result = match self.connection.as_mut() {
                Some(connection) => connection.send(&payload).await,
                None => Err(Error::from(ErrorKind::NotConnected)),
            };

            let source = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            debug!(
                "write of {} bytes to {} failed (attempt {attempts}/{MAX_ATTEMPTS}): {source}",
                payload.len(),
                self.address
            );

            self.reconnect().await?;

            if attempts >= MAX_ATTEMPTS {
                return Err(SendError::Write {
                    address: self.address.clone(),
                    attempts,
                    source,
                });
            }
        }
    }

    async fn reconnect(&mut self) -> Result<(), SendError> {
        // close the old handle before opening a new one
        self.connection = None;

        let connection = self
            .connector
            .connect(&self.address)
            .await
            .map_err(|source| SendError::Connection {
                address: self.address.clone(),
                source,
            })?;

        self.connection = Some(connection);

        Ok(())
    }
}
