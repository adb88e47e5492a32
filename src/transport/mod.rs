// src/transport/mod.rs

//! Point-to-point, blocking, ordered message passing between ranks.
//!
//! [`Channel`] only moves opaque byte payloads; [`wire`] gives them meaning.
//! Two implementations exist: [`SocketChannel`] joins forked processes with
//! Unix stream sockets, [`LocalChannel`] joins threads (or a single test) with
//! in-memory queues. Runtimes are generic over the trait so either can be
//! substituted.

pub mod local;
pub mod socket;
pub mod wire;

pub use local::LocalChannel;
pub use socket::SocketChannel;
pub use wire::{Assignment, Message, WireError};

use std::io;

/// A rank's endpoint into the process group.
///
/// Messages between any two ranks arrive in the order they were sent. There
/// is no timeout: receiving from a peer that never sends blocks forever.
pub trait Channel {
    /// This endpoint's rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Sends one payload to `rank`.
    fn send_to(&mut self, rank: usize, payload: &[u8]) -> io::Result<()>;

    /// Blocks until the next payload from `rank` arrives.
    fn receive_from(&mut self, rank: usize) -> io::Result<Vec<u8>>;
}

/// Failure to obtain a well-formed message from a peer.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Encodes and sends one message.
pub fn send_message<C: Channel + ?Sized>(
    channel: &mut C,
    rank: usize,
    message: &Message,
) -> io::Result<()> {
    let payload = message.encode();
    log::trace!(
        "rank {} -> rank {}: {} ({} bytes)",
        channel.rank(),
        rank,
        message.kind(),
        payload.len()
    );
    channel.send_to(rank, &payload)
}

/// Receives and decodes one message.
pub fn receive_message<C: Channel + ?Sized>(
    channel: &mut C,
    rank: usize,
) -> Result<Message, ReceiveError> {
    let payload = channel.receive_from(rank)?;
    let message = Message::decode(&payload)?;
    log::trace!(
        "rank {} <- rank {}: {} ({} bytes)",
        channel.rank(),
        rank,
        message.kind(),
        payload.len()
    );
    Ok(message)
}

pub(crate) fn invalid_peer(own: usize, size: usize, peer: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "rank {} cannot address rank {} in a group of {}",
            own, peer, size
        ),
    )
}
