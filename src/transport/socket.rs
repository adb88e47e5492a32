// src/transport/socket.rs

//! Unix stream socket transport between forked processes.

use super::{invalid_peer, Channel};
use anyhow::Context;
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

/// Upper bound on a single frame; anything larger is treated as corruption.
const MAX_FRAME_BYTES: u64 = 1 << 36;

/// Creates a connected pair of stream sockets.
pub fn stream_pair() -> anyhow::Result<(UnixStream, UnixStream)> {
    let (a, b) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .context("Failed to create socket pair (nix::sys::socket::socketpair)")?;
    log::trace!(
        "Created socket pair fds {} <-> {}",
        a.as_raw_fd(),
        b.as_raw_fd()
    );
    Ok((UnixStream::from(a), UnixStream::from(b)))
}

/// Endpoint holding one stream per reachable peer.
///
/// Each payload is framed with a little-endian `u64` length. Reads and writes
/// block until the whole frame has moved.
#[derive(Debug)]
pub struct SocketChannel {
    rank: usize,
    size: usize,
    peers: Vec<Option<UnixStream>>,
}

impl SocketChannel {
    /// `peers[r]` is the stream connected to rank `r`, if any.
    pub fn new(rank: usize, size: usize, peers: Vec<Option<UnixStream>>) -> Self {
        debug_assert_eq!(peers.len(), size);
        Self { rank, size, peers }
    }

    fn peer(&mut self, rank: usize) -> io::Result<&mut UnixStream> {
        let (own, size) = (self.rank, self.size);
        self.peers
            .get_mut(rank)
            .and_then(Option::as_mut)
            .ok_or_else(|| invalid_peer(own, size, rank))
    }
}

impl Channel for SocketChannel {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_to(&mut self, rank: usize, payload: &[u8]) -> io::Result<()> {
        let stream = self.peer(rank)?;
        stream.write_all(&(payload.len() as u64).to_le_bytes())?;
        stream.write_all(payload)?;
        stream.flush()
    }

    fn receive_from(&mut self, rank: usize) -> io::Result<Vec<u8>> {
        let stream = self.peer(rank)?;
        let mut header = [0u8; 8];
        stream.read_exact(&mut header)?;
        let len = u64::from_le_bytes(header);
        if len > MAX_FRAME_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {} bytes from rank {} exceeds the limit", len, rank),
            ));
        }
        let mut payload = vec![0u8; len as usize];
        stream.read_exact(&mut payload)?;
        Ok(payload)
    }
}
