// src/transport/local.rs

//! In-memory channel mesh for running every rank inside one process.

use super::{invalid_peer, Channel};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};

/// Endpoint of a fully connected mesh of queues, one queue per ordered pair
/// of ranks.
///
/// Sends are buffered rather than rendezvous, which preserves the ordering
/// guarantee the runtimes rely on. A send to a rank whose endpoint has been
/// dropped fails with `BrokenPipe`; a receive from one fails with
/// `UnexpectedEof`, mirroring a peer process that exited.
#[derive(Debug)]
pub struct LocalChannel {
    rank: usize,
    size: usize,
    outboxes: Vec<Option<Sender<Vec<u8>>>>,
    inboxes: Vec<Option<Receiver<Vec<u8>>>>,
}

impl LocalChannel {
    /// Builds `size` connected endpoints; element `i` belongs to rank `i`.
    pub fn mesh(size: usize) -> Vec<LocalChannel> {
        let mut outboxes: Vec<Vec<Option<Sender<Vec<u8>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Vec<u8>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for from in 0..size {
            for to in 0..size {
                if from == to {
                    continue;
                }
                let (tx, rx) = mpsc::channel();
                outboxes[from][to] = Some(tx);
                inboxes[to][from] = Some(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalChannel {
                rank,
                size,
                outboxes,
                inboxes,
            })
            .collect()
    }
}

impl Channel for LocalChannel {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_to(&mut self, rank: usize, payload: &[u8]) -> io::Result<()> {
        let outbox = self
            .outboxes
            .get(rank)
            .and_then(Option::as_ref)
            .ok_or_else(|| invalid_peer(self.rank, self.size, rank))?;
        outbox.send(payload.to_vec()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("rank {} is no longer receiving", rank),
            )
        })
    }

    fn receive_from(&mut self, rank: usize) -> io::Result<Vec<u8>> {
        let inbox = self
            .inboxes
            .get(rank)
            .and_then(Option::as_ref)
            .ok_or_else(|| invalid_peer(self.rank, self.size, rank))?;
        inbox.recv().map_err(|_| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("rank {} closed its channel", rank),
            )
        })
    }
}
