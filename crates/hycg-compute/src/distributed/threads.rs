//! In-process worker group: one OS thread per worker.
//!
//! Every ordered pair of workers is joined by a `crossbeam` channel. A
//! collective sends this worker's contribution to each peer, then receives
//! one message from every peer in rank order. Channels are FIFO and every
//! worker issues collectives in the same order, so messages always pair up.
//!
//! A worker that returns or panics drops its endpoints; peers waiting on it
//! get [`CollectiveError::Disconnected`] instead of blocking forever.

use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::{check_gather, check_root, displacements, Collective, CollectiveError};

enum Packet {
    Values(Vec<f64>),
    Words(Vec<u64>),
    Partial(f64),
    Sync,
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::Values(_) => "values",
            Packet::Words(_) => "words",
            Packet::Partial(_) => "partial",
            Packet::Sync => "sync",
        }
    }
}

/// Factory for in-process worker groups.
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create the `size` member handles of a new group.
    ///
    /// Each handle must be driven by its own thread; a collective waits for
    /// messages from every other handle.
    pub fn members(size: usize) -> Vec<ThreadMember> {
        let size = size.max(1);
        let mut outboxes: Vec<Vec<Sender<Packet>>> = (0..size).map(|_| Vec::new()).collect();
        let mut inboxes: Vec<Vec<Receiver<Packet>>> = (0..size).map(|_| Vec::new()).collect();
        // inboxes[to][from] pairs with outboxes[from][to]; the diagonal is unused.
        for to in 0..size {
            for outbox in outboxes.iter_mut() {
                let (tx, rx) = unbounded();
                outbox.push(tx);
                inboxes[to].push(rx);
            }
        }
        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| ThreadMember {
                rank,
                size,
                outbox,
                inbox,
            })
            .collect()
    }

    /// Run `worker` on `size` scoped threads, one per member, and collect
    /// the per-rank results in rank order.
    pub fn run<T, F>(size: usize, worker: F) -> Result<Vec<T>, CollectiveError>
    where
        T: Send,
        F: Fn(ThreadMember) -> T + Sync,
    {
        let members = Self::members(size);
        let worker = &worker;
        thread::scope(|scope| {
            let handles: Vec<_> = members
                .into_iter()
                .map(|member| {
                    let rank = member.rank;
                    let handle = thread::Builder::new()
                        .name(format!("hycg-worker-{}", rank))
                        .spawn_scoped(scope, move || worker(member));
                    (rank, handle)
                })
                .collect();

            // Join every worker before reporting, so a failure on one rank
            // never leaves the others running unobserved.
            let mut results = Vec::with_capacity(handles.len());
            let mut failure = None;
            for (rank, handle) in handles {
                let joined = match handle {
                    Ok(handle) => handle
                        .join()
                        .map_err(|_| CollectiveError::WorkerPanicked { rank }),
                    Err(e) => Err(CollectiveError::Unavailable(format!(
                        "cannot spawn worker {}: {}",
                        rank, e
                    ))),
                };
                match joined {
                    Ok(value) => results.push(value),
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
            }
            match failure {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

/// One worker's handle on a [`ThreadGroup`].
pub struct ThreadMember {
    rank: usize,
    size: usize,
    outbox: Vec<Sender<Packet>>,
    inbox: Vec<Receiver<Packet>>,
}

impl ThreadMember {
    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |&peer| peer != self.rank)
    }

    fn send(&self, peer: usize, packet: Packet) -> Result<(), CollectiveError> {
        self.outbox[peer]
            .send(packet)
            .map_err(|_| CollectiveError::Disconnected { rank: peer })
    }

    fn send_all(&self, packet: impl Fn() -> Packet) -> Result<(), CollectiveError> {
        for peer in self.peers() {
            self.send(peer, packet())?;
        }
        Ok(())
    }

    fn recv(&self, peer: usize) -> Result<Packet, CollectiveError> {
        self.inbox[peer]
            .recv()
            .map_err(|_| CollectiveError::Disconnected { rank: peer })
    }

    fn recv_values(&self, op: &'static str, peer: usize) -> Result<Vec<f64>, CollectiveError> {
        match self.recv(peer)? {
            Packet::Values(values) => Ok(values),
            other => Err(unexpected(op, peer, &other)),
        }
    }
}

fn unexpected(op: &'static str, from: usize, packet: &Packet) -> CollectiveError {
    CollectiveError::UnexpectedMessage {
        op,
        from,
        kind: packet.kind(),
    }
}

fn copy_exact<T: Copy>(op: &'static str, src: &[T], dst: &mut [T]) -> Result<(), CollectiveError> {
    if src.len() != dst.len() {
        return Err(CollectiveError::CountMismatch {
            op,
            expected: src.len(),
            got: dst.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

impl Collective for ThreadMember {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, self.size)?;
        if self.rank == root {
            self.send_all(|| Packet::Values(buf.to_vec()))
        } else {
            let values = self.recv_values("broadcast", root)?;
            copy_exact("broadcast", &values, buf)
        }
    }

    fn broadcast_u64(&self, buf: &mut [u64], root: usize) -> Result<(), CollectiveError> {
        check_root(root, self.size)?;
        if self.rank == root {
            self.send_all(|| Packet::Words(buf.to_vec()))
        } else {
            match self.recv(root)? {
                Packet::Words(words) => copy_exact("broadcast_u64", &words, buf),
                other => Err(unexpected("broadcast_u64", root, &other)),
            }
        }
    }

    fn all_gather(
        &self,
        local: &[f64],
        counts: &[usize],
        out: &mut [f64],
    ) -> Result<(), CollectiveError> {
        check_gather(self.rank, self.size, local, counts, out)?;
        let offsets = displacements(counts);
        self.send_all(|| Packet::Values(local.to_vec()))?;

        let own = offsets[self.rank];
        out[own..own + local.len()].copy_from_slice(local);
        for peer in self.peers() {
            let values = self.recv_values("all_gather", peer)?;
            let start = offsets[peer];
            copy_exact("all_gather(peer)", &values, &mut out[start..start + counts[peer]])?;
        }
        Ok(())
    }

    fn all_reduce_sum(&self, local: f64) -> Result<f64, CollectiveError> {
        self.send_all(|| Packet::Partial(local))?;
        let mut partials = vec![0.0; self.size];
        partials[self.rank] = local;
        for peer in self.peers() {
            partials[peer] = match self.recv(peer)? {
                Packet::Partial(value) => value,
                other => return Err(unexpected("all_reduce_sum", peer, &other)),
            };
        }
        // Rank order, so every worker computes the bit-identical sum.
        Ok(partials.iter().sum())
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        self.send_all(|| Packet::Sync)?;
        for peer in self.peers() {
            match self.recv(peer)? {
                Packet::Sync => {}
                other => return Err(unexpected("barrier", peer, &other)),
            }
        }
        Ok(())
    }
}
