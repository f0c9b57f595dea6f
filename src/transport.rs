//! Task Merger transport (spec.md §4.5, §9 design note): the capability
//! a multi-process deployment would plug in to exchange per-process
//! [`BestNRegister`] snapshots between refinement iterations.
//!
//! Only a single-process, no-op implementation and an in-process
//! channel-backed implementation (useful for exercising the merge
//! protocol without a real process boundary) are provided; a networked
//! implementation is out of scope (spec.md §2 Non-goals: no distributed
//! execution backend is shipped).

use crate::best_n::BestNRegister;
use crate::error::{ErrorKind, Result};
use std::sync::{Arc, Condvar, Mutex};

/// Exchanges one process's best-N snapshot with its peers at the end of
/// a refinement iteration.
pub trait Transport {
    /// Send this process's register to all peers and return the merge of
    /// every peer's register (including this one).
    fn exchange(&self, mine: BestNRegister) -> Result<BestNRegister>;

    /// Number of peers participating in the exchange, including self.
    fn n_peers(&self) -> usize;
}

/// The default transport for a single-process run: `exchange` is the
/// identity function.
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn exchange(&self, mine: BestNRegister) -> Result<BestNRegister> {
        Ok(mine)
    }

    fn n_peers(&self) -> usize {
        1
    }
}

/// Round state shared by every peer in one [`ChannelTransport`] fan-out.
/// `arrived`/`departed` implement a two-phase (arrival, then departure)
/// barrier over a single mutex so no peer reuses `slots` for the next
/// round before every peer has read the current one.
struct RoundState {
    slots: Vec<Option<BestNRegister>>,
    arrived: usize,
    departed: usize,
}

struct Barrier {
    state: Mutex<RoundState>,
    cv: Condvar,
}

/// A barrier-backed transport for a fixed set of peers running as
/// threads within the same process. Each peer calls [`exchange`] once
/// per iteration; the call blocks until every peer has contributed,
/// mirroring the barrier a real distributed merger would impose.
pub struct ChannelTransport {
    id: usize,
    n_peers: usize,
    shared: Arc<Barrier>,
}

impl ChannelTransport {
    /// Build one [`ChannelTransport`] per peer, all wired to the same
    /// shared barrier.
    pub fn fan_out(n_peers: usize) -> Vec<Self> {
        assert!(n_peers >= 1);
        let shared = Arc::new(Barrier {
            state: Mutex::new(RoundState {
                slots: (0..n_peers).map(|_| None).collect(),
                arrived: 0,
                departed: 0,
            }),
            cv: Condvar::new(),
        });
        (0..n_peers)
            .map(|id| Self {
                id,
                n_peers,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn exchange(&self, mine: BestNRegister) -> Result<BestNRegister> {
        let mut state = self.shared.state.lock().expect("transport barrier poisoned");

        state.slots[self.id] = Some(clone_register(&mine));
        state.arrived += 1;
        if state.arrived == self.n_peers {
            self.shared.cv.notify_all();
        } else {
            state = self
                .shared
                .cv
                .wait_while(state, |state| state.arrived != self.n_peers)
                .expect("transport barrier poisoned");
        }

        let mut merged = mine;
        for (peer, slot) in state.slots.iter().enumerate() {
            if peer != self.id {
                let other = slot.as_ref().ok_or_else(|| {
                    crate::error::Error::message(
                        ErrorKind::Transport,
                        "transport peer missing from completed round",
                    )
                })?;
                merged.merge(other);
            }
        }

        state.departed += 1;
        if state.departed == self.n_peers {
            state.slots.iter_mut().for_each(|slot| *slot = None);
            state.arrived = 0;
            state.departed = 0;
            self.shared.cv.notify_all();
        } else {
            let _ = self
                .shared
                .cv
                .wait_while(state, |state| state.departed != 0)
                .expect("transport barrier poisoned");
        }

        Ok(merged)
    }

    fn n_peers(&self) -> usize {
        self.n_peers
    }
}

fn clone_register(register: &BestNRegister) -> BestNRegister {
    let mut copy = BestNRegister::new(register.entries().len().max(1));
    for candidate in register.entries() {
        copy.offer(candidate.error, candidate.values.clone());
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_transport_is_identity() {
        let transport = LocalTransport;
        let mut reg = BestNRegister::new(2);
        reg.offer(1.0, ndarray::arr1(&[1.0]));
        let merged = transport.exchange(reg).unwrap();
        assert_eq!(merged.best().unwrap().error, 1.0);
    }
}
