use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use sandscript_domain::{LeaseMode, LeasePolicy, LeaseState, ObjectId, RemoteProxyLease, ScriptExecutionContext};

use super::SandboxError;

/// Script-visible reference to an execution context.
///
/// The generation changes every time a slot is reused, so a handle that
/// outlived its slot can never resolve to someone else's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyHandle {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct HandleEntry {
    context: Arc<ScriptExecutionContext>,
    lease: RemoteProxyLease,
    last_call: Option<Instant>,
}

#[derive(Debug)]
enum SlotState {
    Vacant,
    Live(HandleEntry),
    /// Reclaimed because the lease ran out. Kept until reuse so that the
    /// holder is told why its handle stopped working.
    Expired,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: SlotState,
}

/// Generational arena of proxy handles.
#[derive(Debug, Default)]
pub struct HandleArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl HandleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new handle for `context` under `policy`.
    pub fn issue(
        &mut self,
        context: Arc<ScriptExecutionContext>,
        policy: LeasePolicy,
        now: Instant,
    ) -> ProxyHandle {
        let entry = HandleEntry {
            context,
            lease: RemoteProxyLease::new(policy, now),
            last_call: None,
        };
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = SlotState::Live(entry);
            return ProxyHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Live(entry),
        });
        ProxyHandle {
            index,
            generation: 0,
        }
    }

    fn slot_mut(&mut self, handle: ProxyHandle) -> Result<&mut Slot, SandboxError> {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => Ok(slot),
            _ => Err(SandboxError::InvalidHandle(handle)),
        }
    }

    /// Resolve a handle for a call made at `now`.
    ///
    /// Renews the lease when its policy has `renew_on_call`. A lease found
    /// expired here is reclaimed on the spot.
    pub fn access(
        &mut self,
        handle: ProxyHandle,
        now: Instant,
    ) -> Result<Arc<ScriptExecutionContext>, SandboxError> {
        let slot = self.slot_mut(handle)?;
        let entry = match &mut slot.state {
            SlotState::Live(entry) => entry,
            SlotState::Expired => return Err(SandboxError::LeaseExpired(handle)),
            SlotState::Vacant => return Err(SandboxError::InvalidHandle(handle)),
        };

        if entry.lease.is_expired(now) {
            self.expire(handle.index);
            return Err(SandboxError::LeaseExpired(handle));
        }

        entry.lease.record_call(now);
        entry.last_call = Some(now);
        Ok(Arc::clone(&entry.context))
    }

    /// Sponsor renewal from the host side.
    pub fn renew(&mut self, handle: ProxyHandle, now: Instant) -> Result<(), SandboxError> {
        let slot = self.slot_mut(handle)?;
        let renewed = match &mut slot.state {
            SlotState::Live(entry) => entry.lease.renew(now),
            SlotState::Expired => false,
            SlotState::Vacant => return Err(SandboxError::InvalidHandle(handle)),
        };
        if renewed {
            Ok(())
        } else {
            self.expire(handle.index);
            Err(SandboxError::LeaseExpired(handle))
        }
    }

    /// Lease state of a live handle, or `None` for stale/vacant handles.
    pub fn lease_state(&self, handle: ProxyHandle, now: Instant) -> Option<LeaseState> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        match &slot.state {
            SlotState::Live(entry) => Some(entry.lease.state(now)),
            SlotState::Expired => Some(LeaseState::Expired),
            SlotState::Vacant => None,
        }
    }

    pub fn last_call(&self, handle: ProxyHandle) -> Option<Instant> {
        match &self.slots.get(handle.index as usize)?.state {
            SlotState::Live(entry) => entry.last_call,
            _ => None,
        }
    }

    /// Explicitly dispose a handle. Returns `false` if it was not live.
    pub fn dispose(&mut self, handle: ProxyHandle) -> bool {
        let Ok(slot) = self.slot_mut(handle) else {
            return false;
        };
        if !matches!(slot.state, SlotState::Live(_)) {
            return false;
        }
        slot.state = SlotState::Vacant;
        self.free.push(handle.index);
        self.live -= 1;
        true
    }

    /// Dispose every handle belonging to one script.
    pub fn dispose_owner(&mut self, script_id: ObjectId) -> usize {
        let mut disposed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let SlotState::Live(entry) = &slot.state
                && entry.context.script_id == script_id
            {
                slot.state = SlotState::Vacant;
                self.free.push(index as u32);
                disposed += 1;
            }
        }
        self.live -= disposed;
        disposed
    }

    /// Drop everything (engine shutdown).
    pub fn dispose_all(&mut self) -> usize {
        let disposed = self.live;
        self.slots.clear();
        self.free.clear();
        self.live = 0;
        disposed
    }

    /// Reclaim timed leases that expired by `now`. Manual leases are never
    /// touched.
    pub fn sweep(&mut self, now: Instant) -> Vec<ProxyHandle> {
        let expired: Vec<ProxyHandle> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.state {
                SlotState::Live(entry)
                    if entry.lease.mode() == LeaseMode::Timed && entry.lease.is_expired(now) =>
                {
                    Some(ProxyHandle {
                        index: index as u32,
                        generation: slot.generation,
                    })
                }
                _ => None,
            })
            .collect();

        for handle in &expired {
            self.expire(handle.index);
        }
        expired
    }

    fn expire(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if matches!(slot.state, SlotState::Live(_)) {
            slot.state = SlotState::Expired;
            self.free.push(index);
            self.live -= 1;
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
