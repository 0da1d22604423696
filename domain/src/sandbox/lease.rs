//! Lease-bounded lifetime of script-visible host handles.
//!
//! A zero initial lease time means the handle is managed explicitly: it
//! never expires by time and lives until the host disposes it (which the
//! engine does when the owning script is removed or the region closes).
//! Any other value starts a timed lease that lapses at `expires_at` and
//! is expired once the sponsorship window after that has also passed
//! without a renewal.

use std::time::{Duration, Instant};

/// Lease parameters for one kind of proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    pub initial_lease_time: Duration,
    /// Extend the lease on every successful call. Opt-in.
    pub renew_on_call: bool,
    /// Grace interval after lapse during which a renewal still rescues
    /// the lease.
    pub sponsorship_timeout: Duration,
}

impl LeasePolicy {
    /// Explicit-disposal policy: no time-based expiry.
    pub fn manual() -> Self {
        Self {
            initial_lease_time: Duration::ZERO,
            renew_on_call: false,
            sponsorship_timeout: Duration::ZERO,
        }
    }

    pub fn timed(initial_lease_time: Duration, sponsorship_timeout: Duration) -> Self {
        Self {
            initial_lease_time,
            renew_on_call: false,
            sponsorship_timeout,
        }
    }

    pub fn with_renew_on_call(mut self, renew: bool) -> Self {
        self.renew_on_call = renew;
        self
    }

    pub fn mode(&self) -> LeaseMode {
        if self.initial_lease_time.is_zero() {
            LeaseMode::Manual
        } else {
            LeaseMode::Timed
        }
    }
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self::manual()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseMode {
    /// Lives until explicitly disposed.
    Manual,
    /// Expires after `initial_lease_time` plus the sponsorship window.
    Timed,
}

/// Observable state of a lease at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Active,
    /// Past `expires_at` but still inside the sponsorship window.
    Lapsed,
    Expired,
}

/// A live lease attached to one proxy handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProxyLease {
    policy: LeasePolicy,
    /// `None` for manual leases.
    expires_at: Option<Instant>,
}

impl RemoteProxyLease {
    pub fn new(policy: LeasePolicy, now: Instant) -> Self {
        let expires_at = match policy.mode() {
            LeaseMode::Manual => None,
            LeaseMode::Timed => Some(now + policy.initial_lease_time),
        };
        Self { policy, expires_at }
    }

    pub fn policy(&self) -> &LeasePolicy {
        &self.policy
    }

    pub fn mode(&self) -> LeaseMode {
        self.policy.mode()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn state(&self, now: Instant) -> LeaseState {
        let Some(expires_at) = self.expires_at else {
            return LeaseState::Active;
        };
        if now < expires_at {
            LeaseState::Active
        } else if now < expires_at + self.policy.sponsorship_timeout {
            LeaseState::Lapsed
        } else {
            LeaseState::Expired
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.state(now) == LeaseState::Expired
    }

    /// Host-side renewal. Returns `false` if the lease had already expired;
    /// expired leases cannot be revived.
    pub fn renew(&mut self, now: Instant) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if let Some(expires_at) = self.expires_at {
            self.expires_at = Some(expires_at.max(now + self.policy.initial_lease_time));
        }
        true
    }

    /// Bookkeeping for a successful call through the handle.
    pub fn record_call(&mut self, now: Instant) {
        if self.policy.renew_on_call {
            self.renew(now);
        }
    }
}
