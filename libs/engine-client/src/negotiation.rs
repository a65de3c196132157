//! API version negotiation.
//!
//! A client starts either pinned to an explicit version (negotiation
//! disabled for its whole lifetime) or at [`DEFAULT_API_VERSION`] with
//! negotiation pending. Negotiation reads the daemon's advertised version
//! from a probe and only ever moves the working version down:
//!
//! ```text
//! working = min(working, advertised or FALLBACK_API_VERSION)
//! ```
//!
//! With automatic negotiation the first request runs the probe once; the
//! result is final even if the daemon later advertises something else.

use crate::error::EngineError;
use crate::ping::Ping;
use crate::version::{DEFAULT_API_VERSION, FALLBACK_API_VERSION, less_than};
use parking_lot::RwLock;
use std::future::Future;

/// Where a client is in the negotiation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// Version pinned explicitly or by the environment; never negotiates
    Disabled,
    /// Not negotiated yet
    Pending,
    /// Automatic negotiation completed; terminal
    Negotiated,
}

#[derive(Debug)]
struct VersionState {
    working: String,
    phase: NegotiationPhase,
}

/// Owns the working API version of one client and all its clones.
///
/// Reads go through a read lock and always observe a complete state. The
/// probe-and-apply sequence is serialized by an async guard so concurrent
/// first requests trigger a single probe.
#[derive(Debug)]
pub struct VersionNegotiator {
    state: RwLock<VersionState>,
    automatic: bool,
    probe_guard: tokio::sync::Mutex<()>,
}

impl VersionNegotiator {
    /// Pin `version`; negotiation is disabled permanently.
    #[must_use]
    pub fn pinned(version: impl Into<String>) -> Self {
        Self::with_state(version.into(), NegotiationPhase::Disabled, false)
    }

    /// Start at `initial` (default version when `None`) with negotiation pending.
    ///
    /// `automatic` makes the first request probe the daemon.
    #[must_use]
    pub fn negotiable(initial: Option<String>, automatic: bool) -> Self {
        let working = initial.unwrap_or_else(|| DEFAULT_API_VERSION.to_owned());
        Self::with_state(working, NegotiationPhase::Pending, automatic)
    }

    fn with_state(working: String, phase: NegotiationPhase, automatic: bool) -> Self {
        Self {
            state: RwLock::new(VersionState { working, phase }),
            automatic,
            probe_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Version used for request paths right now
    #[must_use]
    pub fn working_version(&self) -> String {
        self.state.read().working.clone()
    }

    #[must_use]
    pub fn phase(&self) -> NegotiationPhase {
        self.state.read().phase
    }

    /// `true` when automatic negotiation is enabled
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    /// `true` when the next request has to probe first
    #[must_use]
    pub fn needs_negotiation(&self) -> bool {
        self.automatic && self.phase() == NegotiationPhase::Pending
    }

    /// Apply a probe result.
    ///
    /// Ignored once negotiation is disabled or complete. Without automatic
    /// negotiation the phase stays `Pending`, so manual calls may repeat.
    pub fn apply_ping(&self, ping: &Ping) {
        let mut state = self.state.write();
        match state.phase {
            NegotiationPhase::Disabled => {
                tracing::debug!(
                    version = %state.working,
                    "API version pinned; ignoring negotiation"
                );
                return;
            }
            NegotiationPhase::Negotiated => return,
            NegotiationPhase::Pending => {}
        }

        let advertised = ping.advertised_version().unwrap_or(FALLBACK_API_VERSION);
        if state.working.is_empty() {
            DEFAULT_API_VERSION.clone_into(&mut state.working);
        }
        if less_than(advertised, &state.working) {
            tracing::debug!(
                from = %state.working,
                to = advertised,
                "downgrading API version to match daemon"
            );
            advertised.clone_into(&mut state.working);
        }
        if self.automatic {
            state.phase = NegotiationPhase::Negotiated;
        }
        tracing::debug!(
            version = %state.working,
            advertised = ?ping.api_version,
            "API version negotiated"
        );
    }

    /// Run `probe` and apply its result, unless nothing is pending.
    ///
    /// Concurrent callers share one probe: the first takes the guard, the
    /// rest wait and then see the negotiated phase. A failed probe leaves the
    /// phase `Pending` so a later call tries again.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NegotiationProbe`] wrapping the probe failure.
    pub async fn ensure_negotiated<F, Fut>(&self, probe: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Ping, EngineError>>,
    {
        if !self.needs_negotiation() {
            return Ok(());
        }

        let _guard = self.probe_guard.lock().await;
        if !self.needs_negotiation() {
            return Ok(());
        }
        self.probe_and_apply(probe).await
    }

    /// Explicitly requested negotiation.
    ///
    /// Probes whenever the phase is `Pending`, automatic or not, and holds
    /// the same guard as [`ensure_negotiated`](Self::ensure_negotiated) so a
    /// manual call racing the first request still runs a single probe.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NegotiationProbe`] wrapping the probe failure.
    pub async fn negotiate<F, Fut>(&self, probe: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Ping, EngineError>>,
    {
        if self.phase() != NegotiationPhase::Pending {
            return Ok(());
        }

        let _guard = self.probe_guard.lock().await;
        if self.phase() != NegotiationPhase::Pending {
            return Ok(());
        }
        self.probe_and_apply(probe).await
    }

    // callers hold probe_guard
    async fn probe_and_apply<F, Fut>(&self, probe: F) -> Result<(), EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Ping, EngineError>>,
    {
        match probe().await {
            Ok(ping) => {
                self.apply_ping(&ping);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "API version probe failed; negotiation stays pending"
                );
                Err(EngineError::NegotiationProbe(Box::new(err)))
            }
        }
    }

    #[cfg(test)]
    fn force_working_version(&self, version: &str) {
        version.clone_into(&mut self.state.write().working);
    }
}
