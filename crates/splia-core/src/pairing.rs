//! WhatsApp pairing state machine.
//!
//! Pure and clock-free: the runtime feeds it countdown ticks and poll
//! results, and executes the [`Effect`]s it returns.
//!
//! - `Loading → Waiting` once a pairing image is found.
//! - `Loading → Error(MissingImage)` when there is none.
//! - `Waiting → Connected` only on an explicit `"open"` from the gateway.
//! - `Waiting → Error(Expired)` when the countdown reaches zero.
//!
//! Poll results are applied only while `Waiting` and only for the most
//! recently issued ticket, so a late answer can never overwrite a terminal
//! phase or a newer poll.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routes::Route;

/// Seconds a pairing image stays valid on the gateway.
pub const DEFAULT_EXPIRY_SECS: u32 = 60;

/// Cadence of the connection-state poll.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Delay between showing the connected badge and leaving the screen.
pub const NAVIGATION_DELAY: Duration = Duration::from_secs(2);

/// The only gateway state that counts as a successful pairing.
pub const OPEN_STATE: &str = "open";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Loading,
    Waiting,
    Connected,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Connected | Self::Error)
    }
}

/// Why the machine is in [`Phase::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    /// No pairing image in local storage; onboarding must be redone.
    MissingImage,
    /// The countdown ran out before the gateway reported `open`.
    Expired,
}

/// Outcome of one connection-state poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollSignal {
    Open,
    NotOpen(String),
    /// The request failed (network, status, decode, missing handle).
    Unavailable(String),
}

impl PollSignal {
    /// Exact literal match: `"OPEN"` or `" open"` are not a connection.
    pub fn from_state(state: &str) -> Self {
        if state == OPEN_STATE {
            Self::Open
        } else {
            Self::NotOpen(state.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Scheduled,
    Manual,
}

/// Handle for one outstanding poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub seq: u64,
    pub kind: TicketKind,
}

/// Side effects requested by a transition, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTimers,
    CancelTimers,
    /// Flip the account record to connected. Emitted at most once.
    PersistConnected,
    Navigate { route: Route, after: Duration },
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingView {
    pub phase: Phase,
    pub failure: Option<Failure>,
    pub remaining_secs: u32,
    pub expiry_secs: u32,
    /// Transient error from a manual check, shown next to the badge.
    pub notice: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PairingMachine {
    phase: Phase,
    failure: Option<Failure>,
    expiry_secs: u32,
    remaining_secs: u32,
    latest_seq: u64,
    persisted: bool,
    notice: Option<String>,
}

impl Default for PairingMachine {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_SECS)
    }
}

impl PairingMachine {
    /// A zero expiry is bumped to one second so `Waiting` is observable.
    pub fn new(expiry_secs: u32) -> Self {
        let expiry_secs = expiry_secs.max(1);
        Self {
            phase: Phase::Loading,
            failure: None,
            expiry_secs,
            remaining_secs: expiry_secs,
            latest_seq: 0,
            persisted: false,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn failure(&self) -> Option<Failure> {
        self.failure
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn view(&self) -> PairingView {
        PairingView {
            phase: self.phase,
            failure: self.failure,
            remaining_secs: self.remaining_secs,
            expiry_secs: self.expiry_secs,
            notice: self.notice.clone(),
        }
    }

    /// Screen entry. Only meaningful from `Loading`.
    pub fn mount(&mut self, image_present: bool) -> Vec<Effect> {
        if self.phase != Phase::Loading {
            return Vec::new();
        }
        if image_present {
            self.phase = Phase::Waiting;
            vec![Effect::StartTimers]
        } else {
            self.fail(Failure::MissingImage);
            Vec::new()
        }
    }

    /// One countdown second elapsed.
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Waiting {
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.fail(Failure::Expired);
            return vec![Effect::CancelTimers];
        }
        Vec::new()
    }

    /// Issue a ticket for a cadence poll. `None` outside `Waiting`.
    pub fn begin_poll(&mut self) -> Option<PollTicket> {
        self.issue(TicketKind::Scheduled)
    }

    /// Issue a ticket for a user-triggered "check now".
    pub fn begin_manual_check(&mut self) -> Option<PollTicket> {
        self.issue(TicketKind::Manual)
    }

    /// Whether a result for `ticket` would still be applied.
    pub fn is_current(&self, ticket: PollTicket) -> bool {
        self.phase == Phase::Waiting && ticket.seq == self.latest_seq
    }

    /// Apply a poll result. Stale tickets and non-`Waiting` phases are ignored.
    ///
    /// A failed scheduled poll is absorbed; a failed manual check leaves a
    /// notice. Neither touches the countdown.
    pub fn resolve_poll(&mut self, ticket: PollTicket, signal: PollSignal) -> Vec<Effect> {
        if !self.is_current(ticket) {
            return Vec::new();
        }
        match signal {
            PollSignal::Open => {
                self.phase = Phase::Connected;
                self.notice = None;
                let mut effects = vec![Effect::CancelTimers];
                if !self.persisted {
                    self.persisted = true;
                    effects.push(Effect::PersistConnected);
                }
                effects.push(Effect::Navigate {
                    route: Route::Dashboard,
                    after: NAVIGATION_DELAY,
                });
                effects
            }
            PollSignal::NotOpen(_) => {
                if ticket.kind == TicketKind::Manual {
                    self.notice = None;
                }
                Vec::new()
            }
            PollSignal::Unavailable(reason) => {
                if ticket.kind == TicketKind::Manual {
                    self.notice = Some(reason);
                }
                Vec::new()
            }
        }
    }

    /// Full reload from `Error`: back to `Loading` with a fresh countdown.
    ///
    /// The sequence counter keeps counting so answers to polls issued
    /// before the reload stay stale.
    pub fn reload(&mut self) -> bool {
        if self.phase != Phase::Error {
            return false;
        }
        self.phase = Phase::Loading;
        self.failure = None;
        self.notice = None;
        self.remaining_secs = self.expiry_secs;
        true
    }

    /// Leave the screen for the previous onboarding step.
    pub fn back(&mut self) -> Vec<Effect> {
        match self.phase {
            Phase::Connected => Vec::new(),
            Phase::Waiting => vec![
                Effect::CancelTimers,
                Effect::Navigate {
                    route: Route::Onboarding,
                    after: Duration::ZERO,
                },
            ],
            Phase::Loading | Phase::Error => vec![Effect::Navigate {
                route: Route::Onboarding,
                after: Duration::ZERO,
            }],
        }
    }

    fn issue(&mut self, kind: TicketKind) -> Option<PollTicket> {
        if self.phase != Phase::Waiting {
            return None;
        }
        self.latest_seq = self.latest_seq.saturating_add(1);
        Some(PollTicket {
            seq: self.latest_seq,
            kind,
        })
    }

    fn fail(&mut self, failure: Failure) {
        self.phase = Phase::Error;
        self.failure = Some(failure);
    }
}
