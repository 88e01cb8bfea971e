//! splia-core: domain model for the SPL IA laundromat assistant client.
//! Account records, routing rules, the WhatsApp pairing state machine,
//! plans, and dashboard cards. No IO, no async.

pub mod metrics;
pub mod pages;
pub mod pairing;
pub mod plans;
pub mod routes;
pub mod types;
pub mod validation;

pub use pairing::{Effect, Failure, PairingMachine, PairingView, Phase, PollSignal, PollTicket};
pub use routes::Route;
pub use types::{
    AccountRecord, ConnectionState, PairingImage, SessionHandle, SpliaError, SubscriptionState,
};
