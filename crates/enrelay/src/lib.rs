mod client;
mod error;
mod filter;
mod note;
mod profile;
mod pubkey;

pub use client::{EventHandler, RelayClient, Subscription, SubscriptionHooks};
pub use error::Error;
pub use filter::Filter;
pub use note::{Note, NoteId};
pub use profile::ProfileState;
pub use pubkey::Pubkey;

pub type Result<T> = std::result::Result<T, error::Error>;

/// Event kinds understood by the engine.
pub const PROFILE_KIND: u64 = 0;
pub const REQUEST_KIND: u64 = 9041;
pub const RECEIPT_KIND: u64 = 9735;
pub const PAYER_PAYLOAD_KIND: u64 = 9734;
