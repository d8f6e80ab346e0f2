//! Client-side reconciliation engine for payment-request posts and
//! their payment receipts, fed by an eventually-consistent set of
//! relays that may duplicate, delay, or omit events.
//!
//! The engine correlates the two event streams, deduplicates across
//! sources, classifies receipts against per-request constraints, and
//! keeps the live subscriptions aligned with whatever is displayed.
//! Transport and presentation both live outside: relays behind the
//! [`enrelay::RelayClient`] seam, rendering on top of [`FeedSession`].

mod batch;
mod classify;
mod error;
mod feed;
mod profiles;
mod receipt;
mod request;
mod session;
mod subs;
mod thread;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{ReceiptBatcher, FLUSH_DELAY, FLUSH_SIZE};
pub use classify::{classify, within_restriction, Classified};
pub use error::Error;
pub use feed::{Feed, FeedLoader, FeedScope, AUTHOR_BATCH_SIZE};
pub use profiles::{ProfileCache, ProfileResolver};
pub use receipt::Receipt;
pub use request::Request;
pub use session::FeedSession;
pub use subs::{LiveSubs, MAX_LIVE_AUTHORS};
pub use thread::{assign_reply_levels, ThreadedReply};

pub type Result<T> = std::result::Result<T, error::Error>;
