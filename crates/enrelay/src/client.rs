use crate::{Filter, Note, Result};

pub type EventHandler = Box<dyn Fn(Note) + Send + Sync>;

/// Optional lifecycle callbacks for a live subscription.
#[derive(Default)]
pub struct SubscriptionHooks {
    /// Fired once the relay has delivered everything it had stored and
    /// switches to live push.
    pub on_end_of_stored_events: Option<Box<dyn Fn() + Send + Sync>>,
    /// Fired when the relay closes the subscription from its side.
    pub on_closed: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

/// Handle to a live subscription. Closing is best-effort: the
/// transport may have closed it already, so callers swallow errors.
pub trait Subscription: Send {
    fn unsubscribe(&mut self) -> Result<()>;
}

/// The relay transport collaborator. Connection management, fan-out
/// and retry live behind this seam; the engine only issues queries,
/// holds subscriptions, and publishes.
#[async_trait::async_trait]
pub trait RelayClient: Send + Sync {
    /// One-shot query. May be called repeatedly for batching.
    async fn get_events(&self, filters: &[Filter]) -> Result<Vec<Note>>;

    /// Open a live subscription delivering matching events to
    /// `on_event` until the returned handle is unsubscribed.
    fn subscribe(
        &self,
        filters: Vec<Filter>,
        on_event: EventHandler,
        hooks: SubscriptionHooks,
    ) -> Result<Box<dyn Subscription>>;

    async fn publish(&self, note: Note) -> Result<()>;
}
