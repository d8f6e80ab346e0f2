use std::collections::HashSet;

use enrelay::{
    EventHandler, Filter, NoteId, Pubkey, RelayClient, Subscription, SubscriptionHooks,
    RECEIPT_KIND, REQUEST_KIND,
};

/// Live subscriptions are skipped entirely above this author-set size;
/// the relay layer may reject such filters.
pub const MAX_LIVE_AUTHORS: usize = 100;

/// Holds the two live subscriptions for a scope: one for new requests
/// (strictly newer than what the page load returned) and one for new
/// receipts against the displayed id set.
///
/// Resubscription is gated on the id set actually changing as a set;
/// reordering alone must not thrash the transport.
#[derive(Default)]
pub struct LiveSubs {
    request_sub: Option<Box<dyn Subscription>>,
    receipt_sub: Option<Box<dyn Subscription>>,
    subscribed_ids: HashSet<NoteId>,
    stopping: bool,
}

impl LiveSubs {
    pub fn is_active(&self) -> bool {
        self.request_sub.is_some() || self.receipt_sub.is_some()
    }

    /// Go live. `newest_created_at` fences the request subscription so
    /// the page just loaded is not re-received. Skipped when the
    /// author scope is too large to subscribe to.
    pub fn start(
        &mut self,
        client: &dyn RelayClient,
        authors: Option<&[Pubkey]>,
        newest_created_at: u64,
        displayed: &HashSet<NoteId>,
        on_request: EventHandler,
        on_receipt: EventHandler,
    ) {
        if self.is_active() {
            return;
        }

        if let Some(authors) = authors {
            if authors.len() > MAX_LIVE_AUTHORS {
                tracing::debug!(
                    authors = authors.len(),
                    "author scope too large, skipping live subscriptions"
                );
                return;
            }
        }

        let mut filter = Filter::new().kinds([REQUEST_KIND]).since(newest_created_at);
        if let Some(authors) = authors {
            filter = filter.authors(authors.iter().copied());
        }

        match client.subscribe(vec![filter], on_request, SubscriptionHooks::default()) {
            Ok(sub) => self.request_sub = Some(sub),
            Err(err) => tracing::debug!("request subscription failed: {err}"),
        }

        self.open_receipt_sub(client, displayed, on_receipt);
    }

    /// Reconcile the receipt subscription against the displayed id
    /// set. Closes and reopens only when the set actually differs.
    pub fn reconcile(
        &mut self,
        client: &dyn RelayClient,
        displayed: &HashSet<NoteId>,
        on_receipt: EventHandler,
    ) {
        if !self.is_active() {
            return;
        }

        if *displayed == self.subscribed_ids {
            return;
        }

        close_sub(self.receipt_sub.take());
        self.open_receipt_sub(client, displayed, on_receipt);
    }

    /// Tear down both subscriptions. Closing is best-effort and a
    /// second concurrent stop is a no-op.
    pub fn stop(&mut self) {
        if self.stopping {
            return;
        }
        self.stopping = true;

        close_sub(self.request_sub.take());
        close_sub(self.receipt_sub.take());
        self.subscribed_ids.clear();

        self.stopping = false;
    }

    fn open_receipt_sub(
        &mut self,
        client: &dyn RelayClient,
        displayed: &HashSet<NoteId>,
        on_receipt: EventHandler,
    ) {
        self.subscribed_ids = displayed.clone();
        if displayed.is_empty() {
            return;
        }

        let filter = Filter::new()
            .kinds([RECEIPT_KIND])
            .event_refs(displayed.iter().copied());

        match client.subscribe(vec![filter], on_receipt, SubscriptionHooks::default()) {
            Ok(sub) => self.receipt_sub = Some(sub),
            Err(err) => tracing::debug!("receipt subscription failed: {err}"),
        }
    }
}

fn close_sub(sub: Option<Box<dyn Subscription>>) {
    if let Some(mut sub) = sub {
        // the transport may have closed it already
        if let Err(err) = sub.unsubscribe() {
            tracing::debug!("closing subscription failed: {err}");
        }
    }
}
