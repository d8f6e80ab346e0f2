use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use enrelay::{EventHandler, Note, NoteId, ProfileState, Pubkey, RelayClient};

use crate::batch::ReceiptBatcher;
use crate::feed::{Feed, FeedLoader, FeedScope};
use crate::profiles::{ProfileCache, ProfileResolver};
use crate::receipt::Receipt;
use crate::request::Request;
use crate::subs::LiveSubs;
use crate::Result;

enum LiveEvent {
    Request(Note),
    Receipt(Note),
}

/// One feed scope, owned end to end: the relay handle, the shared
/// profile cache, the loaded records, the live subscriptions, and the
/// receipt batcher.
///
/// Subscription callbacks only push raw events into a channel; all
/// state mutation happens in `process`, on the caller's thread. The
/// caller drives the session: `load_page`/`load_more` on navigation,
/// `process(Instant::now())` on its tick.
pub struct FeedSession {
    client: Arc<dyn RelayClient>,
    loader: FeedLoader,
    feed: Feed,
    live: LiveSubs,
    batcher: ReceiptBatcher,
    scope_authors: Option<Vec<Pubkey>>,
    /// reply ids shown in a single-item view, part of the receipt
    /// subscription scope alongside the feed's own ids
    extra_ids: HashSet<NoteId>,
    tx: Sender<LiveEvent>,
    rx: Receiver<LiveEvent>,
}

impl FeedSession {
    pub fn new(client: Arc<dyn RelayClient>) -> Self {
        let cache = Arc::new(ProfileCache::default());
        let profiles = ProfileResolver::new(client.clone(), cache);
        let loader = FeedLoader::new(client.clone(), profiles);
        let (tx, rx) = unbounded();

        Self {
            client,
            loader,
            feed: Feed::default(),
            live: LiveSubs::default(),
            batcher: ReceiptBatcher::default(),
            scope_authors: None,
            extra_ids: HashSet::new(),
            tx,
            rx,
        }
    }

    /// Restrict the feed to an author set (e.g. a follow list).
    pub fn with_authors(mut self, authors: Vec<Pubkey>) -> Self {
        self.scope_authors = Some(authors);
        self
    }

    pub fn requests(&self) -> &[Request] {
        self.feed.requests()
    }

    pub fn request(&self, id: &NoteId) -> Option<&Request> {
        self.feed.get(id)
    }

    pub fn profile(&self, key: &Pubkey) -> Option<ProfileState> {
        self.loader.profiles().cache().get(key)
    }

    /// Load the first page, replacing whatever was displayed, and go
    /// live if the page was not empty. On a reload the previous
    /// subscriptions are torn down first; their id scope and request
    /// fence belong to the superseded page.
    pub async fn load_page(&mut self, limit: u64) -> Result<()> {
        let scope = FeedScope {
            authors: self.scope_authors.clone(),
            until: None,
        };
        let page = self.loader.load_page(&scope, limit).await?;

        self.feed.clear();
        self.feed.append_page(page);
        if self.live.is_active() {
            self.live.stop();
        }
        self.start_live();
        Ok(())
    }

    /// Fetch the next page below the oldest displayed request.
    pub async fn load_more(&mut self, limit: u64) -> Result<()> {
        let Some(until) = self.feed.oldest_created_at() else {
            return Ok(());
        };

        let scope = FeedScope {
            authors: self.scope_authors.clone(),
            until: Some(until),
        };
        let page = self.loader.load_page(&scope, limit).await?;

        self.feed.append_page(page);
        self.reconcile_subs();
        Ok(())
    }

    /// Include reply ids in the receipt-subscription scope (single-item
    /// view). Resubscribes only if the id set actually changed.
    pub fn track_replies(&mut self, ids: impl IntoIterator<Item = NoteId>) {
        self.extra_ids.extend(ids);
        self.reconcile_subs();
    }

    /// Drain live events gathered since the last call: merge new
    /// requests, batch new receipts, and flush the batcher on its
    /// size/timer triggers.
    pub async fn process(&mut self, now: Instant) {
        let mut merged_request = false;
        let mut new_keys: Vec<Pubkey> = Vec::new();
        let mut flushes: Vec<Vec<Note>> = Vec::new();

        while let Ok(event) = self.rx.try_recv() {
            match event {
                LiveEvent::Request(note) => {
                    let Some(request) = Request::from_note(&note) else {
                        continue;
                    };

                    if request.reply_to.is_some() {
                        continue;
                    }

                    new_keys.push(request.author);
                    if let Some(payer) = request.restricted_payer {
                        new_keys.push(payer);
                    }

                    if self.feed.merge_live_request(request) {
                        merged_request = true;
                    }
                }
                LiveEvent::Receipt(note) => {
                    if let Some(batch) = self.batcher.enqueue(note, now) {
                        flushes.push(batch);
                    }
                }
            }
        }

        if let Some(batch) = self.batcher.poll(now) {
            flushes.push(batch);
        }

        if !new_keys.is_empty() {
            self.loader.profiles().resolve(&new_keys).await;
        }

        for batch in flushes {
            self.flush_receipts(batch).await;
        }

        if merged_request {
            self.reconcile_subs();
        }
    }

    /// When the pending receipt batch will flush on its own, for
    /// callers scheduling their next `process` tick.
    pub fn next_flush_deadline(&self) -> Option<Instant> {
        self.batcher.next_deadline()
    }

    pub fn reconcile_subs(&mut self) {
        let displayed = self.displayed_ids();
        let on_receipt = self.receipt_handler();
        self.live
            .reconcile(self.client.as_ref(), &displayed, on_receipt);
    }

    /// Clear the one-shot emphasis bit on every displayed receipt.
    pub fn clear_arrival_flags(&mut self) {
        self.feed.clear_arrival_flags();
    }

    pub async fn publish(&self, note: Note) -> Result<()> {
        self.client.publish(note).await.map_err(Into::into)
    }

    /// Tear down the live subscriptions, keeping the loaded records.
    pub fn stop(&mut self) {
        self.live.stop();
    }

    /// Scope teardown: subscriptions closed, records and pending
    /// batches dropped. The profile cache survives, it is process-wide.
    pub fn clear(&mut self) {
        self.stop();
        self.feed.clear();
        self.batcher.clear();
        self.extra_ids.clear();
    }

    fn start_live(&mut self) {
        if self.feed.is_empty() || self.live.is_active() {
            return;
        }

        let newest = self.feed.newest_created_at().unwrap_or(0);
        let displayed = self.displayed_ids();
        let on_request = self.request_handler();
        let on_receipt = self.receipt_handler();

        self.live.start(
            self.client.as_ref(),
            self.scope_authors.as_deref(),
            newest,
            &displayed,
            on_request,
            on_receipt,
        );
    }

    fn displayed_ids(&self) -> HashSet<NoteId> {
        let mut ids = self.feed.ids().clone();
        ids.extend(self.extra_ids.iter().copied());
        ids
    }

    fn request_handler(&self) -> EventHandler {
        let tx = self.tx.clone();
        Box::new(move |note| {
            let _ = tx.send(LiveEvent::Request(note));
        })
    }

    fn receipt_handler(&self) -> EventHandler {
        let tx = self.tx.clone();
        Box::new(move |note| {
            let _ = tx.send(LiveEvent::Receipt(note));
        })
    }

    async fn flush_receipts(&mut self, batch: Vec<Note>) {
        let receipts: Vec<Receipt> = batch.iter().filter_map(Receipt::decode).collect();

        let payers: Vec<Pubkey> = receipts.iter().map(|r| r.payer).collect();
        if !payers.is_empty() {
            self.loader.profiles().resolve(&payers).await;
        }

        for mut receipt in receipts {
            receipt.just_arrived = true;
            self.feed.merge_receipt(receipt);
        }
    }
}
