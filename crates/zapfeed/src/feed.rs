use std::collections::HashSet;
use std::sync::Arc;

use enrelay::{Filter, Note, NoteId, Pubkey, RelayClient, RECEIPT_KIND, REQUEST_KIND};

use crate::profiles::ProfileResolver;
use crate::receipt::Receipt;
use crate::request::Request;
use crate::Result;

/// The query layer may reject overly large author filters, so author
/// sets are split into sub-fetches of this size.
pub const AUTHOR_BATCH_SIZE: usize = 100;

/// What a page load is scoped to.
#[derive(Debug, Clone, Default)]
pub struct FeedScope {
    pub authors: Option<Vec<Pubkey>>,
    /// exclusive pagination cursor: only requests created strictly
    /// before this timestamp are returned
    pub until: Option<u64>,
}

/// Fetches pages of requests, resolves the identities they reference,
/// and correlates stored receipts onto them.
pub struct FeedLoader {
    client: Arc<dyn RelayClient>,
    profiles: ProfileResolver,
}

impl FeedLoader {
    pub fn new(client: Arc<dyn RelayClient>, profiles: ProfileResolver) -> Self {
        Self { client, profiles }
    }

    pub fn profiles(&self) -> &ProfileResolver {
        &self.profiles
    }

    /// Load one page of display-ready request records, newest first.
    ///
    /// Fetch failures degrade to partial data: a failed author chunk
    /// or receipt batch is logged and dropped, never fatal.
    pub async fn load_page(&self, scope: &FeedScope, limit: u64) -> Result<Vec<Request>> {
        let notes = self.fetch_request_notes(scope, limit).await;

        let mut seen: HashSet<NoteId> = HashSet::new();
        let mut requests: Vec<Request> = Vec::new();
        for note in &notes {
            if !seen.insert(note.id) {
                continue;
            }

            let Some(request) = Request::from_note(note) else {
                continue;
            };

            // replies belong to the single-item view, not the feed
            if request.reply_to.is_some() {
                continue;
            }

            requests.push(request);
        }

        requests.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        // resolve authors now, and restricted payers even before any
        // receipt exists, so restrictions can be displayed immediately
        let mut keys: Vec<Pubkey> = Vec::new();
        for request in &requests {
            keys.push(request.author);
            if let Some(payer) = request.restricted_payer {
                keys.push(payer);
            }
        }
        self.profiles.resolve(&keys).await;

        self.attach_receipts(&mut requests).await;

        Ok(requests)
    }

    /// Fetch stored receipts for the given requests, resolve the payer
    /// identities they reference in one batch, and merge them on in
    /// arrival order.
    pub async fn attach_receipts(&self, requests: &mut [Request]) {
        let ids: Vec<NoteId> = requests.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return;
        }

        let filter = Filter::new().kinds([RECEIPT_KIND]).event_refs(ids);
        let notes = match self.client.get_events(&[filter]).await {
            Ok(notes) => notes,
            Err(err) => {
                tracing::warn!("receipt fetch failed, rendering without receipts: {err}");
                return;
            }
        };

        // relays return stored events in no particular order; creation
        // order stands in for arrival order so the cap tie-break lands
        // on the earliest payment
        let mut notes = notes;
        notes.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut seen: HashSet<NoteId> = HashSet::new();
        let receipts: Vec<Receipt> = notes
            .iter()
            .filter_map(Receipt::decode)
            .filter(|r| seen.insert(r.id))
            .collect();

        let payers: Vec<Pubkey> = receipts.iter().map(|r| r.payer).collect();
        self.profiles.resolve(&payers).await;

        for receipt in receipts {
            if let Some(request) = requests.iter_mut().find(|r| r.id == receipt.request_id) {
                request.merge_receipt(receipt);
            }
        }
    }

    /// Fetch the reply events under a request, for the single-item
    /// view. Leveling is the caller's step (`assign_reply_levels`).
    pub async fn load_replies(&self, parent: NoteId) -> Result<Vec<Note>> {
        let filter = Filter::new().kinds([REQUEST_KIND]).event_refs([parent]);
        let notes = self.client.get_events(&[filter]).await?;

        let authors: Vec<Pubkey> = notes.iter().map(|n| n.pubkey).collect();
        self.profiles.resolve(&authors).await;

        Ok(notes)
    }

    async fn fetch_request_notes(&self, scope: &FeedScope, limit: u64) -> Vec<Note> {
        let base = || {
            let mut filter = Filter::new().kinds([REQUEST_KIND]).limit(limit);
            if let Some(until) = scope.until {
                filter = filter.until(until);
            }
            filter
        };

        let Some(authors) = &scope.authors else {
            return self.fetch_chunk(base()).await;
        };

        if authors.len() <= AUTHOR_BATCH_SIZE {
            return self
                .fetch_chunk(base().authors(authors.iter().copied()))
                .await;
        }

        let mut notes = Vec::new();
        for chunk in authors.chunks(AUTHOR_BATCH_SIZE) {
            notes.extend(self.fetch_chunk(base().authors(chunk.iter().copied())).await);
        }
        notes
    }

    async fn fetch_chunk(&self, filter: Filter) -> Vec<Note> {
        match self.client.get_events(&[filter]).await {
            Ok(notes) => notes,
            Err(err) => {
                tracing::warn!("request fetch failed, continuing with partial page: {err}");
                Vec::new()
            }
        }
    }
}

/// The loaded record set for one scope, with id-idempotent merge of
/// freshly-subscribed items.
#[derive(Default)]
pub struct Feed {
    requests: Vec<Request>,
    ids: HashSet<NoteId>,
}

impl Feed {
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn get(&self, id: &NoteId) -> Option<&Request> {
        self.requests.iter().find(|r| r.id == *id)
    }

    pub fn ids(&self) -> &HashSet<NoteId> {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Cursor for the next "load more" fetch.
    pub fn oldest_created_at(&self) -> Option<u64> {
        self.requests.iter().map(|r| r.created_at).min()
    }

    /// Live request subscriptions start strictly after this.
    pub fn newest_created_at(&self) -> Option<u64> {
        self.requests.iter().map(|r| r.created_at).max()
    }

    /// Append a loaded page, dropping any request already displayed.
    pub fn append_page(&mut self, page: Vec<Request>) {
        for request in page {
            if self.ids.insert(request.id) {
                self.requests.push(request);
            }
        }
    }

    /// Insert a freshly-subscribed request at the front (it is newer
    /// than everything displayed). No-op when the id is known.
    pub fn merge_live_request(&mut self, request: Request) -> bool {
        if !self.ids.insert(request.id) {
            return false;
        }

        self.requests.insert(0, request);
        true
    }

    /// Route a receipt to its request. No-op when the request is not
    /// displayed or the receipt id is already merged.
    pub fn merge_receipt(&mut self, receipt: Receipt) -> bool {
        let Some(request) = self
            .requests
            .iter_mut()
            .find(|r| r.id == receipt.request_id)
        else {
            return false;
        };

        request.merge_receipt(receipt)
    }

    pub fn clear_arrival_flags(&mut self) {
        for request in &mut self.requests {
            for receipt in &mut request.receipts {
                receipt.just_arrived = false;
            }
        }
    }

    pub fn clear(&mut self) {
        self.requests.clear();
        self.ids.clear();
    }
}
