//! Shared fixtures: deterministic ids, wire-note builders, and a
//! scripted in-memory relay implementing the client seam.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use enrelay::{
    EventHandler, Filter, Note, NoteId, Pubkey, RelayClient, Subscription, SubscriptionHooks,
    PROFILE_KIND, RECEIPT_KIND, REQUEST_KIND,
};

use crate::receipt::Receipt;

/// Opt into log output for a test run (`RUST_LOG=debug cargo test`).
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A real 330n (33 sat) invoice, lifted from a live receipt.
pub(crate) const BOLT11_33_SATS: &str = "lnbc330n1pn7dlrrpp566sfk69zda849huwjw6wepw3uzxxp4mp9np54qx49ruw8cuv86ushp52te27l4jadsz0u76jvgsk5uekl04tujpjkt9cc7duu0jfzp9zdtscqzzsxqyz5vqsp5m3tzc7ryp5f9fv90v27uyrrd4qfmj5lrwv9rvmvum3v50kdph23s9qxpqysgqut2ssf0m7nmtd73cwqk7qfw4sw6zlj598sjdxmdsepmvn0ptamnhf45c425h26juzcfupegltefwsf8qav2ldell7v9fpc0y23nl0kgqtf432g";

pub(crate) struct TestIds;

impl TestIds {
    pub fn new() -> Self {
        TestIds
    }

    pub fn note(&self, n: u8) -> NoteId {
        NoteId::new([n; 32])
    }

    pub fn pubkey(&self, n: u8) -> Pubkey {
        Pubkey::new([n; 32])
    }
}

pub(crate) fn request_note(
    ids: &TestIds,
    id: u8,
    created_at: u64,
    tags: &[(&str, &str)],
) -> Note {
    request_note_by(ids, id, 1, created_at, tags)
}

pub(crate) fn request_note_by(
    ids: &TestIds,
    id: u8,
    author: u8,
    created_at: u64,
    tags: &[(&str, &str)],
) -> Note {
    Note {
        id: ids.note(id),
        pubkey: ids.pubkey(author),
        created_at,
        kind: REQUEST_KIND,
        tags: tags
            .iter()
            .map(|(k, v)| vec![k.to_string(), v.to_string()])
            .collect(),
        content: format!("request {id}"),
        sig: String::new(),
    }
}

pub(crate) fn receipt_note(
    ids: &TestIds,
    id: u8,
    request: u8,
    bolt11: &str,
    description: Option<&str>,
) -> Note {
    let mut tags = vec![
        vec!["bolt11".to_string(), bolt11.to_string()],
        vec!["e".to_string(), ids.note(request).hex()],
    ];
    if let Some(description) = description {
        tags.push(vec!["description".to_string(), description.to_string()]);
    }

    Note {
        id: ids.note(id),
        pubkey: ids.pubkey(2),
        created_at: 1000 + id as u64,
        kind: RECEIPT_KIND,
        tags,
        content: String::new(),
        sig: String::new(),
    }
}

pub(crate) fn profile_note(ids: &TestIds, id: u8, author: u8, created_at: u64, content: &str) -> Note {
    Note {
        id: ids.note(id),
        pubkey: ids.pubkey(author),
        created_at,
        kind: PROFILE_KIND,
        tags: vec![],
        content: content.to_string(),
        sig: String::new(),
    }
}

/// An already-decoded receipt, bypassing the bolt11 path.
pub(crate) fn test_receipt(ids: &TestIds, id: u8, request: u8, sats: u64, payer: u8) -> Receipt {
    Receipt {
        id: ids.note(id),
        request_id: ids.note(request),
        amount_sats: sats,
        payer: ids.pubkey(payer),
        comment: None,
        anonymous: false,
        just_arrived: false,
    }
}

type FailPredicate = Box<dyn Fn(&[Filter]) -> bool + Send + Sync>;

struct LiveSub {
    id: u64,
    filters: Vec<Filter>,
    on_event: EventHandler,
    open: bool,
}

#[derive(Default)]
struct RelayInner {
    stored: Mutex<Vec<Note>>,
    queries: Mutex<Vec<Vec<Filter>>>,
    fail_when: Mutex<Option<FailPredicate>>,
    subs: Mutex<Vec<LiveSub>>,
    published: Mutex<Vec<Note>>,
    next_sub: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// In-memory relay: answers queries from seeded notes, pushes
/// `push_live` notes to matching open subscriptions, and records every
/// query and subscription transition for assertions.
#[derive(Clone, Default)]
pub(crate) struct MemoryRelay {
    inner: Arc<RelayInner>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        MemoryRelay::default()
    }

    pub fn seed(&self, notes: impl IntoIterator<Item = Note>) {
        self.inner.stored.lock().unwrap().extend(notes);
    }

    pub fn push_live(&self, note: &Note) {
        let subs = self.inner.subs.lock().unwrap();
        for sub in subs.iter() {
            if sub.open && sub.filters.iter().any(|f| f.matches(note)) {
                (sub.on_event)(note.clone());
            }
        }
    }

    pub fn fail_queries(&self, pred: FailPredicate) {
        *self.inner.fail_when.lock().unwrap() = Some(pred);
    }

    pub fn queries(&self) -> Vec<Vec<Filter>> {
        self.inner.queries.lock().unwrap().clone()
    }

    pub fn query_count_for_kind(&self, kind: u64) -> usize {
        self.queries()
            .iter()
            .filter(|filters| {
                filters
                    .iter()
                    .any(|f| f.kinds.as_ref().is_some_and(|ks| ks.contains(&kind)))
            })
            .count()
    }

    pub fn opened(&self) -> u64 {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u64 {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Note> {
        self.inner.published.lock().unwrap().clone()
    }

    /// Filters of subscriptions that are still open.
    pub fn open_sub_filters(&self) -> Vec<Vec<Filter>> {
        self.inner
            .subs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.open)
            .map(|s| s.filters.clone())
            .collect()
    }
}

struct MemorySub {
    inner: Arc<RelayInner>,
    id: u64,
}

impl Subscription for MemorySub {
    fn unsubscribe(&mut self) -> enrelay::Result<()> {
        let mut subs = self.inner.subs.lock().unwrap();
        let Some(sub) = subs.iter_mut().find(|s| s.id == self.id) else {
            return Err(enrelay::Error::SubscriptionClosed);
        };

        if !sub.open {
            return Err(enrelay::Error::SubscriptionClosed);
        }

        sub.open = false;
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RelayClient for MemoryRelay {
    async fn get_events(&self, filters: &[Filter]) -> enrelay::Result<Vec<Note>> {
        // mirror a network suspension point so concurrent callers interleave
        tokio::task::yield_now().await;

        self.inner.queries.lock().unwrap().push(filters.to_vec());

        if let Some(pred) = self.inner.fail_when.lock().unwrap().as_ref() {
            if pred(filters) {
                return Err(enrelay::Error::Relay("scripted failure".to_string()));
            }
        }

        let stored = self.inner.stored.lock().unwrap();
        let mut out: Vec<Note> = Vec::new();
        let mut seen: HashSet<NoteId> = HashSet::new();

        for filter in filters {
            let mut matched: Vec<&Note> = stored.iter().filter(|n| filter.matches(n)).collect();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            if let Some(limit) = filter.limit {
                matched.truncate(limit as usize);
            }
            for note in matched {
                if seen.insert(note.id) {
                    out.push(note.clone());
                }
            }
        }

        Ok(out)
    }

    fn subscribe(
        &self,
        filters: Vec<Filter>,
        on_event: EventHandler,
        _hooks: SubscriptionHooks,
    ) -> enrelay::Result<Box<dyn Subscription>> {
        let id = self.inner.next_sub.fetch_add(1, Ordering::SeqCst);
        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        self.inner.subs.lock().unwrap().push(LiveSub {
            id,
            filters,
            on_event,
            open: true,
        });

        Ok(Box::new(MemorySub {
            inner: self.inner.clone(),
            id,
        }))
    }

    async fn publish(&self, note: Note) -> enrelay::Result<()> {
        self.inner.published.lock().unwrap().push(note);
        Ok(())
    }
}
