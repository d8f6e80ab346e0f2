use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use enrelay::{Filter, Note, ProfileState, Pubkey, RelayClient, PROFILE_KIND};
use hashbrown::HashMap;

/// Process-wide profile cache. No TTL here; invalidation is the
/// caller's concern. The in-flight set prevents duplicate concurrent
/// fetches for the same identity.
///
/// Both maps are the only cross-call shared mutable state in the
/// engine. Locks are never held across an await.
#[derive(Default)]
pub struct ProfileCache {
    profiles: Mutex<HashMap<Pubkey, ProfileState>>,
    in_flight: Mutex<HashSet<Pubkey>>,
}

impl ProfileCache {
    pub fn get(&self, key: &Pubkey) -> Option<ProfileState> {
        self.profiles.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &Pubkey) -> bool {
        self.profiles.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batched, coalescing profile lookup against the relay seam.
#[derive(Clone)]
pub struct ProfileResolver {
    client: Arc<dyn RelayClient>,
    cache: Arc<ProfileCache>,
}

impl ProfileResolver {
    pub fn new(client: Arc<dyn RelayClient>, cache: Arc<ProfileCache>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<ProfileCache> {
        &self.cache
    }

    /// Resolve `keys` to profiles. Cached keys come straight from the
    /// cache; keys another call is already fetching are skipped; the
    /// rest go out in one batched fetch. A failed fetch leaves its
    /// keys absent and retryable instead of poisoning the cache.
    pub async fn resolve(&self, keys: &[Pubkey]) -> HashMap<Pubkey, ProfileState> {
        let mut resolved = HashMap::new();
        let mut to_fetch: Vec<Pubkey> = Vec::new();

        {
            let profiles = self.cache.profiles.lock().unwrap();
            let mut in_flight = self.cache.in_flight.lock().unwrap();

            for key in keys {
                if resolved.contains_key(key) || to_fetch.contains(key) {
                    continue;
                }

                if let Some(profile) = profiles.get(key) {
                    resolved.insert(*key, profile.clone());
                } else if in_flight.insert(*key) {
                    to_fetch.push(*key);
                }
                // else: someone is already fetching it, skip
            }
        }

        if to_fetch.is_empty() {
            return resolved;
        }

        let filter = Filter::new()
            .kinds([PROFILE_KIND])
            .authors(to_fetch.iter().copied());

        let fetched = self.client.get_events(&[filter]).await;

        {
            let mut in_flight = self.cache.in_flight.lock().unwrap();
            for key in &to_fetch {
                in_flight.remove(key);
            }
        }

        match fetched {
            Ok(notes) => {
                let mut profiles = self.cache.profiles.lock().unwrap();
                for (key, note) in newest_per_author(&notes) {
                    let state = ProfileState::from_note_contents(&note.content);
                    profiles.insert(key, state.clone());
                    resolved.insert(key, state);
                }
            }
            Err(err) => {
                tracing::warn!("profile batch fetch failed: {err}");
            }
        }

        resolved
    }
}

/// When a relay hands back several profile events per author, the
/// newest wins.
fn newest_per_author(notes: &[Note]) -> HashMap<Pubkey, &Note> {
    let mut latest: HashMap<Pubkey, &Note> = HashMap::new();

    for note in notes {
        if note.kind != PROFILE_KIND {
            continue;
        }

        match latest.get(&note.pubkey) {
            Some(existing) if existing.created_at >= note.created_at => {}
            _ => {
                latest.insert(note.pubkey, note);
            }
        }
    }

    latest
}
