use crate::{Note, NoteId, Pubkey};

/// A relay query filter. Builder-style, one filter per clause; a query
/// takes a slice of filters which the relay ORs together.
///
/// `since`/`until` are exclusive bounds on `created_at`. The feed
/// loader relies on `until` being exclusive for its pagination cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub kinds: Option<Vec<u64>>,
    pub authors: Option<Vec<Pubkey>>,
    pub ids: Option<Vec<NoteId>>,
    /// `#e` tag references
    pub event_refs: Option<Vec<NoteId>>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub limit: Option<u64>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u64>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn authors(mut self, authors: impl IntoIterator<Item = Pubkey>) -> Self {
        self.authors = Some(authors.into_iter().collect());
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = NoteId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn event_refs(mut self, refs: impl IntoIterator<Item = NoteId>) -> Self {
        self.event_refs = Some(refs.into_iter().collect());
        self
    }

    pub fn since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `note` satisfies every clause of this filter. Used by
    /// in-memory relay implementations; real relays match server-side.
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&note.kind) {
                return false;
            }
        }

        if let Some(authors) = &self.authors {
            if !authors.contains(&note.pubkey) {
                return false;
            }
        }

        if let Some(ids) = &self.ids {
            if !ids.contains(&note.id) {
                return false;
            }
        }

        if let Some(refs) = &self.event_refs {
            let referenced = note
                .tags
                .iter()
                .filter(|tag| tag.len() >= 2 && tag[0] == "e")
                .filter_map(|tag| NoteId::from_hex(&tag[1]).ok());

            let mut any = false;
            for id in referenced {
                if refs.contains(&id) {
                    any = true;
                    break;
                }
            }
            if !any {
                return false;
            }
        }

        if let Some(since) = self.since {
            if note.created_at <= since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if note.created_at >= until {
                return false;
            }
        }

        true
    }
}
