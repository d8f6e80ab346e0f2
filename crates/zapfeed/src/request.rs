use enrelay::{Note, NoteId, ProfileState, Pubkey, REQUEST_KIND};

use crate::classify::classify;
use crate::receipt::Receipt;

/// A payment-request record assembled from a request event plus every
/// receipt that has been correlated to it so far.
///
/// Amount tags arrive as integer millisatoshi and are normalized to
/// whole satoshi (floored) here, at ingestion. Classification and
/// payability reason in the normalized unit.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: NoteId,
    pub author: Pubkey,
    pub created_at: u64,
    pub content: String,

    /// 0 = unbounded on that side
    pub min_sats: u64,
    pub max_sats: u64,
    pub usage_cap: Option<u64>,
    pub goal_sats: Option<u64>,
    pub restricted_payer: Option<Pubkey>,
    pub override_address: Option<String>,
    /// parent id when this request is a reply
    pub reply_to: Option<NoteId>,
    /// at least one amount tag was present on the wire
    pub has_amount_tag: bool,

    /// arrival order, oldest first; never reordered
    pub receipts: Vec<Receipt>,
}

struct RequestTags<'a> {
    min: Option<&'a str>,
    max: Option<&'a str>,
    usage_cap: Option<&'a str>,
    goal: Option<&'a str>,
    restricted_payer: Option<&'a str>,
    override_address: Option<&'a str>,
    reply_to: Option<&'a str>,
}

fn get_request_tags(note: &Note) -> RequestTags<'_> {
    let mut tags = RequestTags {
        min: None,
        max: None,
        usage_cap: None,
        goal: None,
        restricted_payer: None,
        override_address: None,
        reply_to: None,
    };

    for tag in &note.tags {
        if tag.len() < 2 {
            continue;
        }

        let value = tag[1].as_str();
        match tag[0].as_str() {
            "amount-min" => tags.min = Some(value),
            "amount-max" => tags.max = Some(value),
            "usage-cap" => tags.usage_cap = Some(value),
            "goal" => tags.goal = Some(value),
            "restricted-payer" => tags.restricted_payer = Some(value),
            "override-address" => tags.override_address = Some(value),
            "e" => tags.reply_to = Some(value),
            _ => {}
        }
    }

    tags
}

fn msats_tag_to_sats(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(0, |msats| msats / 1000)
}

impl Request {
    pub fn from_note(note: &Note) -> Option<Self> {
        if note.kind != REQUEST_KIND {
            return None;
        }

        let tags = get_request_tags(note);

        Some(Request {
            id: note.id,
            author: note.pubkey,
            created_at: note.created_at,
            content: note.content.clone(),
            min_sats: msats_tag_to_sats(tags.min),
            max_sats: msats_tag_to_sats(tags.max),
            usage_cap: tags.usage_cap.and_then(|v| v.parse().ok()),
            goal_sats: tags
                .goal
                .and_then(|v| v.parse::<u64>().ok())
                .map(|msats| msats / 1000),
            restricted_payer: tags.restricted_payer.and_then(|v| Pubkey::parse(v).ok()),
            override_address: tags.override_address.map(str::to_string),
            reply_to: tags.reply_to.and_then(|v| NoteId::from_hex(v).ok()),
            has_amount_tag: tags.min.is_some() || tags.max.is_some(),
            receipts: Vec::new(),
        })
    }

    /// Raw ledger total: sums every receipt regardless of
    /// classification.
    pub fn total_received(&self) -> u64 {
        self.receipts.iter().map(|r| r.amount_sats).sum()
    }

    /// Receipts counted toward the usage cap. Never exceeds the cap.
    pub fn used_count(&self) -> u64 {
        classify(self).used_count
    }

    /// Payable iff a receiving address resolves (override tag or the
    /// author's profile), at least one amount tag was present, and the
    /// usage cap, if declared, is not exhausted. A request with no
    /// amount tags is never payable, address or not.
    pub fn is_payable(&self, author_profile: Option<&ProfileState>) -> bool {
        if !self.has_amount_tag {
            return false;
        }

        let addressable = self.override_address.is_some()
            || author_profile.is_some_and(|p| p.has_payment_address());
        if !addressable {
            return false;
        }

        match self.usage_cap {
            Some(cap) => self.used_count() < cap,
            None => true,
        }
    }

    /// Append a receipt, keeping arrival order. Merging an id that is
    /// already present is a no-op; returns whether anything changed.
    pub fn merge_receipt(&mut self, receipt: Receipt) -> bool {
        if receipt.request_id != self.id {
            return false;
        }

        if self.receipts.iter().any(|r| r.id == receipt.id) {
            return false;
        }

        self.receipts.push(receipt);
        true
    }
}
