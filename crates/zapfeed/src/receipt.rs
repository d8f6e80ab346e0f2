use enrelay::{Note, NoteId, Pubkey, PAYER_PAYLOAD_KIND, RECEIPT_KIND};
use lightning_invoice::Bolt11Invoice;

/// A decoded payment receipt, correlated to its request by the `e`
/// back-reference tag.
///
/// `payer` is who actually paid, resolved from the embedded payer
/// payload in the `description` tag. When that payload is missing,
/// unparsable, or not a payer-payload event, the receipt's own author
/// stands in and the receipt is marked anonymous; the two identities
/// must not be conflated.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub id: NoteId,
    pub request_id: NoteId,
    pub amount_sats: u64,
    pub payer: Pubkey,
    pub comment: Option<String>,
    pub anonymous: bool,
    /// Set on live-merged receipts so the caller can render a one-shot
    /// emphasis; cleared by `FeedSession::clear_arrival_flags`. Not
    /// semantically meaningful.
    pub just_arrived: bool,
}

impl Receipt {
    /// Decode a receipt event. Returns `None` only when the event is
    /// not a receipt or carries no request back-reference (nothing to
    /// correlate it to); malformed amounts and payer payloads degrade
    /// to defaults instead of failing.
    pub fn decode(note: &Note) -> Option<Self> {
        if note.kind != RECEIPT_KIND {
            return None;
        }

        let request_id = note.referenced_event()?;
        let amount_sats = decode_amount(note);
        let (payer, comment, anonymous) = decode_payer(note);

        Some(Receipt {
            id: note.id,
            request_id,
            amount_sats,
            payer,
            comment,
            anonymous,
            just_arrived: false,
        })
    }
}

fn decode_amount(note: &Note) -> u64 {
    let Some(raw) = note.tag_value("bolt11") else {
        return 0;
    };

    let Ok(invoice) = raw.parse::<Bolt11Invoice>() else {
        tracing::debug!(receipt = %note.id.hex(), "undecodable bolt11, treating as zero");
        return 0;
    };

    invoice.amount_milli_satoshis().map_or(0, |msats| msats / 1000)
}

fn decode_payer(note: &Note) -> (Pubkey, Option<String>, bool) {
    let Some(description) = note.tag_value("description") else {
        return (note.pubkey, None, true);
    };

    let Ok(payload) = Note::from_json(description) else {
        return (note.pubkey, None, true);
    };

    // an embedded event of any other kind is not a payer payload
    if payload.kind != PAYER_PAYLOAD_KIND {
        return (note.pubkey, None, true);
    }

    let comment = if payload.content.is_empty() {
        None
    } else {
        Some(payload.content)
    };

    (payload.pubkey, comment, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{receipt_note, TestIds, BOLT11_33_SATS};

    #[test]
    fn decodes_amount_and_payer() {
        let ids = TestIds::new();
        let payload = format!(
            r#"{{"id":"{}","pubkey":"{}","created_at":1,"kind":9734,"tags":[],"content":"great work","sig":""}}"#,
            ids.note(40).hex(),
            ids.pubkey(3).hex()
        );
        let note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, Some(&payload));

        let receipt = Receipt::decode(&note).unwrap();
        assert_eq!(receipt.amount_sats, 33);
        assert_eq!(receipt.payer, ids.pubkey(3));
        assert_eq!(receipt.comment.as_deref(), Some("great work"));
        assert!(!receipt.anonymous);
        assert_eq!(receipt.request_id, ids.note(10));
    }

    #[test]
    fn anonymous_fallback_on_missing_description() {
        let ids = TestIds::new();
        let note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, None);

        let receipt = Receipt::decode(&note).unwrap();
        assert!(receipt.anonymous);
        assert_eq!(receipt.payer, note.pubkey);
        assert_eq!(receipt.comment, None);
    }

    #[test]
    fn anonymous_fallback_on_garbage_description() {
        let ids = TestIds::new();
        let note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, Some("{not json"));

        let receipt = Receipt::decode(&note).unwrap();
        assert!(receipt.anonymous);
        assert_eq!(receipt.payer, note.pubkey);
    }

    #[test]
    fn anonymous_fallback_on_wrong_payload_kind() {
        let ids = TestIds::new();
        let payload = format!(
            r#"{{"id":"{}","pubkey":"{}","created_at":1,"kind":1,"tags":[],"content":"hi","sig":""}}"#,
            ids.note(40).hex(),
            ids.pubkey(3).hex()
        );
        let note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, Some(&payload));

        let receipt = Receipt::decode(&note).unwrap();
        assert!(receipt.anonymous);
        assert_eq!(receipt.payer, note.pubkey);
        assert_eq!(receipt.comment, None);
    }

    #[test]
    fn bad_bolt11_degrades_to_zero() {
        let ids = TestIds::new();
        let note = receipt_note(&ids, 1, 10, "lnbcnotaninvoice", None);

        let receipt = Receipt::decode(&note).unwrap();
        assert_eq!(receipt.amount_sats, 0);
    }

    #[test]
    fn no_back_reference_means_no_receipt() {
        let ids = TestIds::new();
        let mut note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, None);
        note.tags.retain(|t| t[0] != "e");

        assert!(Receipt::decode(&note).is_none());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let ids = TestIds::new();
        let mut note = receipt_note(&ids, 1, 10, BOLT11_33_SATS, None);
        note.kind = 1;

        assert!(Receipt::decode(&note).is_none());
    }
}
