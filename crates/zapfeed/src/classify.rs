use crate::receipt::Receipt;
use crate::request::Request;

/// Partition of a request's receipts against its payment constraints.
#[derive(Debug, Default)]
pub struct Classified<'a> {
    /// within restriction and inside the cap, arrival order
    pub counted: Vec<&'a Receipt>,
    /// out of restriction, or within restriction but past the cap
    pub excess: Vec<&'a Receipt>,
    pub used_count: u64,
}

/// A receipt is within restriction iff its amount falls in the
/// request's `[min, max]` range (0 meaning unbounded on that side) and
/// it matches the restricted payer when one is declared.
pub fn within_restriction(request: &Request, receipt: &Receipt) -> bool {
    if request.min_sats != 0 && receipt.amount_sats < request.min_sats {
        return false;
    }

    if request.max_sats != 0 && receipt.amount_sats > request.max_sats {
        return false;
    }

    if let Some(payer) = &request.restricted_payer {
        if receipt.payer != *payer {
            return false;
        }
    }

    true
}

/// Classify the request's receipts. When a usage cap is declared, the
/// first `cap` within-restriction receipts in arrival order take the
/// counted slots; everything else is excess. The first-arrived
/// tie-break decides which payer gets promoted display, so it must not
/// change.
pub fn classify(request: &Request) -> Classified<'_> {
    let mut classified = Classified::default();

    for receipt in &request.receipts {
        let in_restriction = within_restriction(request, receipt);

        let counted = match request.usage_cap {
            Some(cap) => in_restriction && (classified.counted.len() as u64) < cap,
            None => in_restriction,
        };

        if counted {
            classified.counted.push(receipt);
        } else {
            classified.excess.push(receipt);
        }
    }

    classified.used_count = classified.counted.len() as u64;
    classified
}
