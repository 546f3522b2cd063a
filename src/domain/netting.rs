use super::{EntryId, LedgerEntry, Paise};

/// One amount reduction in a netting plan. `new_amount` is always strictly
/// positive: a fully consumed entry goes to the delete list instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountUpdate {
    pub id: EntryId,
    pub new_amount: Paise,
}

/// Settlement plan computed for a new or edited entry against the
/// counterparty's opposite-direction entries. Pure data; applying it is the
/// reconciliation service's job.
#[derive(Debug, Clone, Default)]
pub struct NettingPlan {
    pub to_delete: Vec<EntryId>,
    pub to_update: Vec<AmountUpdate>,
    /// Portion of the new amount left after consuming opposite entries.
    /// Persisted as a new (or shrunk) entry when greater than zero.
    pub remainder: Paise,
}

impl NettingPlan {
    /// True when no opposite entry was touched.
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_update.is_empty()
    }
}

/// Compute a FIFO netting plan. `opposite_entries` must already be scoped to
/// the same business and counterparty, restricted to the direction opposite
/// the new entry, and sorted oldest first (ascending sequence).
///
/// Oldest entries are consumed first: an opposite entry is deleted when the
/// remaining amount covers it entirely, otherwise it is shrunk by the
/// remaining amount and consumption stops.
pub fn plan_netting(new_amount: Paise, opposite_entries: &[LedgerEntry]) -> NettingPlan {
    assert!(new_amount > 0, "Netting amount must be positive");

    let mut plan = NettingPlan::default();
    let mut remaining = new_amount;

    for entry in opposite_entries {
        if remaining == 0 {
            break;
        }
        debug_assert!(entry.amount_paise > 0, "Persisted entry with amount <= 0");

        if remaining >= entry.amount_paise {
            plan.to_delete.push(entry.id);
            remaining -= entry.amount_paise;
        } else {
            let residue = entry.amount_paise - remaining;
            // remaining < entry.amount_paise here, so the residue is always
            // strictly positive. Anything else is an engine bug.
            assert!(residue > 0, "Netting update would produce amount <= 0");
            plan.to_update.push(AmountUpdate {
                id: entry.id,
                new_amount: residue,
            });
            remaining = 0;
        }
    }

    plan.remainder = remaining;
    plan
}

/// One exact-amount match in a manual netting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub out_id: EntryId,
    pub in_id: EntryId,
    pub amount: Paise,
}

/// Plan for the manual net-all pass: matched pairs only, no partial amounts.
#[derive(Debug, Clone, Default)]
pub struct PairingPlan {
    pub pairs: Vec<MatchedPair>,
}

impl PairingPlan {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Ids of every entry consumed by the plan (both sides of each pair).
    pub fn deleted_ids(&self) -> Vec<EntryId> {
        self.pairs
            .iter()
            .flat_map(|p| [p.out_id, p.in_id])
            .collect()
    }
}

/// Compute the manual netting plan for one counterparty. Both lists must be
/// sorted oldest first. Each "out" entry is matched with the first not yet
/// matched "in" entry of exactly equal amount; entries without an exact
/// opposite match are left untouched. Partial matching is deliberately not
/// performed here, unlike the create/update path.
pub fn plan_exact_pairs(out_entries: &[LedgerEntry], in_entries: &[LedgerEntry]) -> PairingPlan {
    let mut matched = vec![false; in_entries.len()];
    let mut plan = PairingPlan::default();

    for out_entry in out_entries {
        let candidate = in_entries
            .iter()
            .enumerate()
            .find(|(i, e)| !matched[*i] && e.amount_paise == out_entry.amount_paise);

        if let Some((i, in_entry)) = candidate {
            matched[i] = true;
            plan.pairs.push(MatchedPair {
                out_id: out_entry.id,
                in_id: in_entry.id,
                amount: out_entry.amount_paise,
            });
        }
    }

    plan
}
