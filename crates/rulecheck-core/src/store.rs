//! Ordered rule collection and its lifecycle mutations.
//!
//! The store is plain data: no I/O, no locking. Callers that share it between
//! concurrent evaluations wrap it in a single lock so each mutation below is
//! one indivisible update to the collection.

use tracing::debug;

use crate::{LifecycleState, Outcome, Rule, RuleError, RuleId, Verdict};

/// Proof that a rule entered `Evaluating`, used to settle that evaluation.
///
/// A ticket goes stale when the same rule is evaluated again before the
/// ticket is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationTicket {
    pub rule_id: RuleId,
    generation: u64,
}

/// What happened to a verdict handed to [`RuleStore::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Attached to the rule.
    Applied,
    /// A newer evaluation of the same rule is pending or already landed.
    Superseded,
    /// The rule was removed while the evaluation was in flight.
    Removed,
}

/// Ordered sequence of rules. Insertion order is the display and evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new `Idle` rule. The title must be non-empty after trimming.
    pub fn add(&mut self, title: &str, definition: &str) -> Result<RuleId, RuleError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(RuleError::validation("rule title must not be empty"));
        }
        let rule = Rule::new(title.to_string(), definition.to_string());
        let id = rule.id;
        self.rules.push(rule);
        debug!(rule_id = %id, position = self.rules.len() - 1, "rule added");
        Ok(id)
    }

    /// Remove a rule. Returns whether anything was removed; absent ids are a no-op.
    pub fn remove(&mut self, id: RuleId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.rules.remove(pos);
        debug!(rule_id = %id, position = pos, "rule removed");
        true
    }

    /// Move the rule at `from` to `to`, shifting the rules in between.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), RuleError> {
        let len = self.rules.len();
        for index in [from, to] {
            if index >= len {
                return Err(RuleError::Index { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let rule = self.rules.remove(from);
        self.rules.insert(to, rule);
        debug!(from, to, "rule reordered");
        Ok(())
    }

    /// Mark a rule `Evaluating` and issue the ticket that may settle it.
    ///
    /// Any previous verdict stays attached until a new one replaces it.
    pub fn set_evaluating(&mut self, id: RuleId) -> Result<EvaluationTicket, RuleError> {
        let rule = self.get_mut(id).ok_or(RuleError::NotFound(id))?;
        rule.generation += 1;
        rule.state = LifecycleState::Evaluating;
        Ok(EvaluationTicket {
            rule_id: id,
            generation: rule.generation,
        })
    }

    /// Settle the evaluation a ticket was issued for.
    ///
    /// Only the most recent ticket for a rule is honoured, so a rule's final
    /// state always reflects its latest evaluation request regardless of the
    /// order completions arrive in.
    pub fn settle(&mut self, ticket: EvaluationTicket, verdict: Verdict) -> Settlement {
        let Some(rule) = self.get_mut(ticket.rule_id) else {
            return Settlement::Removed;
        };
        if rule.generation != ticket.generation {
            return Settlement::Superseded;
        }
        rule.attach(verdict);
        Settlement::Applied
    }

    /// Attach a verdict unconditionally. `Unknown` settles the rule as `Errored`.
    ///
    /// A result for a removed rule is dropped; it never resurrects the rule.
    pub fn apply_result(&mut self, id: RuleId, outcome: Outcome, justification: &str) -> bool {
        match self.get_mut(id) {
            Some(rule) => {
                rule.attach(Verdict::new(outcome, justification));
                true
            }
            None => false,
        }
    }

    /// Current state for persistence.
    pub fn snapshot(&self) -> Vec<Rule> {
        self.rules.clone()
    }

    /// Replace the in-memory state with a persisted snapshot.
    ///
    /// Nothing restores as `Evaluating`: an in-flight evaluation cannot be
    /// resumed across a restart, so such rules come back `Idle` with no
    /// result. Settled rules keep their verdict. Duplicate ids keep the
    /// first occurrence.
    pub fn restore(&mut self, rules: Vec<Rule>) {
        let mut restored: Vec<Rule> = Vec::with_capacity(rules.len());
        for mut rule in rules {
            if restored.iter().any(|r| r.id == rule.id) {
                debug!(rule_id = %rule.id, "dropping duplicate rule id from snapshot");
                continue;
            }
            rule.generation = 0;
            match rule.state {
                LifecycleState::Evaluating | LifecycleState::Idle => {
                    rule.state = LifecycleState::Idle;
                    rule.result = None;
                    rule.evaluated_at = None;
                }
                LifecycleState::Resolved | LifecycleState::Errored => match &rule.result {
                    Some(v) => rule.state = v.outcome.settled_state(),
                    None => rule.state = LifecycleState::Idle,
                },
            }
            restored.push(rule);
        }
        self.rules = restored;
    }

    /// Adopt a snapshot written by another session sharing the same storage.
    ///
    /// The stored order, membership, and verdicts win. Rules this store is
    /// evaluating stay `Evaluating`, and every surviving rule keeps its
    /// generation, so outstanding tickets stay valid. A rule missing from
    /// the snapshot is dropped and its tickets settle as `Removed`.
    pub fn merge(&mut self, stored: Vec<Rule>) {
        let mut incoming = RuleStore::new();
        incoming.restore(stored);
        for rule in &mut incoming.rules {
            let Some(local) = self.get(rule.id) else {
                continue;
            };
            rule.generation = local.generation;
            if local.is_evaluating() {
                rule.state = LifecycleState::Evaluating;
                if rule.result.is_none() {
                    rule.result = local.result.clone();
                    rule.evaluated_at = local.evaluated_at;
                }
            }
        }
        let dropped = self.iter().filter(|r| incoming.get(r.id).is_none()).count();
        debug!(rules = incoming.len(), dropped, "merged stored rules");
        self.rules = incoming.rules;
    }

    // ── Queries ──

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| r.id == id)
    }

    pub fn position(&self, id: RuleId) -> Option<usize> {
        self.rules.iter().position(|r| r.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|r| r.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store_with(titles: &[&str]) -> (RuleStore, Vec<RuleId>) {
        let mut store = RuleStore::new();
        let ids = titles
            .iter()
            .map(|t| store.add(t, "").unwrap())
            .collect();
        (store, ids)
    }

    fn titles(store: &RuleStore) -> Vec<&str> {
        store.iter().map(|r| r.title.as_str()).collect()
    }

    // ── add / remove ──

    #[test]
    fn add_creates_idle_rule_without_result() {
        let mut store = RuleStore::new();
        let id = store
            .add(
                "No Bankruptcy",
                "Applicant must not have filed bankruptcy in 7 years.",
            )
            .unwrap();
        let rule = store.get(id).unwrap();
        assert_eq!(rule.state, LifecycleState::Idle);
        assert!(rule.result.is_none());
        assert_eq!(
            rule.definition,
            "Applicant must not have filed bankruptcy in 7 years."
        );
    }

    #[test]
    fn add_trims_title_and_appends() {
        let (mut store, _) = store_with(&["first"]);
        store.add("  second  ", "").unwrap();
        assert_eq!(titles(&store), vec!["first", "second"]);
    }

    #[test]
    fn add_empty_title_rejected_without_change() {
        let (mut store, _) = store_with(&["keep"]);
        assert!(matches!(store.add("", "def"), Err(RuleError::Validation(_))));
        assert!(matches!(
            store.add("   \t", "def"),
            Err(RuleError::Validation(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let (mut store, ids) = store_with(&["a", "b"]);
        assert!(store.remove(ids[0]));
        assert!(!store.remove(ids[0]));
        assert!(!store.remove(RuleId::new()));
        assert_eq!(titles(&store), vec!["b"]);
    }

    // ── reorder ──

    #[test]
    fn reorder_moves_forward_and_back() {
        let (mut store, _) = store_with(&["a", "b", "c", "d"]);
        store.reorder(0, 2).unwrap();
        assert_eq!(titles(&store), vec!["b", "c", "a", "d"]);
        store.reorder(3, 0).unwrap();
        assert_eq!(titles(&store), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn reorder_same_index_is_noop() {
        let (mut store, _) = store_with(&["a", "b"]);
        store.reorder(1, 1).unwrap();
        assert_eq!(titles(&store), vec!["a", "b"]);
    }

    #[test]
    fn reorder_out_of_bounds_rejected() {
        let (mut store, _) = store_with(&["a", "b"]);
        assert_eq!(
            store.reorder(2, 0),
            Err(RuleError::Index { index: 2, len: 2 })
        );
        assert_eq!(
            store.reorder(0, 5),
            Err(RuleError::Index { index: 5, len: 2 })
        );
        assert_eq!(titles(&store), vec!["a", "b"]);
    }

    #[test]
    fn reorder_on_empty_store_rejected() {
        let mut store = RuleStore::new();
        assert_eq!(
            store.reorder(0, 0),
            Err(RuleError::Index { index: 0, len: 0 })
        );
    }

    proptest! {
        #[test]
        fn reorder_is_a_permutation(n in 1usize..12, a in 0usize..12, b in 0usize..12) {
            let names: Vec<String> = (0..n).map(|i| format!("rule {i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let (mut store, ids) = store_with(&refs);
            let (from, to) = (a % n, b % n);

            store.reorder(from, to).unwrap();

            prop_assert_eq!(store.len(), n);
            let mut before = ids.clone();
            let mut after = store.ids();
            prop_assert_eq!(after[to], ids[from]);
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }

    // ── lifecycle ──

    #[test]
    fn evaluation_keeps_previous_result_until_settled() {
        let (mut store, ids) = store_with(&["a"]);
        store.apply_result(ids[0], Outcome::Fail, "FAIL");

        let ticket = store.set_evaluating(ids[0]).unwrap();
        let rule = store.get(ids[0]).unwrap();
        assert_eq!(rule.state, LifecycleState::Evaluating);
        assert_eq!(rule.outcome(), Some(Outcome::Fail));

        let settled = store.settle(ticket, Verdict::new(Outcome::Pass, "PASS"));
        assert_eq!(settled, Settlement::Applied);
        let rule = store.get(ids[0]).unwrap();
        assert_eq!(rule.state, LifecycleState::Resolved);
        assert_eq!(rule.outcome(), Some(Outcome::Pass));
        assert!(rule.evaluated_at.is_some());
    }

    #[test]
    fn set_evaluating_unknown_rule_fails() {
        let mut store = RuleStore::new();
        let id = RuleId::new();
        assert_eq!(store.set_evaluating(id), Err(RuleError::NotFound(id)));
    }

    #[test]
    fn unknown_outcome_settles_as_errored() {
        let (mut store, ids) = store_with(&["a"]);
        let ticket = store.set_evaluating(ids[0]).unwrap();
        store.settle(ticket, Verdict::error("connection refused"));
        let rule = store.get(ids[0]).unwrap();
        assert_eq!(rule.state, LifecycleState::Errored);
        assert!(
            rule.result
                .as_ref()
                .unwrap()
                .justification
                .starts_with("Error:")
        );
    }

    #[test]
    fn stale_ticket_is_superseded_when_later_call_lands_first() {
        let (mut store, ids) = store_with(&["a"]);
        let first = store.set_evaluating(ids[0]).unwrap();
        let second = store.set_evaluating(ids[0]).unwrap();

        assert_eq!(
            store.settle(second, Verdict::new(Outcome::Pass, "second PASS")),
            Settlement::Applied
        );
        assert_eq!(
            store.settle(first, Verdict::new(Outcome::Fail, "first FAIL")),
            Settlement::Superseded
        );

        let rule = store.get(ids[0]).unwrap();
        assert_eq!(rule.state, LifecycleState::Resolved);
        assert_eq!(rule.result.as_ref().unwrap().justification, "second PASS");
    }

    #[test]
    fn stale_ticket_landing_first_leaves_rule_evaluating_for_latest() {
        let (mut store, ids) = store_with(&["a"]);
        let first = store.set_evaluating(ids[0]).unwrap();
        let second = store.set_evaluating(ids[0]).unwrap();

        store.settle(first, Verdict::new(Outcome::Fail, "first"));
        assert!(store.get(ids[0]).unwrap().is_evaluating());

        store.settle(second, Verdict::new(Outcome::Pass, "second PASS"));
        assert_eq!(store.get(ids[0]).unwrap().state, LifecycleState::Resolved);
    }

    #[test]
    fn settle_after_remove_does_not_resurrect() {
        let (mut store, ids) = store_with(&["a", "b"]);
        let ticket = store.set_evaluating(ids[0]).unwrap();
        store.remove(ids[0]);
        assert_eq!(
            store.settle(ticket, Verdict::new(Outcome::Pass, "PASS")),
            Settlement::Removed
        );
        assert_eq!(store.len(), 1);
        assert!(store.get(ids[0]).is_none());
    }

    #[test]
    fn apply_result_on_removed_rule_is_noop() {
        let (mut store, ids) = store_with(&["a"]);
        store.remove(ids[0]);
        assert!(!store.apply_result(ids[0], Outcome::Pass, "PASS"));
        assert!(store.is_empty());
    }

    #[test]
    fn apply_result_leaves_siblings_alone() {
        let (mut store, ids) = store_with(&["a", "b"]);
        store.apply_result(ids[1], Outcome::NotApplicable, "NA");
        assert_eq!(store.get(ids[0]).unwrap().state, LifecycleState::Idle);
        assert_eq!(store.get(ids[1]).unwrap().state, LifecycleState::Resolved);
    }

    // ── snapshot / restore ──

    #[test]
    fn restore_never_yields_evaluating() {
        let (mut store, ids) = store_with(&["in flight", "settled", "fresh"]);
        store.apply_result(ids[0], Outcome::Fail, "old FAIL");
        store.set_evaluating(ids[0]).unwrap();
        store.apply_result(ids[1], Outcome::Pass, "PASS");

        let json = serde_json::to_string(&store.snapshot()).unwrap();
        let mut reloaded = RuleStore::new();
        reloaded.restore(serde_json::from_str(&json).unwrap());

        assert_eq!(reloaded.ids(), ids);
        let in_flight = reloaded.get(ids[0]).unwrap();
        assert_eq!(in_flight.state, LifecycleState::Idle);
        assert!(in_flight.result.is_none());

        let settled = reloaded.get(ids[1]).unwrap();
        assert_eq!(settled.state, LifecycleState::Resolved);
        assert_eq!(settled.outcome(), Some(Outcome::Pass));

        assert_eq!(reloaded.get(ids[2]).unwrap().state, LifecycleState::Idle);
        assert!(reloaded.iter().all(|r| !r.is_evaluating()));
    }

    #[test]
    fn restored_rules_accept_new_evaluations() {
        let (mut store, ids) = store_with(&["a"]);
        store.set_evaluating(ids[0]).unwrap();
        let snapshot = store.snapshot();

        let mut reloaded = RuleStore::new();
        reloaded.restore(snapshot);
        let ticket = reloaded.set_evaluating(ids[0]).unwrap();
        assert_eq!(
            reloaded.settle(ticket, Verdict::new(Outcome::Pass, "PASS")),
            Settlement::Applied
        );
    }

    #[test]
    fn restore_drops_duplicate_ids() {
        let (store, _) = store_with(&["a"]);
        let mut snapshot = store.snapshot();
        let mut dup = snapshot[0].clone();
        dup.title = "duplicate".into();
        snapshot.push(dup);

        let mut reloaded = RuleStore::new();
        reloaded.restore(snapshot);
        assert_eq!(titles(&reloaded), vec!["a"]);
    }

    #[test]
    fn restore_settled_without_result_becomes_idle() {
        let (mut store, ids) = store_with(&["a"]);
        store.apply_result(ids[0], Outcome::Pass, "PASS");
        let mut snapshot = store.snapshot();
        snapshot[0].result = None;

        let mut reloaded = RuleStore::new();
        reloaded.restore(snapshot);
        assert_eq!(reloaded.get(ids[0]).unwrap().state, LifecycleState::Idle);
    }

    #[test]
    fn merge_adopts_stored_order_and_membership() {
        let (mut session, ids) = store_with(&["a", "b"]);

        let mut other = session.clone();
        other.remove(ids[0]);
        other.add("c", "").unwrap();
        other.apply_result(ids[1], Outcome::Fail, "FAIL");

        session.merge(other.snapshot());
        assert_eq!(titles(&session), vec!["b", "c"]);
        assert_eq!(session.get(ids[1]).unwrap().outcome(), Some(Outcome::Fail));
    }

    #[test]
    fn merge_keeps_in_flight_evaluations() {
        let (mut session, ids) = store_with(&["a"]);
        session.apply_result(ids[0], Outcome::Pass, "PASS");
        let ticket = session.set_evaluating(ids[0]).unwrap();

        // Another session wrote the rule while it was mid-evaluation here.
        let stored = session.snapshot();
        session.merge(stored);

        let rule = session.get(ids[0]).unwrap();
        assert!(rule.is_evaluating());
        assert_eq!(rule.outcome(), Some(Outcome::Pass));
        assert_eq!(
            session.settle(ticket, Verdict::new(Outcome::Fail, "FAIL")),
            Settlement::Applied
        );
    }

    #[test]
    fn merge_without_rule_settles_as_removed() {
        let (mut session, ids) = store_with(&["a", "b"]);
        let ticket = session.set_evaluating(ids[0]).unwrap();

        let mut other = session.clone();
        other.remove(ids[0]);
        session.merge(other.snapshot());

        assert_eq!(
            session.settle(ticket, Verdict::new(Outcome::Pass, "PASS")),
            Settlement::Removed
        );
        assert_eq!(titles(&session), vec!["b"]);
    }
}
