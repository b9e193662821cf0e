//! A timer wheel (spec section 4.5, section 9's design note): an
//! insertion-order list paired with a deadline-ordered index, standing in
//! for the original interpreter's AVL tree while preserving the same split
//! between O(log n) earliest-deadline queries and in-order enumeration.

use crate::coroutine::CoroutineToken;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct TimerWheel {
    insertion_order: Vec<(CoroutineToken, u64)>,
    by_deadline: BTreeMap<u64, Vec<CoroutineToken>>,
}

impl TimerWheel {
    pub fn new() -> Self {
        TimerWheel::default()
    }

    pub fn schedule(&mut self, token: CoroutineToken, deadline_ms: u64) {
        self.insertion_order.push((token, deadline_ms));
        self.by_deadline.entry(deadline_ms).or_default().push(token);
    }

    pub fn cancel(&mut self, token: CoroutineToken) {
        self.insertion_order.retain(|(t, _)| *t != token);
        self.by_deadline.retain(|_, tokens| {
            tokens.retain(|t| *t != token);
            !tokens.is_empty()
        });
    }

    /// Removes and returns every coroutine whose deadline has passed.
    pub fn expired(&mut self, now_ms: u64) -> Vec<CoroutineToken> {
        let due_deadlines: Vec<u64> = self.by_deadline.range(..=now_ms).map(|(k, _)| *k).collect();
        let mut due = Vec::new();
        for deadline in due_deadlines {
            if let Some(tokens) = self.by_deadline.remove(&deadline) {
                due.extend(tokens);
            }
        }
        self.insertion_order.retain(|(t, _)| !due.contains(t));
        due
    }

    /// The soonest deadline still pending, used to decide how long the
    /// scheduler may sleep before its next tick (spec section 4.5's fifth
    /// step).
    pub fn earliest_deadline(&self) -> Option<u64> {
        self.by_deadline.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }

    pub fn in_insertion_order(&self) -> &[(CoroutineToken, u64)] {
        &self.insertion_order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_returns_only_due_tokens_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(CoroutineToken(1), 100);
        wheel.schedule(CoroutineToken(2), 50);
        wheel.schedule(CoroutineToken(3), 200);

        assert_eq!(wheel.earliest_deadline(), Some(50));
        let due = wheel.expired(100);
        assert_eq!(due, vec![CoroutineToken(2), CoroutineToken(1)]);
        assert_eq!(wheel.earliest_deadline(), Some(200));
    }

    #[test]
    fn cancel_removes_a_pending_timer() {
        let mut wheel = TimerWheel::new();
        wheel.schedule(CoroutineToken(1), 100);
        wheel.cancel(CoroutineToken(1));
        assert!(wheel.is_empty());
        assert!(wheel.expired(1000).is_empty());
    }
}
