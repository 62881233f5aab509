//! Order status machine
//!
//! ```text
//! pending    -> confirmed   reserve stock
//! pending    -> cancelled
//! confirmed  -> shipped
//! confirmed  -> cancelled   release stock
//! shipped    -> delivered
//! ```
//!
//! Every other pair, including re-requesting the current status, is forbidden.

use crate::domain::aggregates::OrderStatus;

/// Decision for a (current, requested) status pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Allowed; decrement stock for every line
    Reserve,
    /// Allowed; give the reserved stock back
    Release,
    /// Allowed; no inventory effect
    Neutral,
    Forbidden,
}

impl Transition {
    pub fn is_allowed(&self) -> bool { !matches!(self, Self::Forbidden) }
}

pub fn classify(current: OrderStatus, requested: OrderStatus) -> Transition {
    use OrderStatus::*;
    match (current, requested) {
        (Pending, Confirmed) => Transition::Reserve,
        (Pending, Cancelled) => Transition::Neutral,
        (Confirmed, Shipped) => Transition::Neutral,
        (Confirmed, Cancelled) => Transition::Release,
        (Shipped, Delivered) => Transition::Neutral,
        _ => Transition::Forbidden,
    }
}

pub fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled)
}

/// Cancellation is only admissible before shipping
pub fn is_cancellable(status: OrderStatus) -> bool {
    classify(status, OrderStatus::Cancelled).is_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn test_allowed_edges_are_exactly_five() {
        let mut allowed = vec![];
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if classify(from, to).is_allowed() { allowed.push((from, to)); }
            }
        }
        assert_eq!(allowed, vec![(Pending, Confirmed), (Pending, Cancelled), (Confirmed, Shipped), (Confirmed, Cancelled), (Shipped, Delivered)]);
    }

    #[test]
    fn test_effects() {
        assert_eq!(classify(Pending, Confirmed), Transition::Reserve);
        assert_eq!(classify(Confirmed, Cancelled), Transition::Release);
        assert_eq!(classify(Pending, Cancelled), Transition::Neutral);
        assert_eq!(classify(Shipped, Delivered), Transition::Neutral);
    }

    #[test]
    fn test_same_status_is_forbidden() {
        for st in OrderStatus::ALL { assert_eq!(classify(st, st), Transition::Forbidden); }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for st in OrderStatus::ALL.into_iter().filter(|s| is_terminal(*s)) {
            assert!(OrderStatus::ALL.iter().all(|to| classify(st, *to) == Transition::Forbidden));
        }
        assert!(is_terminal(Delivered) && is_terminal(Cancelled));
        assert!(!is_terminal(Pending) && !is_terminal(Confirmed) && !is_terminal(Shipped));
    }

    #[test]
    fn test_cancellable() {
        assert!(is_cancellable(Pending) && is_cancellable(Confirmed));
        assert!(!is_cancellable(Shipped) && !is_cancellable(Delivered) && !is_cancellable(Cancelled));
    }
}
