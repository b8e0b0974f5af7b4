use crate::trigger::Trigger;

use std::cmp::Ordering;

/// An armed timer in the simulator's timer queue.
///
/// Entries are stored in a `BinaryHeap` and popped in deadline order. Timers
/// armed for the same deadline fire in the order they were armed.
///
/// A disarmed timer stays in the heap; it is skipped when popped because its
/// trigger is no longer primed.
pub(crate) struct TimerEntry {
    /// Simulation time at which the timer fires.
    pub(crate) deadline: u64,

    /// Arming order, breaking ties between equal deadlines.
    pub(crate) seq: u64,

    pub(crate) trigger: Trigger,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline, then arming order.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BinaryHeap;

    #[test]
    fn pops_earliest_deadline_then_arming_order() {
        let mut heap = BinaryHeap::new();
        let late = Trigger::timer(20);
        let first = Trigger::timer(10);
        let second = Trigger::timer(10);

        heap.push(TimerEntry { deadline: 20, seq: 0, trigger: late.clone() });
        heap.push(TimerEntry { deadline: 10, seq: 1, trigger: first.clone() });
        heap.push(TimerEntry { deadline: 10, seq: 2, trigger: second.clone() });

        let order: Vec<Trigger> = std::iter::from_fn(|| heap.pop().map(|e| e.trigger)).collect();
        assert_eq!(order, vec![first, second, late]);
    }
}
