use crate::trigger::Trigger;
use crate::utils::Key;

use indexmap::IndexMap;

/// Maps each primed trigger to the tasks suspended on it.
///
/// Lists keep registration order, which is the order tasks are resumed in.
/// A trigger is present only while at least one task waits on it.
pub(crate) struct WaitingRegistry {
    waiting: IndexMap<Trigger, Vec<Key>>,
}

impl WaitingRegistry {
    pub(crate) fn new() -> Self {
        Self {
            waiting: IndexMap::new(),
        }
    }

    /// Appends `key` to the list of `trigger`, creating the list if needed.
    pub(crate) fn add(&mut self, trigger: Trigger, key: Key) {
        self.waiting.entry(trigger).or_default().push(key);
    }

    /// Removes and returns the whole list of `trigger`.
    pub(crate) fn detach(&mut self, trigger: &Trigger) -> Option<Vec<Key>> {
        self.waiting.shift_remove(trigger)
    }

    /// Removes `key` from the list of `trigger`.
    ///
    /// Returns `true` if that emptied the list, in which case the trigger is
    /// no longer waited on.
    pub(crate) fn remove_waiter(&mut self, trigger: &Trigger, key: Key) -> bool {
        let Some(keys) = self.waiting.get_mut(trigger) else {
            return false;
        };

        keys.retain(|k| *k != key);

        if keys.is_empty() {
            self.waiting.shift_remove(trigger);
            return true;
        }

        false
    }

    /// Empties the registry.
    pub(crate) fn drain(&mut self) -> Vec<(Trigger, Vec<Key>)> {
        std::mem::take(&mut self.waiting).into_iter().collect()
    }

    pub(crate) fn waiters(&self, trigger: &Trigger) -> &[Key] {
        self.waiting.get(trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn contains(&self, trigger: &Trigger) -> bool {
        self.waiting.contains_key(trigger)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Trigger, &[Key])> {
        self.waiting.iter().map(|(t, keys)| (t, keys.as_slice()))
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Slab;

    fn keys(n: usize) -> Vec<Key> {
        let mut slab = Slab::new(n);
        (0..n).map(|i| slab.insert(i)).collect()
    }

    #[test]
    fn detach_returns_registration_order() {
        let k = keys(3);
        let t = Trigger::timer(1);
        let mut registry = WaitingRegistry::new();

        registry.add(t.clone(), k[2]);
        registry.add(t.clone(), k[0]);
        registry.add(t.clone(), k[1]);

        assert_eq!(registry.detach(&t), Some(vec![k[2], k[0], k[1]]));
        assert!(!registry.contains(&t));
        assert_eq!(registry.detach(&t), None);
    }

    #[test]
    fn removing_last_waiter_drops_the_trigger() {
        let k = keys(2);
        let t = Trigger::read_only();
        let mut registry = WaitingRegistry::new();

        registry.add(t.clone(), k[0]);
        registry.add(t.clone(), k[1]);

        assert!(!registry.remove_waiter(&t, k[0]));
        assert_eq!(registry.waiters(&t), &[k[1]]);
        assert!(registry.remove_waiter(&t, k[1]));
        assert!(registry.is_empty());
    }

    #[test]
    fn drain_empties_everything() {
        let k = keys(1);
        let mut registry = WaitingRegistry::new();

        registry.add(Trigger::timer(1), k[0]);
        registry.add(Trigger::timer(2), k[0]);

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
    }
}
