/// A stable key into a [`Slab`].
///
/// Keys carry the generation of the slot they were issued for, so a key
/// that outlives its value never aliases a later occupant of the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: usize,
    generation: u32,
}

/// A generational slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// [`Key`]s whose slots are reused after removal.
///
/// Internally, it keeps track of:
/// - occupied slots,
/// - free indices,
/// - the generation of every slot, bumped on each removal.
///
/// The scheduler stores its tasks here. Waiting lists refer to tasks by key,
/// and a key left behind in a waiting list after its task finished simply
/// resolves to nothing.
pub(crate) struct Slab<T> {
    /// Storage for items (`None` for free slots).
    items: Vec<Option<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Current generation of every slot.
    generations: Vec<u32>,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with a fixed initial capacity.
    ///
    /// All slots are initially free.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let slab = Slab::<i32>::new(16);
    /// ```
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| None).collect();
        let free = (0..size).rev().collect();
        let generations = vec![0; size];

        Self {
            items,
            free,
            generations,
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused.
    /// Otherwise, the slab grows exponentially.
    pub(crate) fn insert(&mut self, item: T) -> Key {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items.extend((len..new_len).map(|_| None));
            self.free.extend(((len + 1)..new_len).rev());
            self.generations.extend((len..new_len).map(|_| 0));

            len
        };

        self.items[index] = Some(item);

        Key {
            index,
            generation: self.generations[index],
        }
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale (the value was already removed).
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        if !self.contains(key) {
            return None;
        }

        let item = self.items[key.index].take();
        self.generations[key.index] = self.generations[key.index].wrapping_add(1);
        self.free.push(key.index);

        item
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        if !self.contains(key) {
            return None;
        }

        self.items[key.index].as_mut()
    }

    /// Returns a shared reference to the value stored under `key`.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        if !self.contains(key) {
            return None;
        }

        self.items[key.index].as_ref()
    }

    /// Returns `true` if `key` refers to a live value.
    pub(crate) fn contains(&self, key: Key) -> bool {
        key.index < self.items.len()
            && self.generations[key.index] == key.generation
            && self.items[key.index].is_some()
    }

    /// Returns the number of live values.
    pub(crate) fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    /// Returns the keys of every live value, in slot order.
    pub(crate) fn keys(&self) -> Vec<Key> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_some())
            .map(|(index, _)| Key {
                index,
                generation: self.generations[index],
            })
            .collect()
    }
}
