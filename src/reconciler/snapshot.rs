use crate::types::entity::{Entity, EntityId};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// The latest known value of every entity on one channel, keyed by id.
///
/// Later events win by arrival order: an update replaces the stored
/// value wholesale, never merging fields. The snapshot survives
/// transient disconnects and is only replaced by the next full resync
/// or dropped on explicit channel close.
#[derive(Debug, Clone)]
pub struct EntitySnapshot<T> {
    entities: HashMap<EntityId, T>,
}

impl<T> Default for EntitySnapshot<T> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }
}

impl<T: Entity> EntitySnapshot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Drops everything and installs `items` as the new authoritative
    /// state. Returns the new entity count.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        self.entities = items.into_iter().map(|item| (item.id(), item)).collect();
        self.entities.len()
    }

    /// Inserts or overwrites by id.
    pub fn upsert(&mut self, item: T) -> EntityId {
        let id = item.id();
        self.entities.insert(id, item);
        id
    }

    /// Removes by id. Absent ids are fine; the return value says
    /// whether anything was there.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.entities.remove(&id).is_some()
    }

    /// Current values, sorted by id for a stable read.
    pub fn values_sorted(&self) -> Vec<T> {
        let mut values: Vec<T> = self.entities.values().cloned().collect();
        values.sort_by_key(Entity::id);
        values
    }
}

/// How one applied event changed the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotDelta {
    /// Full resync installed `count` entities.
    Replaced { count: usize },
    /// One entity inserted or overwritten.
    Upserted { id: EntityId },
    /// One id removed; `existed` is false when it was already gone.
    Removed { id: EntityId, existed: bool },
    /// Nothing changed (duplicate event or side-channel data).
    Unchanged,
}

impl SnapshotDelta {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged | Self::Removed { existed: false, .. })
    }
}

/// Bounded memory of recently applied event ids, oldest evicted first.
/// Duplicate deliveries inside the window are discarded.
#[derive(Debug)]
pub struct EventIdRing {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl EventIdRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records an id. Returns false when it was already present.
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(evicted) = self.order.pop_front()
        {
            self.seen.remove(&evicted);
        }
        true
    }
}
