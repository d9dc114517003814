//! Per-runtime registry of live actors.
//!
//! One guarded collection per runtime, never shared across runtimes: the
//! actor map and the condition variable behind [`ActorRegistry::wait_for_all`]
//! share a single mutex, so the emptiness check and the wait registration
//! happen under one exclusivity scope and a `remove` racing a waiter cannot
//! lose the wakeup.

use crate::actor::AnyCell;
use crate::address::{ActorAddr, ActorId};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry entry: the live actor plus the addresses watching it.
pub struct ActorEntry {
    cell: Arc<dyn AnyCell>,
    monitors: Vec<ActorAddr>,
}

impl ActorEntry {
    fn new(cell: Arc<dyn AnyCell>) -> Self {
        Self {
            cell,
            monitors: Vec::new(),
        }
    }

    pub fn cell(&self) -> &Arc<dyn AnyCell> {
        &self.cell
    }

    pub fn monitors(&self) -> &[ActorAddr] {
        &self.monitors
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn AnyCell>, Vec<ActorAddr>) {
        (self.cell, self.monitors)
    }
}

/// One row of the structural dump exposed for debugging and tests.
#[derive(Debug, Clone, Serialize)]
pub struct ActorOverview {
    pub id: ActorId,
    pub actor: String,
    pub monitors: Vec<ActorAddr>,
}

/// Concurrency-safe map of live actors for one runtime.
#[derive(Default)]
pub struct ActorRegistry {
    actors: Mutex<HashMap<ActorId, ActorEntry>>,
    drained: Condvar,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.lock().contains_key(&id)
    }

    /// The live actor behind `id`. The clone is handed out so delivery runs
    /// outside the registry lock; a handler dispatching back into the
    /// registry never re-enters it.
    pub fn find(&self, id: ActorId) -> Option<Arc<dyn AnyCell>> {
        self.actors.lock().get(&id).map(|entry| Arc::clone(&entry.cell))
    }

    /// Install a new entry.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already present. Ids are allocated monotonically by
    /// the owning runtime, so a duplicate is a programming error, not a
    /// recoverable condition.
    pub fn add(&self, id: ActorId, cell: Arc<dyn AnyCell>) {
        let mut actors = self.actors.lock();
        let previous = actors.insert(id, ActorEntry::new(cell));
        assert!(previous.is_none(), "actor id {id} registered twice");
    }

    /// Atomically detach and return the entry for `id`, waking
    /// `wait_for_all` callers if this empties the registry.
    pub fn remove(&self, id: ActorId) -> Option<ActorEntry> {
        let mut actors = self.actors.lock();
        let entry = actors.remove(&id);
        if entry.is_some() && actors.is_empty() {
            self.drained.notify_all();
        }
        entry
    }

    /// Register `watcher` to be told when `watched` terminates. Returns
    /// `false` if `watched` is not live. Registration only: notification is
    /// the runtime's responsibility at removal time.
    pub fn monitor(&self, watcher: ActorAddr, watched: ActorId) -> bool {
        let mut actors = self.actors.lock();
        match actors.get_mut(&watched) {
            Some(entry) => {
                debug!(watched = %watched, watcher = %watcher, "monitor registered");
                entry.monitors.push(watcher);
                true
            }
            None => false,
        }
    }

    /// Run `f` over every live actor while holding the registry lock. For
    /// bulk introspection, not message delivery.
    pub fn apply(&self, mut f: impl FnMut(ActorId, &dyn AnyCell)) {
        let actors = self.actors.lock();
        for (id, entry) in actors.iter() {
            f(*id, entry.cell.as_ref());
        }
    }

    /// True when `predicate` holds for every live actor, checked under the
    /// registry lock.
    pub fn check_all(&self, mut predicate: impl FnMut(ActorId, &dyn AnyCell) -> bool) -> bool {
        let actors = self.actors.lock();
        actors.iter().all(|(id, entry)| predicate(*id, entry.cell.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.actors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.lock().is_empty()
    }

    /// Block the calling thread until the registry is empty.
    pub fn wait_for_all(&self) {
        let mut actors = self.actors.lock();
        while !actors.is_empty() {
            self.drained.wait(&mut actors);
        }
    }

    /// Structural dump: id, actor type name, monitor list per live actor,
    /// ordered by id.
    pub fn overview(&self) -> Vec<ActorOverview> {
        let actors = self.actors.lock();
        let mut rows: Vec<ActorOverview> = actors
            .iter()
            .map(|(id, entry)| ActorOverview {
                id: *id,
                actor: entry.cell.type_name().to_string(),
                monitors: entry.monitors.clone(),
            })
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::RuntimeLink;
    use crate::address::NodeId;
    use crate::messages::Payload;
    use std::thread;
    use std::time::Duration;

    /// Minimal cell stub; the registry only needs the capability surface.
    struct StubCell {
        name: &'static str,
    }

    impl AnyCell for StubCell {
        fn receive(
            &self,
            _link: &dyn RuntimeLink,
            _self_addr: ActorAddr,
            _sender: ActorAddr,
            _payload: Payload,
        ) {
        }

        fn type_name(&self) -> &'static str {
            self.name
        }

        fn state_debug(&self) -> Option<String> {
            None
        }

        fn close(&self) {}

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn stub(name: &'static str) -> Arc<dyn AnyCell> {
        Arc::new(StubCell { name })
    }

    fn addr(id: u64) -> ActorAddr {
        ActorAddr::new(NodeId::new("test"), ActorId::new(id))
    }

    #[test]
    fn add_find_remove_roundtrip() {
        let registry = ActorRegistry::new();
        assert!(registry.is_empty());

        registry.add(ActorId::new(1), stub("one"));
        assert!(registry.contains(ActorId::new(1)));
        assert_eq!(registry.len(), 1);
        assert!(registry.find(ActorId::new(1)).is_some());
        assert!(registry.find(ActorId::new(2)).is_none());

        let entry = registry.remove(ActorId::new(1)).unwrap();
        assert_eq!(entry.cell().type_name(), "one");
        assert!(entry.monitors().is_empty());
        assert!(!registry.contains(ActorId::new(1)));
        assert!(registry.remove(ActorId::new(1)).is_none());
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_add_is_a_programming_error() {
        let registry = ActorRegistry::new();
        registry.add(ActorId::new(7), stub("first"));
        registry.add(ActorId::new(7), stub("second"));
    }

    #[test]
    fn monitor_requires_a_live_watched_actor() {
        let registry = ActorRegistry::new();
        assert!(!registry.monitor(addr(9), ActorId::new(1)));

        registry.add(ActorId::new(1), stub("watched"));
        assert!(registry.monitor(addr(9), ActorId::new(1)));
        assert!(registry.monitor(addr(10), ActorId::new(1)));

        let entry = registry.remove(ActorId::new(1)).unwrap();
        assert_eq!(entry.monitors(), &[addr(9), addr(10)]);
    }

    #[test]
    fn apply_and_check_all_see_every_entry() {
        let registry = ActorRegistry::new();
        registry.add(ActorId::new(1), stub("a"));
        registry.add(ActorId::new(2), stub("b"));

        let mut seen = Vec::new();
        registry.apply(|id, cell| seen.push((id, cell.type_name())));
        seen.sort();
        assert_eq!(seen, vec![(ActorId::new(1), "a"), (ActorId::new(2), "b")]);

        assert!(registry.check_all(|_, cell| !cell.type_name().is_empty()));
        assert!(!registry.check_all(|id, _| id == ActorId::new(1)));
    }

    #[test]
    fn overview_is_ordered_and_carries_monitors() {
        let registry = ActorRegistry::new();
        registry.add(ActorId::new(2), stub("b"));
        registry.add(ActorId::new(1), stub("a"));
        registry.monitor(addr(5), ActorId::new(2));

        let rows = registry.overview();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, ActorId::new(1));
        assert_eq!(rows[0].actor, "a");
        assert_eq!(rows[1].id, ActorId::new(2));
        assert_eq!(rows[1].monitors, vec![addr(5)]);
    }

    #[test]
    fn wait_for_all_returns_immediately_when_empty() {
        let registry = ActorRegistry::new();
        registry.wait_for_all();
    }

    #[test]
    fn wait_for_all_blocks_until_the_last_removal() {
        let registry = Arc::new(ActorRegistry::new());
        registry.add(ActorId::new(1), stub("a"));
        registry.add(ActorId::new(2), stub("b"));

        let remover = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                registry.remove(ActorId::new(1));
                thread::sleep(Duration::from_millis(20));
                registry.remove(ActorId::new(2));
            })
        };

        registry.wait_for_all();
        assert!(registry.is_empty());
        remover.join().unwrap();
    }
}
