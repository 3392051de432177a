//! The refresher: an invalidation hub mapping signals to subscribers.
//!
//! A subscriber registers against a set of *trigger* signals and may declare
//! *cascade* signals to refresh after it has refreshed itself. Signals are
//! variable names.
//!
//! Every refresh request runs in two phases:
//!
//! 1. **Soil**: each subscriber of the requested signals is marked dirty,
//!    then the subscribers of its cascades, and so on. A subscriber is
//!    marked at most once, so shared paths and repeated signals collapse.
//! 2. **Clean**: the dirty subscribers are refreshed exactly once each, in
//!    topological order of the cascade edges between them (Kahn's
//!    algorithm, ties broken by registration order). A subscriber reached
//!    through two cascade paths therefore runs after both of its upstream
//!    subscribers have settled.
//!
//! Requests made while a clean is already running (a subscriber refreshing
//! another signal from inside its own refresh) only soil; the running clean
//! picks them up before it returns.
//!
//! [`Refresher::hold`] defers cleaning until the matching
//! [`Refresher::release`]. Pausing drops requests outright, and the caller
//! catches up with [`Refresher::refresh_all`] afterwards.
//!
//! The refresher holds only weak handles. A subscriber whose owner has been
//! dropped is pruned the next time it would have been refreshed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Weak;

use log::{debug, warn};
use statline_engine::engine::VarName;

use crate::error::{CoreError, Result};

/// Anything that can recompute itself on request.
pub trait Subscriber {
    fn refresh(&self) -> Result<()>;
}

/// Handle to a registration, ordered by registration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

/// Registrations collected between [`Refresher::begin_group`] and
/// [`Refresher::end_group`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group {
    members: BTreeSet<SubscriberId>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = SubscriberId> + '_ {
        self.members.iter().copied()
    }
}

struct Entry {
    subscriber: Weak<dyn Subscriber>,
    triggers: BTreeSet<VarName>,
    cascades: BTreeSet<VarName>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    entries: BTreeMap<SubscriberId, Entry>,
    /// Allocation address -> id, to amend repeated registrations.
    by_addr: HashMap<usize, SubscriberId>,
    signals: HashMap<VarName, BTreeSet<SubscriberId>>,
    dirty: BTreeSet<SubscriberId>,
    group: Option<BTreeSet<SubscriberId>>,
    paused: bool,
    held: usize,
    in_flight: bool,
}

fn addr(subscriber: &Weak<dyn Subscriber>) -> usize {
    subscriber.as_ptr().cast::<()>() as usize
}

impl State {
    /// Mark everything reachable from `ids` and `signals` dirty, leaving
    /// `origin` out.
    fn soil(
        &mut self,
        ids: Vec<SubscriberId>,
        signals: Vec<VarName>,
        origin: Option<SubscriberId>,
    ) {
        let mut pending = signals;
        if let Some(entry) = origin.and_then(|id| self.entries.get(&id)) {
            pending.extend(entry.cascades.iter().cloned());
        }
        for id in ids {
            if let Some(entry) = self.entries.get(&id) {
                if self.dirty.insert(id) {
                    pending.extend(entry.cascades.iter().cloned());
                }
            }
        }

        while let Some(signal) = pending.pop() {
            let Some(subscribers) = self.signals.get(&signal) else {
                continue;
            };
            for id in subscribers {
                if Some(*id) == origin {
                    continue;
                }
                if self.dirty.insert(*id) {
                    if let Some(entry) = self.entries.get(id) {
                        pending.extend(entry.cascades.iter().cloned());
                    }
                }
            }
        }
    }

    /// Dirty subscribers in cascade order.
    fn order(&self, dirty: &BTreeSet<SubscriberId>) -> Result<Vec<SubscriberId>> {
        let mut indegree: BTreeMap<SubscriberId, usize> =
            dirty.iter().map(|id| (*id, 0)).collect();
        let mut edges: BTreeMap<SubscriberId, BTreeSet<SubscriberId>> = BTreeMap::new();

        for id in dirty {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            let targets = edges.entry(*id).or_default();
            for signal in &entry.cascades {
                for next in self.signals.get(signal).into_iter().flatten() {
                    if next != id && dirty.contains(next) && targets.insert(*next) {
                        *indegree.entry(*next).or_default() += 1;
                    }
                }
            }
        }

        let mut ready: BTreeSet<SubscriberId> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(dirty.len());

        while let Some(id) = ready.pop_first() {
            order.push(id);
            for next in edges.get(&id).into_iter().flatten() {
                if let Some(degree) = indegree.get_mut(next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*next);
                    }
                }
            }
        }

        if order.len() < dirty.len() {
            let stuck: BTreeSet<SubscriberId> = indegree
                .into_iter()
                .filter(|(_, degree)| *degree > 0)
                .map(|(id, _)| id)
                .collect();
            let mut signals = BTreeSet::new();
            for id in &stuck {
                let Some(entry) = self.entries.get(id) else {
                    continue;
                };
                for signal in &entry.cascades {
                    let feeds_stuck = self
                        .signals
                        .get(signal)
                        .is_some_and(|subs| subs.iter().any(|s| stuck.contains(s)));
                    if feeds_stuck {
                        signals.insert(signal.clone());
                    }
                }
            }
            return Err(CoreError::CascadeCycle(signals.into_iter().collect()));
        }

        Ok(order)
    }

    fn remove(&mut self, id: SubscriberId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        self.by_addr.remove(&addr(&entry.subscriber));
        for trigger in &entry.triggers {
            if let Some(subscribers) = self.signals.get_mut(trigger) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    self.signals.remove(trigger);
                }
            }
        }
        self.dirty.remove(&id);
        true
    }
}

/// Central invalidation hub.
///
/// All methods take `&self`; subscribers can hold an `Rc<Refresher>` and
/// call back into it while being refreshed.
#[derive(Default)]
pub struct Refresher {
    state: RefCell<State>,
}

impl Refresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `subscriber` to `triggers`, refreshing `cascades` after it.
    ///
    /// Registering a subscriber that is already registered amends the
    /// existing registration and returns its id.
    pub fn register(
        &self,
        subscriber: Weak<dyn Subscriber>,
        triggers: impl IntoIterator<Item = VarName>,
        cascades: impl IntoIterator<Item = VarName>,
    ) -> Result<SubscriberId> {
        if subscriber.strong_count() == 0 {
            return Err(CoreError::InvalidRegistration);
        }

        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let key = addr(&subscriber);
        let existing = state.by_addr.get(&key).copied();
        let id = match existing {
            Some(id) => id,
            None => {
                let id = SubscriberId(state.next_id);
                state.next_id += 1;
                state.by_addr.insert(key, id);
                state.entries.insert(
                    id,
                    Entry {
                        subscriber,
                        triggers: BTreeSet::new(),
                        cascades: BTreeSet::new(),
                    },
                );
                id
            }
        };

        let Some(entry) = state.entries.get_mut(&id) else {
            return Err(CoreError::InvalidRegistration);
        };
        for trigger in triggers {
            state.signals.entry(trigger.clone()).or_default().insert(id);
            entry.triggers.insert(trigger);
        }
        entry.cascades.extend(cascades);

        if let Some(group) = state.group.as_mut() {
            group.insert(id);
        }

        debug!(
            "registered {:?}: {} triggers, {} cascades",
            id,
            entry.triggers.len(),
            entry.cascades.len()
        );
        Ok(id)
    }

    /// Drop a registration. Returns whether it existed.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.state.borrow_mut().remove(id)
    }

    /// Start collecting new registrations into a group.
    pub fn begin_group(&self) {
        let mut state = self.state.borrow_mut();
        if state.group.is_some() {
            debug!("begin_group discards an unfinished group");
        }
        state.group = Some(BTreeSet::new());
    }

    /// Stop collecting and return what was registered since `begin_group`.
    pub fn end_group(&self) -> Group {
        let members = self.state.borrow_mut().group.take().unwrap_or_default();
        Group { members }
    }

    /// Unregister every member of `group`. Returns how many were removed.
    pub fn remove_group(&self, group: &Group) -> usize {
        let mut state = self.state.borrow_mut();
        group.iter().filter(|id| state.remove(*id)).count()
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    /// While paused, refresh requests are dropped. Unpausing does not
    /// refresh anything by itself.
    pub fn set_paused(&self, paused: bool) {
        let mut state = self.state.borrow_mut();
        if state.paused != paused {
            debug!("refresher {}", if paused { "paused" } else { "resumed" });
        }
        state.paused = paused;
    }

    /// Defer cleaning until a matching [`release`](Self::release).
    /// Returns the new hold depth.
    pub fn hold(&self) -> usize {
        let mut state = self.state.borrow_mut();
        state.held += 1;
        debug!("refresher hold depth {}", state.held);
        state.held
    }

    /// Undo one [`hold`](Self::hold). At depth zero every subscriber soiled
    /// in the meantime is refreshed; returns how many were.
    pub fn release(&self) -> Result<usize> {
        {
            let mut state = self.state.borrow_mut();
            if state.held == 0 {
                warn!("release() called without a matching hold()");
                return Ok(0);
            }
            state.held -= 1;
            debug!("refresher hold depth {}", state.held);
            if state.held > 0 {
                return Ok(0);
            }
        }
        self.clean()
    }

    /// Refresh every subscriber of `signal`, then their cascades.
    /// Returns the number of subscribers refreshed.
    pub fn refresh(&self, signal: &VarName) -> Result<usize> {
        self.request(Vec::new(), vec![signal.clone()])
    }

    /// Like [`refresh`](Self::refresh) for several signals in one batch.
    pub fn refresh_many<'a>(&self, signals: impl IntoIterator<Item = &'a VarName>) -> Result<usize> {
        self.request(Vec::new(), signals.into_iter().cloned().collect())
    }

    /// Refresh the subscribers of `signal` other than `origin`, then the
    /// cascades of `origin` and of everything refreshed.
    ///
    /// This is the request a subscriber makes after changing `signal`
    /// itself: it is already current and is not refreshed again.
    pub fn refresh_except(&self, signal: &VarName, origin: SubscriberId) -> Result<usize> {
        self.request_from(Vec::new(), vec![signal.clone()], Some(origin))
    }

    /// Refresh a single subscriber and its cascades.
    pub fn refresh_subscriber(&self, id: SubscriberId) -> Result<usize> {
        self.request(vec![id], Vec::new())
    }

    /// Refresh every registered subscriber.
    pub fn refresh_all(&self) -> Result<usize> {
        let ids = self.state.borrow().entries.keys().copied().collect();
        self.request(ids, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.state.borrow().entries.contains_key(&id)
    }

    /// Subscribers registered on `signal`, in registration order.
    pub fn subscribers(&self, signal: &VarName) -> Vec<SubscriberId> {
        self.state
            .borrow()
            .signals
            .get(signal)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn triggers(&self, id: SubscriberId) -> Option<Vec<VarName>> {
        let state = self.state.borrow();
        state
            .entries
            .get(&id)
            .map(|entry| entry.triggers.iter().cloned().collect())
    }

    pub fn cascades(&self, id: SubscriberId) -> Option<Vec<VarName>> {
        let state = self.state.borrow();
        state
            .entries
            .get(&id)
            .map(|entry| entry.cascades.iter().cloned().collect())
    }

    fn request(&self, ids: Vec<SubscriberId>, signals: Vec<VarName>) -> Result<usize> {
        self.request_from(ids, signals, None)
    }

    fn request_from(
        &self,
        ids: Vec<SubscriberId>,
        signals: Vec<VarName>,
        origin: Option<SubscriberId>,
    ) -> Result<usize> {
        {
            let mut state = self.state.borrow_mut();
            if state.paused {
                debug!(
                    "refresh dropped while paused ({} signals, {} subscribers)",
                    signals.len(),
                    ids.len()
                );
                return Ok(0);
            }
            state.soil(ids, signals, origin);
        }
        self.clean()
    }

    fn clean(&self) -> Result<usize> {
        {
            let mut state = self.state.borrow_mut();
            if state.held > 0 || state.in_flight {
                return Ok(0);
            }
            state.in_flight = true;
        }

        let result = self.drain();

        let mut state = self.state.borrow_mut();
        state.in_flight = false;
        if result.is_err() {
            state.dirty.clear();
        }
        result
    }

    fn drain(&self) -> Result<usize> {
        let mut count = 0;
        loop {
            let batch: Vec<(SubscriberId, Weak<dyn Subscriber>)> = {
                let mut state = self.state.borrow_mut();
                if state.dirty.is_empty() {
                    break;
                }
                let dirty = std::mem::take(&mut state.dirty);
                let order = state.order(&dirty)?;
                order
                    .into_iter()
                    .filter_map(|id| {
                        state
                            .entries
                            .get(&id)
                            .map(|entry| (id, entry.subscriber.clone()))
                    })
                    .collect()
            };

            for (id, subscriber) in batch {
                match subscriber.upgrade() {
                    Some(subscriber) => {
                        subscriber.refresh()?;
                        count += 1;
                    }
                    None => {
                        warn!("pruning dropped subscriber {:?}", id);
                        self.state.borrow_mut().remove(id);
                    }
                }
            }
        }

        if count > 0 {
            debug!("refreshed {} subscribers", count);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    fn name(s: &str) -> VarName {
        VarName::new(s).unwrap()
    }

    fn names(list: &[&str]) -> Vec<VarName> {
        list.iter().map(|s| name(s)).collect()
    }

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Probe {
        label: &'static str,
        log: Log,
        hits: Cell<usize>,
    }

    impl Probe {
        fn new(label: &'static str, log: &Log) -> Rc<Probe> {
            Rc::new(Probe {
                label,
                log: log.clone(),
                hits: Cell::new(0),
            })
        }
    }

    impl Subscriber for Probe {
        fn refresh(&self) -> Result<()> {
            self.hits.set(self.hits.get() + 1);
            self.log.borrow_mut().push(self.label);
            Ok(())
        }
    }

    /// Refreshes another signal from inside its own refresh.
    struct Relay {
        refresher: Rc<Refresher>,
        signal: VarName,
    }

    impl Subscriber for Relay {
        fn refresh(&self) -> Result<()> {
            self.refresher.refresh(&self.signal)?;
            Ok(())
        }
    }

    #[test]
    fn test_refresh_without_subscribers_is_a_no_op() {
        let refresher = Refresher::new();
        assert_eq!(refresher.refresh(&name("nothing")).unwrap(), 0);
    }

    #[test]
    fn test_cascade_runs_after_direct_subscriber() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&[])).unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["y"]))
            .unwrap();

        assert_eq!(refresher.refresh(&name("x")).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_shared_cascade_target_settles_last_and_once() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let c = Probe::new("c", &log);
        let b = Probe::new("b", &log);
        refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["y"]))
            .unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&c), names(&["y", "z"]), names(&[]))
            .unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&b), names(&["x"]), names(&["z"]))
            .unwrap();

        assert_eq!(refresher.refresh(&name("x")).unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(c.hits.get(), 1);
    }

    #[test]
    fn test_redundant_signals_are_deduplicated() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x", "y"]), names(&[]))
            .unwrap();
        let signals = names(&["x", "y", "x"]);
        assert_eq!(refresher.refresh_many(&signals).unwrap(), 1);
        assert_eq!(a.hits.get(), 1);
    }

    #[test]
    fn test_pause_drops_requests() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        refresher.register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&[])).unwrap();
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&[])).unwrap();

        refresher.set_paused(true);
        assert!(refresher.is_paused());
        assert_eq!(refresher.refresh(&name("x")).unwrap(), 0);
        assert_eq!(a.hits.get(), 0);

        refresher.set_paused(false);
        // Nothing was recorded while paused.
        assert_eq!(refresher.refresh(&name("y")).unwrap(), 1);
        assert_eq!(a.hits.get(), 0);
        assert_eq!(refresher.refresh_all().unwrap(), 2);
        assert_eq!(a.hits.get(), 1);
    }

    #[test]
    fn test_hold_defers_until_release() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        refresher.register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&[])).unwrap();

        assert_eq!(refresher.hold(), 1);
        assert_eq!(refresher.hold(), 2);
        assert_eq!(refresher.refresh(&name("x")).unwrap(), 0);
        assert_eq!(refresher.refresh(&name("x")).unwrap(), 0);
        assert_eq!(refresher.release().unwrap(), 0);
        assert_eq!(a.hits.get(), 0);
        assert_eq!(refresher.release().unwrap(), 1);
        assert_eq!(a.hits.get(), 1);
        // Unbalanced release is harmless.
        assert_eq!(refresher.release().unwrap(), 0);
    }

    #[test]
    fn test_reentrant_refresh_is_cleaned_by_outer_call() {
        let log = Log::default();
        let refresher = Rc::new(Refresher::new());
        let relay = Rc::new(Relay {
            refresher: refresher.clone(),
            signal: name("y"),
        });
        let b = Probe::new("b", &log);
        refresher
            .register(Rc::<Relay>::downgrade(&relay), names(&["x"]), names(&[]))
            .unwrap();
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&[])).unwrap();

        assert_eq!(refresher.refresh(&name("x")).unwrap(), 2);
        assert_eq!(b.hits.get(), 1);
    }

    #[test]
    fn test_cascade_cycle_is_reported() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        let c = Probe::new("c", &log);
        refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["y"]))
            .unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&["x"]))
            .unwrap();
        refresher.register(Rc::<Probe>::downgrade(&c), names(&["z"]), names(&[])).unwrap();

        match refresher.refresh(&name("x")) {
            Err(CoreError::CascadeCycle(signals)) => assert_eq!(signals, names(&["x", "y"])),
            other => panic!("expected a cascade cycle, got {:?}", other),
        }
        assert!(log.borrow().is_empty());
        // The failed batch does not linger.
        assert_eq!(refresher.refresh(&name("z")).unwrap(), 1);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        refresher.register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&[])).unwrap();
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["x"]), names(&[])).unwrap();
        drop(b);

        assert_eq!(refresher.refresh(&name("x")).unwrap(), 1);
        assert_eq!(refresher.len(), 1);
        assert_eq!(refresher.subscribers(&name("x")).len(), 1);
    }

    #[test]
    fn test_registering_a_dropped_subscriber_fails() {
        let log = Log::default();
        let refresher = Refresher::new();
        let weak = {
            let a = Probe::new("a", &log);
            Rc::downgrade(&a)
        };
        assert!(matches!(
            refresher.register(weak, names(&["x"]), names(&[])),
            Err(CoreError::InvalidRegistration)
        ));
        assert!(refresher.is_empty());
    }

    #[test]
    fn test_register_twice_amends() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let first = refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["p"]))
            .unwrap();
        let second = refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["y"]), names(&["q"]))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(refresher.len(), 1);
        assert_eq!(refresher.triggers(first).unwrap(), names(&["x", "y"]));
        assert_eq!(refresher.cascades(first).unwrap(), names(&["p", "q"]));
    }

    #[test]
    fn test_groups_remove_a_section() {
        let log = Log::default();
        let refresher = Refresher::new();
        let keep = Probe::new("keep", &log);
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        refresher
            .register(Rc::<Probe>::downgrade(&keep), names(&["x"]), names(&[]))
            .unwrap();

        refresher.begin_group();
        let id = refresher.register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&[])).unwrap();
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&[])).unwrap();
        let group = refresher.end_group();
        assert_eq!(group.len(), 2);
        assert!(group.contains(id));

        assert_eq!(refresher.remove_group(&group), 2);
        assert!(!refresher.contains(id));
        assert_eq!(refresher.refresh_many(&names(&["x", "y"])).unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["keep"]);
    }

    #[test]
    fn test_refresh_except_skips_the_origin_but_follows_its_cascades() {
        let log = Log::default();
        let refresher = Refresher::new();
        let editor = Probe::new("editor", &log);
        let sibling = Probe::new("sibling", &log);
        let downstream = Probe::new("downstream", &log);
        let origin = refresher
            .register(Rc::<Probe>::downgrade(&editor), names(&["b"]), names(&["d"]))
            .unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&sibling), names(&["b"]), names(&[]))
            .unwrap();
        refresher
            .register(Rc::<Probe>::downgrade(&downstream), names(&["d"]), names(&[]))
            .unwrap();

        assert_eq!(refresher.refresh_except(&name("b"), origin).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["sibling", "downstream"]);
        assert_eq!(editor.hits.get(), 0);
    }

    #[test]
    fn test_self_cascade_is_not_a_cycle() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["x"]))
            .unwrap();
        assert_eq!(refresher.refresh(&name("x")).unwrap(), 1);
    }

    #[test]
    fn test_refresh_subscriber_follows_cascades() {
        let log = Log::default();
        let refresher = Refresher::new();
        let a = Probe::new("a", &log);
        let b = Probe::new("b", &log);
        let id = refresher
            .register(Rc::<Probe>::downgrade(&a), names(&["x"]), names(&["y"]))
            .unwrap();
        refresher.register(Rc::<Probe>::downgrade(&b), names(&["y"]), names(&[])).unwrap();
        assert_eq!(refresher.refresh_subscriber(id).unwrap(), 2);
        assert!(refresher.unregister(id));
        assert!(!refresher.unregister(id));
    }
}
