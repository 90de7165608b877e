//! Discrete-event simulation clock
//!
//! A min-heap of events keyed by `(due_time, priority, insertion order)`
//! drives time-based expiry: cooldown refreshes, aura expiries, timers.
//! `advance` moves simulated time, `process_events` fires everything
//! due, and callbacks receive the state snapshot and the scheduler so
//! they can mutate state and reschedule.
//!
//! Cancellation is lazy: cancelling removes the event from the active
//! index; its heap entry stays behind and is skipped when popped.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use tracing::{debug, trace};

use crate::state::GameStateSnapshot;

/// Unique identifier for a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

/// What kind of event fired, for logging and stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Timer,
    Cooldown,
    AuraExpire,
    ResourceChange,
    CombatStart,
    CombatEnd,
    Custom,
}

/// Tie-break order for events due at the same time. Lower fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum EventPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

type EventFn = Box<dyn FnMut(&mut GameStateSnapshot, &mut Scheduler)>;

struct ScheduledEvent {
    kind: EventKind,
    due: f64,
    priority: EventPriority,
    /// Re-fire interval; 0 means one-shot
    interval: f64,
    /// Remaining re-insertions after a fire; `None` means unlimited
    repeats: Option<u32>,
    fired: u32,
    callback: EventFn,
}

struct HeapKey {
    due: f64,
    priority: EventPriority,
    seq: u64,
    id: EventId,
}

impl PartialEq for HeapKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapKey {}

impl PartialOrd for HeapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Event counters
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub processed: u64,
    pub cancelled: u64,
}

/// Discrete-event scheduler.
#[derive(Default)]
pub struct Scheduler {
    current_time: f64,
    heap: BinaryHeap<Reverse<HeapKey>>,
    events: HashMap<EventId, ScheduledEvent>,
    next_id: u64,
    seq: u64,
    run_state: RunState,
    max_events_per_tick: usize,
    /// Id of the event whose callback is currently running, so the
    /// callback can cancel its own re-arm
    firing: Option<EventId>,
    firing_cancelled: bool,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            max_events_per_tick: 100,
            ..Default::default()
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }

    pub fn set_max_events_per_tick(&mut self, max: usize) {
        self.max_events_per_tick = max;
    }

    /// Schedule a one-shot event `delay` seconds from now.
    pub fn schedule(
        &mut self,
        kind: EventKind,
        delay: f64,
        priority: EventPriority,
        callback: impl FnMut(&mut GameStateSnapshot, &mut Scheduler) + 'static,
    ) -> EventId {
        self.insert(kind, delay, priority, 0.0, None, Box::new(callback))
    }

    /// Schedule a repeating event. `repeats` limits how many times the
    /// event re-arms after its first fire; `None` repeats without limit.
    pub fn schedule_repeating(
        &mut self,
        kind: EventKind,
        delay: f64,
        interval: f64,
        repeats: Option<u32>,
        priority: EventPriority,
        callback: impl FnMut(&mut GameStateSnapshot, &mut Scheduler) + 'static,
    ) -> EventId {
        self.insert(kind, delay, priority, interval, repeats, Box::new(callback))
    }

    /// One-shot timer with normal priority.
    pub fn schedule_timer(
        &mut self,
        delay: f64,
        callback: impl FnMut(&mut GameStateSnapshot, &mut Scheduler) + 'static,
    ) -> EventId {
        self.schedule(EventKind::Timer, delay, EventPriority::Normal, callback)
    }

    /// Mark a tracked cooldown ready after `delay` seconds.
    pub fn schedule_cooldown(&mut self, ability: &str, delay: f64) -> EventId {
        let name = ability.to_string();
        self.schedule(
            EventKind::Cooldown,
            delay,
            EventPriority::High,
            move |state, _| state.clear_cooldown(&name),
        )
    }

    /// Remove a buff or debuff after `delay` seconds.
    pub fn schedule_aura_expiry(&mut self, aura: &str, delay: f64, debuff: bool) -> EventId {
        let name = aura.to_string();
        self.schedule(
            EventKind::AuraExpire,
            delay,
            EventPriority::High,
            move |state, _| {
                if debuff {
                    state.remove_debuff(&name)
                } else {
                    state.remove_buff(&name)
                }
            },
        )
    }

    fn insert(
        &mut self,
        kind: EventKind,
        delay: f64,
        priority: EventPriority,
        interval: f64,
        repeats: Option<u32>,
        callback: EventFn,
    ) -> EventId {
        self.next_id += 1;
        let id = EventId(self.next_id);
        let due = self.current_time + delay;
        self.events.insert(
            id,
            ScheduledEvent {
                kind,
                due,
                priority,
                interval,
                repeats,
                fired: 0,
                callback,
            },
        );
        self.push_key(id, due, priority);
        self.stats.scheduled += 1;
        trace!(?id, ?kind, due, "event scheduled");
        id
    }

    fn push_key(&mut self, id: EventId, due: f64, priority: EventPriority) {
        self.seq += 1;
        self.heap.push(Reverse(HeapKey {
            due,
            priority,
            seq: self.seq,
            id,
        }));
    }

    /// Cancel a pending event. Returns false if it already fired out or
    /// was cancelled before. Cancelling the event whose callback is
    /// currently running suppresses its re-arm.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if self.firing == Some(id) && !self.firing_cancelled {
            self.firing_cancelled = true;
            self.stats.cancelled += 1;
            return true;
        }
        if self.events.remove(&id).is_some() {
            self.stats.cancelled += 1;
            true
        } else {
            false
        }
    }

    /// Advance simulated time. Does nothing while paused.
    pub fn advance(&mut self, dt: f64) {
        if self.run_state == RunState::Paused {
            return;
        }
        self.current_time += dt;
    }

    /// Fire every event due at or before the current time, capped per
    /// tick to avoid starvation. Ties break by priority, then by
    /// insertion order.
    pub fn process_events(&mut self, state: &mut GameStateSnapshot) -> usize {
        if self.run_state == RunState::Paused {
            return 0;
        }

        let mut fired = 0;
        let mut popped = 0;
        while popped < self.max_events_per_tick {
            match self.heap.peek() {
                Some(Reverse(key)) if key.due <= self.current_time => {}
                _ => break,
            }
            let Some(Reverse(key)) = self.heap.pop() else {
                break;
            };
            popped += 1;

            // Lazy deletion: a cancelled event's heap entry is skipped
            let Some(mut event) = self.events.remove(&key.id) else {
                continue;
            };

            self.firing = Some(key.id);
            self.firing_cancelled = false;
            (event.callback)(state, self);
            let cancelled = self.firing_cancelled;
            self.firing = None;
            self.firing_cancelled = false;

            event.fired += 1;
            fired += 1;
            self.stats.processed += 1;
            trace!(id = ?key.id, kind = ?event.kind, time = self.current_time, "event fired");

            let rearm = !cancelled
                && event.interval > 0.0
                && match event.repeats {
                    Some(0) => false,
                    Some(ref mut n) => {
                        *n -= 1;
                        true
                    }
                    None => true,
                };
            if rearm {
                event.due = self.current_time + event.interval;
                self.push_key(key.id, event.due, event.priority);
                self.events.insert(key.id, event);
            }
        }

        fired
    }

    /// Advance then process: one scheduler clock cycle.
    pub fn tick(&mut self, dt: f64, state: &mut GameStateSnapshot) -> usize {
        self.advance(dt);
        self.process_events(state)
    }

    /// Run for `duration` simulated seconds at the given tick rate,
    /// stopping early when no events remain.
    pub fn run_for(
        &mut self,
        duration: f64,
        tick_rate: f64,
        state: &mut GameStateSnapshot,
    ) -> SchedulerStats {
        self.run_state = RunState::Running;
        let start = self.current_time;
        while self.run_state == RunState::Running && self.current_time - start < duration {
            self.tick(tick_rate, state);
            if self.heap.is_empty() {
                break;
            }
        }
        self.run_state = RunState::Stopped;
        debug!(
            processed = self.stats.processed,
            time = self.current_time,
            "scheduler run finished"
        );
        self.stats
    }

    pub fn start(&mut self) {
        self.run_state = RunState::Running;
    }

    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            self.run_state = RunState::Running;
        }
    }

    pub fn stop(&mut self) {
        self.run_state = RunState::Stopped;
    }

    /// Clear the clock, the queue and the stats.
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.heap.clear();
        self.events.clear();
        self.next_id = 0;
        self.seq = 0;
        self.run_state = RunState::Stopped;
        self.firing = None;
        self.firing_cancelled = false;
        self.stats = SchedulerStats::default();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> EventFn) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |tag: &'static str| -> EventFn {
                let log = log.clone();
                Box::new(move |_: &mut GameStateSnapshot, _: &mut Scheduler| {
                    log.borrow_mut().push(tag);
                })
            }
        };
        (log, make)
    }

    #[test]
    fn test_events_fire_in_time_order() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        let (log, make) = recorder();
        let mut second = make("second");
        let mut first = make("first");
        scheduler.schedule(EventKind::Timer, 2.0, EventPriority::Normal, move |s, sc| {
            second(s, sc)
        });
        scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Normal, move |s, sc| {
            first(s, sc)
        });
        scheduler.run_for(3.0, 0.1, &mut state);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_same_time_ties_break_by_priority_then_order() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        let (log, make) = recorder();
        let mut low = make("low");
        let mut a = make("a");
        let mut b = make("b");
        scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Low, move |s, sc| {
            low(s, sc)
        });
        scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Normal, move |s, sc| {
            a(s, sc)
        });
        scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Normal, move |s, sc| {
            b(s, sc)
        });
        scheduler.run_for(2.0, 0.5, &mut state);
        assert_eq!(*log.borrow(), vec!["a", "b", "low"]);
    }

    #[test]
    fn test_repeating_event_fires_three_times_in_3_5_seconds() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        state.take_changed();
        scheduler.schedule_repeating(
            EventKind::Timer,
            1.0,
            1.0,
            None,
            EventPriority::Normal,
            |state, _| {
                let n = state.variables["fires"];
                state.set_variable("fires", n + 1.0);
            },
        );
        scheduler.run_for(3.5, 0.1, &mut state);
        assert_eq!(state.variables["fires"], 3.0);
    }

    #[test]
    fn test_repeat_budget_limits_fires() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        scheduler.schedule_repeating(
            EventKind::Timer,
            1.0,
            1.0,
            Some(1),
            EventPriority::Normal,
            |state, _| {
                let n = state.variables["fires"];
                state.set_variable("fires", n + 1.0);
            },
        );
        scheduler.run_for(10.0, 0.1, &mut state);
        assert_eq!(state.variables["fires"], 2.0);
    }

    #[test]
    fn test_cancelled_event_never_fires() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        let (log, make) = recorder();
        let mut cb = make("boom");
        let id = scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Normal, move |s, sc| {
            cb(s, sc)
        });
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        scheduler.run_for(3.0, 0.1, &mut state);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_repeating_event_can_cancel_itself() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        let own_id = Rc::new(Cell::new(None));
        let slot = own_id.clone();
        let id = scheduler.schedule_repeating(
            EventKind::Timer,
            1.0,
            1.0,
            None,
            EventPriority::Normal,
            move |state, sched| {
                let n = state.variables["fires"];
                state.set_variable("fires", n + 1.0);
                if let Some(id) = slot.get() {
                    assert!(sched.cancel(id));
                    // a second cancel of the same event is a no-op
                    assert!(!sched.cancel(id));
                }
            },
        );
        own_id.set(Some(id));
        scheduler.run_for(5.0, 0.1, &mut state);
        assert_eq!(state.variables["fires"], 1.0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.stats().cancelled, 1);
    }

    #[test]
    fn test_callbacks_can_reschedule() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        scheduler.schedule(EventKind::Custom, 1.0, EventPriority::Normal, |state, sched| {
            let n = state.variables["fires"];
            state.set_variable("fires", n + 1.0);
            sched.schedule(EventKind::Custom, 1.0, EventPriority::Normal, |state, _| {
                let n = state.variables["fires"];
                state.set_variable("fires", n + 1.0);
            });
        });
        scheduler.run_for(5.0, 0.1, &mut state);
        assert_eq!(state.variables["fires"], 2.0);
    }

    #[test]
    fn test_cooldown_and_aura_events_touch_state() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_cooldown("aimed_shot", 2.0);
        state.apply_buff("haste", 99.0, 1, 1);
        state.take_changed();

        scheduler.schedule_cooldown("aimed_shot", 2.0);
        scheduler.schedule_aura_expiry("haste", 1.0, false);
        scheduler.run_for(3.0, 0.1, &mut state);

        assert_eq!(state.cooldowns["aimed_shot"].ready(), 1.0);
        assert!(!state.buffs.contains_key("haste"));
        let changed = state.take_changed();
        assert!(changed.contains("cooldown.aimed_shot"));
        assert!(changed.contains("buff.haste"));
    }

    #[test]
    fn test_per_tick_cap_defers_excess_events() {
        let mut scheduler = Scheduler::new();
        scheduler.set_max_events_per_tick(2);
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        for _ in 0..5 {
            scheduler.schedule(EventKind::Timer, 0.5, EventPriority::Normal, |state, _| {
                let n = state.variables["fires"];
                state.set_variable("fires", n + 1.0);
            });
        }
        scheduler.advance(1.0);
        assert_eq!(scheduler.process_events(&mut state), 2);
        assert_eq!(scheduler.process_events(&mut state), 2);
        assert_eq!(scheduler.process_events(&mut state), 1);
        assert_eq!(state.variables["fires"], 5.0);
    }

    #[test]
    fn test_pause_blocks_time_and_events() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        state.set_variable("fires", 0.0);
        scheduler.schedule(EventKind::Timer, 1.0, EventPriority::Normal, |state, _| {
            let n = state.variables["fires"];
            state.set_variable("fires", n + 1.0);
        });
        scheduler.start();
        scheduler.pause();
        scheduler.advance(2.0);
        assert_eq!(scheduler.process_events(&mut state), 0);
        assert_eq!(scheduler.current_time(), 0.0);
        scheduler.resume();
        scheduler.tick(2.0, &mut state);
        assert_eq!(state.variables["fires"], 1.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut scheduler = Scheduler::new();
        let mut state = GameStateSnapshot::new();
        scheduler.schedule_timer(1.0, |_, _| {});
        scheduler.advance(0.5);
        scheduler.reset();
        assert_eq!(scheduler.current_time(), 0.0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.tick(2.0, &mut state), 0);
    }
}
