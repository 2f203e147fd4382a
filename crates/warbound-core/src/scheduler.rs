//! Cooperative task scheduler — the library's substitute for blocking
//! waits.
//!
//! Deferral is always expressed by queuing a task for a later tick. Tasks
//! are a closed enum rather than closures so a session snapshot stays
//! fully serializable (no live callback handles may survive save/load).
//! Tasks due at the same instant run in registration order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use warbound_logic::ids::{GroupId, ObjectId};

/// Everything the scheduler can be asked to do later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Task {
    /// Re-run the tactics tick for one group (instant order application).
    TacticsForGroup(GroupId),
    /// Try to launch the next queued transport for a player.
    DispatchTransport { player: u8 },
    /// The in-flight transport for a player touches down.
    LandTransport { player: u8 },
    /// Spawn the next VTOL raid wave for a player.
    SpawnVtolWave { player: u8 },
    /// Check whether the VTOL stop object is gone.
    VtolStopCheck { player: u8 },
    /// A managed factory finishes its current unit.
    ProduceUnit { factory: ObjectId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Scheduled {
    due_at: u64,
    seq: u64,
    task: Task,
    /// Re-queue this many milliseconds after firing, for repeating timers.
    repeat_ms: Option<u64>,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_at
            .cmp(&other.due_at)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of scheduled tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot: run `task` once, `delay_ms` from `now_ms`.
    pub fn queue_task(&mut self, task: Task, delay_ms: u64, now_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due_at: now_ms + delay_ms,
            seq,
            task,
            repeat_ms: None,
        }));
    }

    /// Repeating: run `task` every `every_ms`, first firing one period
    /// from `now_ms`.
    pub fn set_timer(&mut self, task: Task, every_ms: u64, now_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due_at: now_ms + every_ms,
            seq,
            task,
            repeat_ms: Some(every_ms),
        }));
    }

    /// Drop every pending entry (one-shot or repeating) equal to `task`.
    pub fn remove_timer(&mut self, task: &Task) {
        let kept: Vec<Reverse<Scheduled>> = self
            .heap
            .drain()
            .filter(|Reverse(s)| &s.task != task)
            .collect();
        self.heap = kept.into_iter().collect();
    }

    /// Pop the next task due at or before `now_ms`. Repeating timers are
    /// re-queued before being returned.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Task> {
        match self.heap.peek() {
            Some(Reverse(s)) if s.due_at <= now_ms => {}
            _ => return None,
        }
        let Reverse(fired) = self.heap.pop().expect("peeked entry exists");
        if let Some(every_ms) = fired.repeat_ms {
            let seq = self.next_seq;
            self.next_seq += 1;
            self.heap.push(Reverse(Scheduled {
                due_at: fired.due_at + every_ms,
                seq,
                task: fired.task.clone(),
                repeat_ms: Some(every_ms),
            }));
        }
        Some(fired.task)
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_among_simultaneous() {
        let mut sched = Scheduler::new();
        sched.queue_task(Task::DispatchTransport { player: 1 }, 100, 0);
        sched.queue_task(Task::DispatchTransport { player: 2 }, 100, 0);
        sched.queue_task(Task::DispatchTransport { player: 3 }, 50, 0);

        assert_eq!(sched.pop_due(99), Some(Task::DispatchTransport { player: 3 }));
        assert_eq!(sched.pop_due(99), None);
        assert_eq!(sched.pop_due(100), Some(Task::DispatchTransport { player: 1 }));
        assert_eq!(sched.pop_due(100), Some(Task::DispatchTransport { player: 2 }));
        assert_eq!(sched.pop_due(1000), None);
    }

    #[test]
    fn test_repeating_timer_requeues() {
        let mut sched = Scheduler::new();
        sched.set_timer(Task::SpawnVtolWave { player: 4 }, 1000, 0);

        assert_eq!(sched.pop_due(500), None);
        assert_eq!(sched.pop_due(1000), Some(Task::SpawnVtolWave { player: 4 }));
        assert_eq!(sched.pop_due(1999), None);
        assert_eq!(sched.pop_due(2000), Some(Task::SpawnVtolWave { player: 4 }));
    }

    #[test]
    fn test_remove_timer() {
        let mut sched = Scheduler::new();
        sched.set_timer(Task::SpawnVtolWave { player: 4 }, 1000, 0);
        sched.queue_task(Task::VtolStopCheck { player: 4 }, 1000, 0);
        sched.remove_timer(&Task::SpawnVtolWave { player: 4 });

        assert_eq!(sched.pop_due(5000), Some(Task::VtolStopCheck { player: 4 }));
        assert_eq!(sched.pop_due(5000), None);
    }
}
