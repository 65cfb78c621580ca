//! The coordinator's task table.
//!
//! [`Scheduler`] is a plain synchronous data structure. It does no locking and
//! reads no clock: callers serialize access (the coordinator keeps it behind a
//! single mutex) and pass `now` into the operations that care about time. That
//! keeps every scheduling decision a cheap, deterministic scan over at most
//! `M + R` task records.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

/// Lifecycle of a single task.
///
/// `Pending -> Running -> Done`, with `Running -> Pending` whenever the task
/// stalls. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running { assigned_at: Instant },
    Done,
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub kind: TaskKind,
    pub id: u32,
    /// Input filename for map tasks, bucket index for reduce tasks.
    pub payload: String,
    pub state: TaskState,
    /// Bumped on every (re)assignment.
    pub generation: u64,
}

impl TaskRecord {
    fn new(kind: TaskKind, id: u32, payload: String) -> Self {
        Self {
            kind,
            id,
            payload,
            state: TaskState::Pending,
            generation: 0,
        }
    }

    fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }
}

/// A unit of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub kind: TaskKind,
    pub id: u32,
    pub payload: String,
    pub generation: u64,
}

/// The answer to a worker asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Run(TaskSpec),
    /// Nothing is pending but something is still running. Ask again later.
    Wait,
    /// Every task is done.
    Exit,
}

/// Outcome of a completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The task went from Running to Done.
    Accepted,
    /// The task was not Running (already Done, or reclaimed and not yet
    /// reassigned). Nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub n_map: u32,
    pub n_reduce: u32,
}

/// Per-phase task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub map_total: u32,
    pub map_done: u32,
    pub map_running: u32,
    pub reduce_total: u32,
    pub reduce_done: u32,
    pub reduce_running: u32,
}

impl Progress {
    pub fn is_done(&self) -> bool {
        self.map_done == self.map_total && self.reduce_done == self.reduce_total
    }
}

#[derive(Debug)]
pub struct Scheduler {
    map_tasks: Vec<TaskRecord>,
    reduce_tasks: Vec<TaskRecord>,
    undone_maps: usize,
    undone_reduces: usize,
    stall_timeout: Duration,
}

impl Scheduler {
    /// Creates one map task per input file (ids follow `files` order) and
    /// `n_reduce` reduce tasks.
    pub fn new(files: Vec<String>, n_reduce: u32, stall_timeout: Duration) -> Self {
        let map_tasks: Vec<TaskRecord> = files
            .into_iter()
            .enumerate()
            .map(|(id, file)| TaskRecord::new(TaskKind::Map, id as u32, file))
            .collect();
        let reduce_tasks: Vec<TaskRecord> = (0..n_reduce)
            .map(|bucket| TaskRecord::new(TaskKind::Reduce, bucket, bucket.to_string()))
            .collect();

        Self {
            undone_maps: map_tasks.len(),
            undone_reduces: reduce_tasks.len(),
            map_tasks,
            reduce_tasks,
            stall_timeout,
        }
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            n_map: self.map_tasks.len() as u32,
            n_reduce: self.reduce_tasks.len() as u32,
        }
    }

    /// Picks the next task to run.
    ///
    /// Map tasks go first. No reduce task is handed out until every map task
    /// is done, since each reduce reads the output of every map.
    pub fn get_task(&mut self, now: Instant) -> Assignment {
        if self.undone_maps > 0 {
            return match assign_pending(&mut self.map_tasks, now) {
                Some(spec) => Assignment::Run(spec),
                None => Assignment::Wait,
            };
        }

        if self.undone_reduces > 0 {
            return match assign_pending(&mut self.reduce_tasks, now) {
                Some(spec) => Assignment::Run(spec),
                None => Assignment::Wait,
            };
        }

        Assignment::Exit
    }

    /// Marks a running task as done.
    ///
    /// Reports for tasks that are not running are ignored, which is what keeps
    /// a reclaimed task's original worker from being counted twice. Only an id
    /// outside the job is an error.
    pub fn complete_task(&mut self, kind: TaskKind, id: u32) -> Result<Completion> {
        let (tasks, undone) = match kind {
            TaskKind::Map => (&mut self.map_tasks, &mut self.undone_maps),
            TaskKind::Reduce => (&mut self.reduce_tasks, &mut self.undone_reduces),
        };

        let Some(task) = tasks.get_mut(id as usize) else {
            bail!("no {} task with id {} (job has {})", kind, id, tasks.len());
        };

        if !task.is_running() {
            debug!(
                "ignoring completion of {} task {} in state {:?}",
                kind, id, task.state
            );
            return Ok(Completion::Ignored);
        }

        task.state = TaskState::Done;
        *undone -= 1;
        info!(
            "{} task {} done (generation {}), {} {} task(s) left",
            kind, id, task.generation, undone, kind
        );

        if kind == TaskKind::Map && self.undone_maps == 0 {
            info!("all map tasks done, reduce phase may start");
        }

        Ok(Completion::Accepted)
    }

    /// Reverts every task that has been running for longer than the stall
    /// timeout to pending, so the next `get_task` hands it to another worker.
    ///
    /// Returns the reclaimed tasks.
    pub fn reclaim_stalled(&mut self, now: Instant) -> Vec<(TaskKind, u32)> {
        let timeout = self.stall_timeout;
        let mut reclaimed = Vec::new();

        for task in self.map_tasks.iter_mut().chain(self.reduce_tasks.iter_mut()) {
            if let TaskState::Running { assigned_at } = task.state {
                let elapsed = now.saturating_duration_since(assigned_at);
                if elapsed > timeout {
                    warn!(
                        "{} task {} (generation {}) stalled for {:?}, reclaiming",
                        task.kind, task.id, task.generation, elapsed
                    );
                    task.state = TaskState::Pending;
                    reclaimed.push((task.kind, task.id));
                }
            }
        }

        reclaimed
    }

    pub fn is_job_done(&self) -> bool {
        self.undone_maps == 0 && self.undone_reduces == 0
    }

    pub fn progress(&self) -> Progress {
        fn count(tasks: &[TaskRecord], want: fn(&TaskRecord) -> bool) -> u32 {
            tasks.iter().filter(|&t| want(t)).count() as u32
        }
        fn done(task: &TaskRecord) -> bool {
            task.state == TaskState::Done
        }

        Progress {
            map_total: self.map_tasks.len() as u32,
            map_done: count(&self.map_tasks, done),
            map_running: count(&self.map_tasks, TaskRecord::is_running),
            reduce_total: self.reduce_tasks.len() as u32,
            reduce_done: count(&self.reduce_tasks, done),
            reduce_running: count(&self.reduce_tasks, TaskRecord::is_running),
        }
    }

    #[cfg(test)]
    fn task(&self, kind: TaskKind, id: u32) -> Option<&TaskRecord> {
        match kind {
            TaskKind::Map => self.map_tasks.get(id as usize),
            TaskKind::Reduce => self.reduce_tasks.get(id as usize),
        }
    }
}

/// Assigns the first pending task in `tasks`, if any.
fn assign_pending(tasks: &mut [TaskRecord], now: Instant) -> Option<TaskSpec> {
    let task = tasks.iter_mut().find(|t| t.state == TaskState::Pending)?;

    task.state = TaskState::Running { assigned_at: now };
    task.generation += 1;

    Some(TaskSpec {
        kind: task.kind,
        id: task.id,
        payload: task.payload.clone(),
        generation: task.generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn files(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("input-{i}.txt")).collect()
    }

    fn expect_run(assignment: Assignment) -> TaskSpec {
        match assignment {
            Assignment::Run(spec) => spec,
            other => panic!("expected a task, got {:?}", other),
        }
    }

    #[test]
    fn hands_out_every_map_task_once() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(files(3), 2, TIMEOUT);

        let mut seen = HashSet::new();
        for _ in 0..3 {
            let spec = expect_run(scheduler.get_task(now));
            assert_eq!(spec.kind, TaskKind::Map);
            assert_eq!(spec.payload, format!("input-{}.txt", spec.id));
            assert_eq!(spec.generation, 1);
            assert!(seen.insert(spec.id));
        }
        assert_eq!(scheduler.get_task(now), Assignment::Wait);
    }

    #[test]
    fn reduce_waits_for_every_map() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(files(2), 3, TIMEOUT);

        let first = expect_run(scheduler.get_task(now));
        let second = expect_run(scheduler.get_task(now));

        scheduler.complete_task(TaskKind::Map, first.id).unwrap();
        // One map is still running: the barrier holds.
        assert_eq!(scheduler.get_task(now), Assignment::Wait);

        scheduler.complete_task(TaskKind::Map, second.id).unwrap();
        let reduce = expect_run(scheduler.get_task(now));
        assert_eq!(reduce.kind, TaskKind::Reduce);
        assert_eq!(reduce.payload, reduce.id.to_string());
    }

    #[test]
    fn exits_once_everything_is_done() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 2, TIMEOUT);

        let map = expect_run(scheduler.get_task(now));
        scheduler.complete_task(map.kind, map.id).unwrap();

        let r0 = expect_run(scheduler.get_task(now));
        let r1 = expect_run(scheduler.get_task(now));
        assert_eq!(scheduler.get_task(now), Assignment::Wait);
        assert!(!scheduler.is_job_done());

        scheduler.complete_task(r0.kind, r0.id).unwrap();
        scheduler.complete_task(r1.kind, r1.id).unwrap();

        assert!(scheduler.is_job_done());
        assert_eq!(scheduler.get_task(now), Assignment::Exit);
        assert_eq!(scheduler.get_task(now), Assignment::Exit);
    }

    #[test]
    fn completion_is_accepted_once() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);
        let map = expect_run(scheduler.get_task(now));

        assert_eq!(
            scheduler.complete_task(TaskKind::Map, map.id).unwrap(),
            Completion::Accepted
        );
        assert_eq!(
            scheduler.complete_task(TaskKind::Map, map.id).unwrap(),
            Completion::Ignored
        );
        assert_eq!(scheduler.progress().map_done, 1);
        // The reduce task is handed out exactly as if the duplicate never came.
        assert_eq!(expect_run(scheduler.get_task(now)).kind, TaskKind::Reduce);
    }

    #[test]
    fn completing_a_pending_task_is_ignored() {
        let mut scheduler = Scheduler::new(files(2), 1, TIMEOUT);

        assert_eq!(
            scheduler.complete_task(TaskKind::Map, 1).unwrap(),
            Completion::Ignored
        );
        assert_eq!(scheduler.progress().map_done, 0);
        assert!(!scheduler.is_job_done());
    }

    #[test]
    fn unknown_task_id_is_an_error() {
        let mut scheduler = Scheduler::new(files(2), 2, TIMEOUT);

        assert!(scheduler.complete_task(TaskKind::Map, 2).is_err());
        assert!(scheduler.complete_task(TaskKind::Reduce, 7).is_err());
        assert_eq!(scheduler.progress(), Scheduler::new(files(2), 2, TIMEOUT).progress());
    }

    #[test]
    fn stalled_task_is_reclaimed_and_reassigned() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);

        let first = expect_run(scheduler.get_task(start));
        assert_eq!(scheduler.get_task(start), Assignment::Wait);

        // Not stalled yet.
        assert!(scheduler.reclaim_stalled(start + TIMEOUT).is_empty());

        let later = start + TIMEOUT + Duration::from_millis(1);
        assert_eq!(scheduler.reclaim_stalled(later), vec![(TaskKind::Map, first.id)]);
        assert_eq!(scheduler.task(TaskKind::Map, 0).unwrap().state, TaskState::Pending);

        let second = expect_run(scheduler.get_task(later));
        assert_eq!(second.id, first.id);
        assert_eq!(second.generation, first.generation + 1);
    }

    #[test]
    fn late_report_from_reclaimed_worker_is_not_double_counted() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);

        let stale = expect_run(scheduler.get_task(start));
        let later = start + TIMEOUT * 2;
        scheduler.reclaim_stalled(later);
        let fresh = expect_run(scheduler.get_task(later));

        // The new attempt finishes first.
        assert_eq!(
            scheduler.complete_task(fresh.kind, fresh.id).unwrap(),
            Completion::Accepted
        );
        // The stalled-but-alive worker reports afterwards.
        assert_eq!(
            scheduler.complete_task(stale.kind, stale.id).unwrap(),
            Completion::Ignored
        );

        let progress = scheduler.progress();
        assert_eq!(progress.map_done, 1);
        assert_eq!(progress.map_running, 0);
    }

    #[test]
    fn report_between_reclaim_and_reassignment_is_ignored() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);

        let stale = expect_run(scheduler.get_task(start));
        scheduler.reclaim_stalled(start + TIMEOUT * 2);

        assert_eq!(
            scheduler.complete_task(stale.kind, stale.id).unwrap(),
            Completion::Ignored
        );
        // Still pending, so it is handed out again.
        assert_eq!(expect_run(scheduler.get_task(start + TIMEOUT * 2)).id, stale.id);
    }

    #[test]
    fn done_tasks_are_never_reclaimed() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);

        let map = expect_run(scheduler.get_task(start));
        scheduler.complete_task(map.kind, map.id).unwrap();

        assert!(scheduler.reclaim_stalled(start + TIMEOUT * 100).is_empty());
        assert_eq!(scheduler.task(TaskKind::Map, 0).unwrap().state, TaskState::Done);
    }

    #[test]
    fn reclaim_may_repeat() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);
        let mut now = start;

        for attempt in 1..=4 {
            let spec = expect_run(scheduler.get_task(now));
            assert_eq!(spec.generation, attempt);
            now += TIMEOUT * 2;
            assert_eq!(scheduler.reclaim_stalled(now).len(), 1);
        }
    }

    #[test]
    fn stalled_reduce_is_reclaimed_too() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new(files(1), 1, TIMEOUT);

        let map = expect_run(scheduler.get_task(start));
        scheduler.complete_task(map.kind, map.id).unwrap();
        let reduce = expect_run(scheduler.get_task(start));

        let later = start + TIMEOUT * 2;
        assert_eq!(scheduler.reclaim_stalled(later), vec![(TaskKind::Reduce, reduce.id)]);
        assert_eq!(expect_run(scheduler.get_task(later)).id, reduce.id);
    }

    #[test]
    fn empty_input_goes_straight_to_reduce() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(Vec::new(), 2, TIMEOUT);

        assert_eq!(
            scheduler.metadata(),
            Metadata {
                n_map: 0,
                n_reduce: 2
            }
        );
        assert_eq!(expect_run(scheduler.get_task(now)).kind, TaskKind::Reduce);
    }

    #[test]
    fn progress_tracks_each_phase() {
        let now = Instant::now();
        let mut scheduler = Scheduler::new(files(3), 2, TIMEOUT);

        let a = expect_run(scheduler.get_task(now));
        let _b = expect_run(scheduler.get_task(now));
        scheduler.complete_task(a.kind, a.id).unwrap();

        let progress = scheduler.progress();
        assert_eq!(
            progress,
            Progress {
                map_total: 3,
                map_done: 1,
                map_running: 1,
                reduce_total: 2,
                reduce_done: 0,
                reduce_running: 0,
            }
        );
        assert!(!progress.is_done());
    }

    #[test]
    fn concurrent_callers_never_share_a_task() {
        let scheduler = Arc::new(Mutex::new(Scheduler::new(files(64), 8, TIMEOUT)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                thread::spawn(move || {
                    let mut mine = Vec::new();
                    loop {
                        let assignment = scheduler.lock().unwrap().get_task(Instant::now());
                        match assignment {
                            Assignment::Run(spec) => {
                                mine.push((spec.kind, spec.id));
                                scheduler
                                    .lock()
                                    .unwrap()
                                    .complete_task(spec.kind, spec.id)
                                    .unwrap();
                            }
                            Assignment::Wait => thread::yield_now(),
                            Assignment::Exit => return mine,
                        }
                    }
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), 64 + 8);
        assert_eq!(unique.len(), all.len());
        assert!(scheduler.lock().unwrap().is_job_done());
    }
}
