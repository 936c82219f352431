//! The synchronous task registry: the coordinator's entire mutable state.
//!
//! `TaskRegistry` has no knowledge of RPC or tokio — [`crate::service`]
//! wraps one behind a `std::sync::Mutex` and does nothing else inside the
//! critical section, the same split `kvsrv::state`/`kvsrv::service` use.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Default task deadline: long enough to outlast any reasonable task
/// execution plus RPC slack.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Reduce-only pre-state: not yet assignable because some map task is
    /// still outstanding.
    Gated,
    Idle,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Map tasks: the input file path. Reduce tasks: unused.
    pub input_path: Option<PathBuf>,
    /// Reduce tasks: the bucket index in `[0, R)`. Map tasks: unused.
    pub bucket: Option<u32>,
    pub owner: Option<String>,
    pub deadline: Option<Instant>,
}

/// What [`TaskRegistry::get_task`] hands back to a polling worker.
#[derive(Debug, Clone)]
pub enum Assignment {
    Map { task_id: String, input_path: PathBuf, n_reduce: u32 },
    Reduce { task_id: String, bucket: u32 },
    Wait,
    Exit,
}

/// The set of Map and Reduce tasks for one job, plus the mutex-free logic
/// that assigns, times out, and completes them.
pub struct TaskRegistry {
    tasks: Vec<Task>,
    n_reduce: u32,
    task_timeout: Duration,
}

impl TaskRegistry {
    pub fn new(input_files: Vec<PathBuf>, n_reduce: u32) -> Self {
        Self::with_timeout(input_files, n_reduce, DEFAULT_TASK_TIMEOUT)
    }

    pub fn with_timeout(input_files: Vec<PathBuf>, n_reduce: u32, task_timeout: Duration) -> Self {
        let mut tasks = Vec::with_capacity(input_files.len() + n_reduce as usize);

        for (i, path) in input_files.into_iter().enumerate() {
            tasks.push(Task {
                id: format!("map-{i}"),
                kind: TaskKind::Map,
                status: TaskStatus::Idle,
                input_path: Some(path),
                bucket: None,
                owner: None,
                deadline: None,
            });
        }

        for b in 0..n_reduce {
            tasks.push(Task {
                id: format!("reduce-{b}"),
                kind: TaskKind::Reduce,
                status: TaskStatus::Gated,
                input_path: None,
                bucket: Some(b),
                owner: None,
                deadline: None,
            });
        }

        Self {
            tasks,
            n_reduce,
            task_timeout,
        }
    }

    fn all_maps_done(&self) -> bool {
        self.tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Map)
            .all(|t| t.status == TaskStatus::Done)
    }

    /// Reclaims any InProgress task whose deadline has passed: its owner is
    /// presumed dead and the task returns to Idle. This is the coordinator's
    /// sole failure detector.
    fn sweep_expired(&mut self, now: Instant) {
        for task in &mut self.tasks {
            if task.status == TaskStatus::InProgress {
                if let Some(deadline) = task.deadline {
                    if now >= deadline {
                        tracing::warn!(task_id = %task.id, owner = ?task.owner, "task deadline expired, reclaiming");
                        task.status = TaskStatus::Idle;
                        task.owner = None;
                        task.deadline = None;
                    }
                }
            }
        }
    }

    /// Assigns the next task to a polling worker, in order: sweep expired
    /// tasks, assign an idle map, open the reduce gate and assign an idle
    /// reduce once every map is done, or report Exit/Wait.
    pub fn get_task(&mut self, worker_id: &str, now: Instant) -> Assignment {
        self.sweep_expired(now);

        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.kind == TaskKind::Map && t.status == TaskStatus::Idle)
        {
            task.status = TaskStatus::InProgress;
            task.owner = Some(worker_id.to_string());
            task.deadline = Some(now + self.task_timeout);
            return Assignment::Map {
                task_id: task.id.clone(),
                input_path: task.input_path.clone().expect("map task has input_path"),
                n_reduce: self.n_reduce,
            };
        }

        if self.all_maps_done() {
            for task in &mut self.tasks {
                if task.kind == TaskKind::Reduce && task.status == TaskStatus::Gated {
                    task.status = TaskStatus::Idle;
                }
            }

            if let Some(task) = self
                .tasks
                .iter_mut()
                .find(|t| t.kind == TaskKind::Reduce && t.status == TaskStatus::Idle)
            {
                task.status = TaskStatus::InProgress;
                task.owner = Some(worker_id.to_string());
                task.deadline = Some(now + self.task_timeout);
                return Assignment::Reduce {
                    task_id: task.id.clone(),
                    bucket: task.bucket.expect("reduce task has bucket"),
                };
            }
        }

        if self.tasks.iter().all(|t| t.status == TaskStatus::Done) {
            return Assignment::Exit;
        }

        Assignment::Wait
    }

    /// Marks `task_id` Done iff it is currently InProgress and owned by
    /// `worker_id` — a stale completion from a reassigned task is ignored.
    pub fn job_finish(&mut self, worker_id: &str, task_id: &str) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            if task.status == TaskStatus::InProgress && task.owner.as_deref() == Some(worker_id) {
                task.status = TaskStatus::Done;
                task.owner = None;
                task.deadline = None;
            } else {
                tracing::debug!(task_id, worker_id, "ignoring stale job-finish");
            }
        }
    }

    /// True iff every task — map and reduce — is Done.
    pub fn done(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("f{i}.txt"))).collect()
    }

    #[test]
    fn single_map_task_is_assigned_then_exit_after_done() {
        let mut reg = TaskRegistry::new(files(1), 0);
        let now = Instant::now();

        let a = reg.get_task("w1", now);
        let task_id = match a {
            Assignment::Map { task_id, n_reduce, .. } => {
                assert_eq!(n_reduce, 0);
                task_id
            }
            other => panic!("expected Map, got {:?}", other),
        };

        reg.job_finish("w1", &task_id);
        assert!(reg.done());
        assert!(matches!(reg.get_task("w1", now), Assignment::Exit));
    }

    /// No reduce task enters InProgress while any map task is not Done.
    #[test]
    fn reduce_is_gated_until_all_maps_done() {
        let mut reg = TaskRegistry::new(files(2), 1);
        let now = Instant::now();

        let a1 = match reg.get_task("w1", now) {
            Assignment::Map { task_id, .. } => task_id,
            other => panic!("expected Map, got {:?}", other),
        };

        // second map still outstanding: only Wait is possible, never Reduce.
        assert!(matches!(reg.get_task("w2", now), Assignment::Wait));

        reg.job_finish("w1", &a1);

        let a2 = match reg.get_task("w2", now) {
            Assignment::Map { task_id, .. } => task_id,
            other => panic!("expected second Map, got {:?}", other),
        };
        reg.job_finish("w2", &a2);

        // both maps Done now: reduce becomes assignable.
        assert!(matches!(reg.get_task("w1", now), Assignment::Reduce { .. }));
    }

    /// A straggler's task is reassigned after its deadline passes, and its
    /// late JobFinish is ignored.
    #[test]
    fn expired_task_is_reassigned_and_stale_finish_is_ignored() {
        let mut reg = TaskRegistry::with_timeout(files(1), 1, Duration::from_millis(10));
        let t0 = Instant::now();

        let a1 = match reg.get_task("w1", t0) {
            Assignment::Map { task_id, .. } => task_id,
            other => panic!("expected Map, got {:?}", other),
        };

        let after_deadline = t0 + Duration::from_millis(50);
        let a2 = match reg.get_task("w2", after_deadline) {
            Assignment::Map { task_id, .. } => task_id,
            other => panic!("expected reassigned Map, got {:?}", other),
        };
        assert_eq!(a1, a2, "the same logical task is handed to the new worker");

        // w1's stale completion must not resurrect its ownership.
        reg.job_finish("w1", &a1);
        assert!(!reg.done());

        reg.job_finish("w2", &a2);
        assert!(matches!(reg.get_task("w2", after_deadline), Assignment::Reduce { .. }));
    }

    #[test]
    fn job_finish_from_non_owner_is_ignored() {
        let mut reg = TaskRegistry::new(files(1), 0);
        let now = Instant::now();
        let task_id = match reg.get_task("w1", now) {
            Assignment::Map { task_id, .. } => task_id,
            other => panic!("expected Map, got {:?}", other),
        };

        reg.job_finish("someone-else", &task_id);
        assert!(!reg.done());
        reg.job_finish("w1", &task_id);
        assert!(reg.done());
    }

    #[test]
    fn done_is_false_while_tasks_remain() {
        let reg = TaskRegistry::new(files(2), 2);
        assert!(!reg.done());
    }
}
