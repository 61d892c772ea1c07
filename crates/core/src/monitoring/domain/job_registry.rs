use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::Receiver;

use crate::monitoring::domain::detection_job::{DetectionJob, JobWriter};
use crate::monitoring::domain::job_id::JobId;
use crate::monitoring::monitor_error::MonitorError;

/// Every job the process knows about, keyed by id, plus the worker thread
/// running each one.
///
/// Lookups never block on a running scan: workers only touch their own
/// [`DetectionJob`], never the registry.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<DetectionJob>>>,
    workers: Mutex<HashMap<JobId, Worker>>,
}

struct Worker {
    handle: JoinHandle<()>,
    /// Never sent on; disconnects when the worker thread exits.
    done: Receiver<()>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job`, moves it to Running and hands its writer to `run`
    /// on a dedicated thread.
    pub fn submit<F>(&self, job: Arc<DetectionJob>, run: F) -> Result<JobId, MonitorError>
    where
        F: FnOnce(JobWriter) + Send + 'static,
    {
        let id = job.id();
        let mut writer = job
            .claim_writer()
            .ok_or(MonitorError::AlreadySubmitted(id))?;
        {
            let mut jobs = self.write_jobs();
            if jobs.contains_key(&id) {
                return Err(MonitorError::AlreadySubmitted(id));
            }
            writer.start();
            jobs.insert(id, Arc::clone(&job));
        }

        // The closure owns the writer; if the spawn fails it is dropped
        // unrun, which marks the job Failed.
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let spawned = std::thread::Builder::new()
            .name(format!("job-{}", short_id(id)))
            .spawn(move || {
                let _done = done_tx;
                run(writer);
            });
        match spawned {
            Ok(handle) => {
                self.lock_workers().insert(id, Worker { handle, done });
                log::info!("Job {id} started on {}", job.video_path().display());
                Ok(id)
            }
            Err(e) => {
                self.write_jobs().remove(&id);
                Err(MonitorError::Worker(format!("failed to start job thread: {e}")))
            }
        }
    }

    pub fn get(&self, id: JobId) -> Result<Arc<DetectionJob>, MonitorError> {
        self.read_jobs()
            .get(&id)
            .cloned()
            .ok_or(MonitorError::UnknownJob(id))
    }

    /// Requests cancellation. `Ok(false)` when the job had already ended.
    pub fn cancel(&self, id: JobId) -> Result<bool, MonitorError> {
        let job = self.get(id)?;
        let requested = job.request_cancel();
        if requested {
            log::info!("Job {id} cancellation requested");
        }
        Ok(requested)
    }

    /// Requests cancellation of every live job. Returns how many were asked.
    pub fn cancel_all(&self) -> usize {
        self.list()
            .iter()
            .filter(|job| job.request_cancel())
            .count()
    }

    /// Blocks until the job's worker has finished running it.
    ///
    /// Any number of callers may wait on the same job; all of them return
    /// only after the worker is done with its writer.
    pub fn wait(&self, id: JobId) -> Result<(), MonitorError> {
        self.get(id)?;
        let done = self.lock_workers().get(&id).map(|w| w.done.clone());
        let Some(done) = done else {
            return Ok(());
        };
        let _ = done.recv();
        let finished = self.lock_workers().remove(&id);
        if let Some(worker) = finished {
            join_worker(id, worker.handle);
        }
        Ok(())
    }

    /// Drops terminal jobs that finished more than `max_age` ago and
    /// returns them. Live jobs are never removed.
    pub fn remove_stale(&self, max_age: Duration) -> Vec<Arc<DetectionJob>> {
        let now = Utc::now();
        let removed: Vec<Arc<DetectionJob>> = {
            let mut jobs = self.write_jobs();
            let stale: Vec<JobId> = jobs
                .values()
                .filter(|job| job.state().is_terminal())
                .filter(|job| {
                    job.finished_at()
                        .and_then(|at| (now - at).to_std().ok())
                        .is_some_and(|age| age > max_age)
                })
                .map(|job| job.id())
                .collect();
            stale.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &removed {
            let finished = self.lock_workers().remove(&job.id());
            if let Some(worker) = finished {
                join_worker(job.id(), worker.handle);
            }
        }
        if !removed.is_empty() {
            log::info!("Removed {} finished jobs", removed.len());
        }
        removed
    }

    /// Every registered job, oldest first.
    pub fn list(&self) -> Vec<Arc<DetectionJob>> {
        let mut jobs: Vec<_> = self.read_jobs().values().cloned().collect();
        jobs.sort_by_key(|job| job.created_at());
        jobs
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<JobId, Arc<DetectionJob>>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Arc<DetectionJob>>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_workers(&self) -> MutexGuard<'_, HashMap<JobId, Worker>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn join_worker(id: JobId, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        log::error!("Job {id} worker thread panicked");
    }
}

fn short_id(id: JobId) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::domain::detection_job::JobOutcome;
    use crate::monitoring::domain::detection_job::tests::{result, test_job};
    use crate::monitoring::domain::job_state::JobState;
    use crate::monitoring::test_support::wait_terminal;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn finish_with(outcome: JobOutcome) -> impl FnOnce(JobWriter) + Send + 'static {
        move |writer| {
            writer.finish(outcome);
        }
    }

    #[test]
    fn test_submit_runs_job_and_is_visible() {
        let registry = JobRegistry::new();
        let job = test_job();
        let id = registry
            .submit(Arc::clone(&job), |writer| {
                writer.push_result(result(1));
                writer.finish(JobOutcome::Completed);
            })
            .unwrap();

        registry.wait(id).unwrap();
        let found = registry.get(id).unwrap();
        assert_eq!(found.state(), JobState::Completed);
        assert_eq!(found.result_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_submitted_job_is_running_before_worker_acts() {
        let registry = JobRegistry::new();
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let id = registry
            .submit(test_job(), move |writer| {
                let _ = rx.recv();
                writer.finish(JobOutcome::Completed);
            })
            .unwrap();
        assert_eq!(registry.get(id).unwrap().state(), JobState::Running);
        tx.send(()).unwrap();
        registry.wait(id).unwrap();
    }

    #[test]
    fn test_same_job_cannot_be_submitted_twice() {
        let registry = JobRegistry::new();
        let job = test_job();
        registry
            .submit(Arc::clone(&job), finish_with(JobOutcome::Completed))
            .unwrap();
        let err = registry
            .submit(Arc::clone(&job), finish_with(JobOutcome::Completed))
            .unwrap_err();
        assert!(matches!(err, MonitorError::AlreadySubmitted(id) if id == job.id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_job_lookups_fail() {
        let registry = JobRegistry::new();
        let id = JobId::new();
        assert!(registry.get(id).unwrap_err().is_unknown_job());
        assert!(registry.cancel(id).unwrap_err().is_unknown_job());
        assert!(registry.wait(id).unwrap_err().is_unknown_job());
    }

    #[test]
    fn test_cancel_live_job_then_noop_when_terminal() {
        let registry = JobRegistry::new();
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let id = registry
            .submit(test_job(), move |writer| {
                let _ = rx.recv();
                let outcome = if writer.job().is_cancel_requested() {
                    JobOutcome::Stopped
                } else {
                    JobOutcome::Completed
                };
                writer.finish(outcome);
            })
            .unwrap();

        assert!(registry.cancel(id).unwrap());
        tx.send(()).unwrap();
        registry.wait(id).unwrap();
        assert_eq!(registry.get(id).unwrap().state(), JobState::Stopped);

        assert!(!registry.cancel(id).unwrap());
        assert_eq!(registry.get(id).unwrap().state(), JobState::Stopped);
    }

    #[test]
    fn test_cancel_all_skips_finished_jobs() {
        let registry = JobRegistry::new();
        let done = registry
            .submit(test_job(), finish_with(JobOutcome::Completed))
            .unwrap();
        registry.wait(done).unwrap();

        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let live = registry
            .submit(test_job(), move |writer| {
                let _ = rx.recv();
                writer.finish(JobOutcome::Stopped);
            })
            .unwrap();

        assert_eq!(registry.cancel_all(), 1);
        assert!(registry.get(live).unwrap().is_cancel_requested());
        assert!(!registry.get(done).unwrap().is_cancel_requested());
        tx.send(()).unwrap();
        registry.wait(live).unwrap();
    }

    #[test]
    fn test_concurrent_waiters_all_return_after_worker_exits() {
        let registry = JobRegistry::new();
        let job = test_job();
        let exited = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let id = {
            let exited = Arc::clone(&exited);
            registry
                .submit(Arc::clone(&job), move |writer| {
                    let _ = rx.recv();
                    writer.finish(JobOutcome::Completed);
                    exited.store(true, Ordering::SeqCst);
                })
                .unwrap()
        };

        let (registry, exited_ref) = (&registry, &exited);
        std::thread::scope(|s| {
            let waiters: Vec<_> = (0..3)
                .map(|_| {
                    s.spawn(move || {
                        registry.wait(id).unwrap();
                        exited_ref.load(Ordering::SeqCst)
                    })
                })
                .collect();
            std::thread::sleep(Duration::from_millis(20));
            tx.send(()).unwrap();
            for waiter in waiters {
                assert!(waiter.join().unwrap());
            }
        });
        assert_eq!(job.state(), JobState::Completed);
        registry.wait(id).unwrap();
    }

    #[test]
    fn test_panicking_worker_leaves_job_failed() {
        let registry = JobRegistry::new();
        let job = test_job();
        let id = registry
            .submit(Arc::clone(&job), |_writer| panic!("decoder exploded"))
            .unwrap();
        wait_terminal(&job);
        registry.wait(id).unwrap();
        assert_eq!(job.state(), JobState::Failed);
    }

    #[test]
    fn test_remove_stale_keeps_running_and_recent_jobs() {
        let registry = JobRegistry::new();
        let finished = registry
            .submit(test_job(), finish_with(JobOutcome::Completed))
            .unwrap();
        registry.wait(finished).unwrap();

        let (tx, rx) = crossbeam_channel::bounded::<()>(0);
        let running = registry
            .submit(test_job(), move |writer| {
                let _ = rx.recv();
                writer.finish(JobOutcome::Completed);
            })
            .unwrap();

        assert!(registry.remove_stale(Duration::from_secs(3600)).is_empty());

        std::thread::sleep(Duration::from_millis(5));
        let removed: Vec<JobId> = registry
            .remove_stale(Duration::from_millis(1))
            .iter()
            .map(|job| job.id())
            .collect();
        assert_eq!(removed, vec![finished]);
        assert!(registry.get(running).is_ok());
        assert!(registry.get(finished).unwrap_err().is_unknown_job());

        tx.send(()).unwrap();
        registry.wait(running).unwrap();
    }

    #[test]
    fn test_list_is_oldest_first() {
        let registry = JobRegistry::new();
        let first = registry
            .submit(test_job(), finish_with(JobOutcome::Completed))
            .unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = registry
            .submit(test_job(), finish_with(JobOutcome::Completed))
            .unwrap();
        let ids: Vec<JobId> = registry.list().iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec![first, second]);
        registry.wait(first).unwrap();
        registry.wait(second).unwrap();
    }
}
