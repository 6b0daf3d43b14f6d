//! Shared harness for the job-loop scenarios.
//!
//! The engine side dispatches its batch commands into a capturing pool. The
//! harness replays each captured request against the runner crate in
//! process, exactly as the batch binary would on a job host, and feeds the
//! runner's printed records back to the engine as the command outcome. Job
//! scripts still execute as real detached processes under the tempdir.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use gyre_core::job::{JOB_OUT, JOB_STATUS_FILE};
use gyre_core::test_support::{task_proxy, task_proxy_with_script};
use gyre_core::{PlatformConfig, Platforms, SystemClock, TaskProxy, TaskState};
use gyre_engine::test_support::FakePool;
use gyre_engine::{
    Broadcasts, CommandOutcome, CommandRequest, MemJobDatabase, StateTaskEvents, TaskJobDeps,
    TaskJobManager, TaskPool,
};
use gyre_runner::{JobRunnerManager, JobRunnerRegistry, SubmitSource};
use parking_lot::Mutex;
use tokio::time::{sleep, Duration};

/// Longest a scenario will wait for a real job to reach a milestone.
const WAIT_LIMIT: Duration = Duration::from_secs(15);
const WAIT_STEP: Duration = Duration::from_millis(50);

pub struct Harness {
    pub root: tempfile::TempDir,
    pub tasks: Arc<Mutex<TaskPool>>,
    pub pool: FakePool,
    pub events: StateTaskEvents,
    pub db: MemJobDatabase,
    pub manager: TaskJobManager<FakePool, StateTaskEvents, MemJobDatabase, Broadcasts>,
    pub runner: JobRunnerManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_platforms(Platforms::with_localhost())
    }

    pub fn with_platforms(platforms: Platforms) -> Self {
        let root = tempfile::tempdir().unwrap();
        let tasks = Arc::new(Mutex::new(TaskPool::new()));
        let pool = FakePool::new();
        let events = StateTaskEvents::new();
        let db = MemJobDatabase::new();
        let manager = TaskJobManager::new(
            platforms,
            root.path(),
            tasks.clone(),
            TaskJobDeps {
                pool: pool.clone(),
                events: events.clone(),
                db: db.clone(),
                broadcasts: Broadcasts::new(),
            },
            Arc::new(SystemClock),
        );
        let runner = JobRunnerManager::new(JobRunnerRegistry::new(), Arc::new(SystemClock), true);
        Harness {
            root,
            tasks,
            pool,
            events,
            db,
            manager,
            runner,
        }
    }

    pub fn add_task(&self, point: &str, name: &str, platform: &str) {
        self.tasks.lock().insert(task_proxy(point, name, platform));
    }

    pub fn add_task_with_script(&self, point: &str, name: &str, platform: &str, script: &str) {
        self.tasks
            .lock()
            .insert(task_proxy_with_script(point, name, platform, script));
    }

    pub fn task(&self, id: &str) -> TaskProxy {
        self.tasks.lock().get(id).unwrap().clone()
    }

    pub fn task_state(&self, id: &str) -> TaskState {
        self.task(id).state
    }

    pub fn submit(&self, ids_list: &[&str]) {
        self.manager.submit_task_jobs(&ids(ids_list));
    }

    pub fn poll(&self, ids_list: &[&str]) {
        self.manager.poll_task_jobs(&ids(ids_list));
    }

    pub fn kill(&self, ids_list: &[&str]) {
        self.manager.kill_task_jobs(&ids(ids_list));
    }

    /// Run every captured batch request through the runner and feed the
    /// outcomes back. Returns the raw batch outputs in dispatch order.
    pub async fn pump(&self) -> Vec<String> {
        let requests = self.pool.take_requests();
        assert!(!requests.is_empty(), "no batch requests to pump");
        let mut outputs = Vec::new();
        for request in requests {
            let outcome = self.run_request(&request).await;
            outputs.push(outcome.stdout.clone());
            self.manager.handle_outcome(outcome);
        }
        outputs
    }

    async fn run_request(&self, request: &CommandRequest) -> CommandOutcome {
        let argv = &request.argv;
        assert_eq!(argv[0], "gyre", "not a batch command: {argv:?}");
        if matches!(argv[1].as_str(), "remote-init" | "file-install") {
            // The tempdir doubles as the install target's filesystem, so
            // provisioning succeeds with nothing to do.
            return CommandOutcome {
                key: request.key.clone(),
                host: request.host.clone(),
                ret_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            };
        }
        let separator = argv
            .iter()
            .position(|arg| arg == "--")
            .expect("batch argv has a -- separator");
        let root = PathBuf::from(&argv[separator + 1]);
        let dirs: Vec<String> = argv[separator + 2..].to_vec();
        let mut out: Vec<u8> = Vec::new();
        match argv[1].as_str() {
            "jobs-submit" => {
                let source = match request.stdin.as_deref() {
                    Some(text) => SubmitSource::Stdin(text),
                    None => SubmitSource::LocalFiles,
                };
                self.runner
                    .jobs_submit(&root, &dirs, source, &mut out)
                    .await
                    .unwrap();
            }
            "jobs-poll" => self.runner.jobs_poll(&root, &dirs, &mut out).await.unwrap(),
            "jobs-kill" => self.runner.jobs_kill(&root, &dirs, &mut out).await.unwrap(),
            other => panic!("unhandled batch action {other}: {argv:?}"),
        }
        CommandOutcome {
            key: request.key.clone(),
            host: request.host.clone(),
            ret_code: 0,
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::new(),
        }
    }

    pub fn status_text(&self, job_log_dir: &str) -> String {
        let path = self.root.path().join(job_log_dir).join(JOB_STATUS_FILE);
        std::fs::read_to_string(&path).unwrap_or_default()
    }

    pub fn job_out(&self, job_log_dir: &str) -> String {
        let path = self.root.path().join(job_log_dir).join(JOB_OUT);
        std::fs::read_to_string(&path).unwrap_or_default()
    }

    /// Wait until the job's status file carries the given key.
    pub async fn wait_for_status_key(&self, job_log_dir: &str, key: &str) {
        let mut waited = Duration::ZERO;
        loop {
            let text = self.status_text(job_log_dir);
            if text.lines().any(|line| line.starts_with(key)) {
                return;
            }
            if waited >= WAIT_LIMIT {
                panic!("{job_log_dir}: no {key} after {WAIT_LIMIT:?}; status:\n{text}");
            }
            sleep(WAIT_STEP).await;
            waited += WAIT_STEP;
        }
    }

    /// One value from the job's status file, e.g. the recorded pid.
    pub fn status_value(&self, job_log_dir: &str, key: &str) -> Option<String> {
        let text = self.status_text(job_log_dir);
        text.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        })
    }

    /// Wait until the pid has left the process table (killed jobs linger as
    /// zombies until the runtime reaps them).
    pub async fn wait_for_pid_gone(&self, pid: &str) {
        let mut waited = Duration::ZERO;
        loop {
            let output = tokio::process::Command::new("ps")
                .args(["-o", "pid=", "-p", pid])
                .output()
                .await
                .unwrap();
            if String::from_utf8_lossy(&output.stdout).trim().is_empty() {
                return;
            }
            if waited >= WAIT_LIMIT {
                panic!("pid {pid} still in the process table after {WAIT_LIMIT:?}");
            }
            sleep(WAIT_STEP).await;
            waited += WAIT_STEP;
        }
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// A platform submitting through the given runner on the local filesystem.
pub fn local_platform_with_runner(name: &str, runner: &str) -> Platforms {
    let mut platforms = Platforms::with_localhost();
    let mut platform = PlatformConfig::new(name);
    platform.hosts = vec!["localhost".to_string()];
    platform.install_target = Some("localhost".to_string());
    platform.job_runner_name = runner.to_string();
    platforms.insert(platform);
    platforms
}
