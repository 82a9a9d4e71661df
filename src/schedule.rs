use crate::config::DailyTime;
use crate::ports;

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobSchedule {
    Daily {
        #[serde(serialize_with = "serialize_daily_time")]
        at: DailyTime,
    },
    Every {
        interval_secs: u64,
    },
}

fn serialize_daily_time<S: serde::Serializer>(
    at: &DailyTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(at)
}

pub struct ScheduledJobHandle {
    pub name: &'static str,
    pub schedule: JobSchedule,
    pub started_at: OffsetDateTime,
    handle: JoinHandle<()>,
}

impl ScheduledJobHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone)]
pub struct JobScheduler<T> {
    time: T,
    offset: UtcOffset,
}

impl<T> JobScheduler<T>
where
    T: ports::TimeProvider,
{
    pub fn new(time: T, offset: UtcOffset) -> Self {
        Self { time, offset }
    }

    /// Runs `job` every day at `at`. A run that overlaps the next start time
    /// delays it rather than running twice.
    pub fn spawn_daily<F, Fut>(
        &self,
        name: &'static str,
        at: DailyTime,
        job: F,
    ) -> ScheduledJobHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let time = self.time.clone();
        let offset = self.offset;
        let started_at = time.now();
        let handle = tokio::spawn(async move {
            loop {
                let next = next_daily_run(time.now(), at, offset);
                debug!(job = name, next_run = %next, "job scheduled");
                if let Some(delay) = compute_delay(&time, next) {
                    time.sleep(delay).await;
                }
                debug!(job = name, "job starting");
                job().await;
            }
        });
        ScheduledJobHandle {
            name,
            schedule: JobSchedule::Daily { at },
            started_at,
            handle,
        }
    }

    /// Runs `job` after every `interval`, measured from the end of the
    /// previous run.
    pub fn spawn_every<F, Fut>(
        &self,
        name: &'static str,
        interval: Duration,
        job: F,
    ) -> ScheduledJobHandle
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let time = self.time.clone();
        let started_at = time.now();
        let handle = tokio::spawn(async move {
            loop {
                time.sleep(interval).await;
                job().await;
            }
        });
        ScheduledJobHandle {
            name,
            schedule: JobSchedule::Every {
                interval_secs: interval.as_secs(),
            },
            started_at,
            handle,
        }
    }
}

/// First instant strictly after `now` whose wall-clock time in `offset` is `at`.
pub(crate) fn next_daily_run(
    now: OffsetDateTime,
    at: DailyTime,
    offset: UtcOffset,
) -> OffsetDateTime {
    let local = now.to_offset(offset);
    let candidate = local.date().with_time(at.time()).assume_offset(offset);
    if candidate > now {
        candidate
    } else {
        candidate + time::Duration::DAY
    }
}

fn compute_delay<T: ports::TimeProvider>(time: &T, at: OffsetDateTime) -> Option<Duration> {
    let now = time.now();
    let delay = at - now;
    if delay.is_positive() {
        match delay.try_into() {
            Ok(std_delay) => Some(std_delay),
            Err(_) => Some(Duration::MAX),
        }
    } else {
        None
    }
}
