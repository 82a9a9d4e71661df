use crate::adapters::{Inventory, LogMailer, MemoryAlertStore, TokioTimeProvider};
use crate::alerts::{AlertGenerator, AlertService, NotificationDispatcher, RetentionSweeper};
use crate::auth::{AuthError, AuthState};
use crate::broker::{ConnectionRegistry, HeartbeatMonitor};
use crate::config::AppConfig;
use crate::ports::TimeProvider;
use crate::schedule::{JobScheduler, ScheduledJobHandle};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

pub type Store = MemoryAlertStore;
pub type Alerts = AlertService<Store, TokioTimeProvider>;
pub type Generator = AlertGenerator<Store, Inventory, Inventory, LogMailer, TokioTimeProvider>;
pub type Sweeper = RetentionSweeper<Store, TokioTimeProvider>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthState,
    pub time: TokioTimeProvider,
    pub registry: Arc<ConnectionRegistry>,
    pub alerts: Alerts,
    pub generator: Arc<Generator>,
    pub sweeper: Sweeper,
    pub heartbeat: HeartbeatMonitor,
    pub jobs: Arc<Mutex<Vec<ScheduledJobHandle>>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store, inventory: Inventory) -> Result<Self, AuthError> {
        let auth = AuthState::from_config(&config.auth)?;
        let time = TokioTimeProvider;
        let notify = &config.notify;
        let registry = Arc::new(ConnectionRegistry::new(notify.session_buffer));

        let mut dispatcher = NotificationDispatcher::new(store.clone(), Arc::clone(&registry));
        if let Some(from) = notify.mail_from.as_deref() {
            dispatcher = dispatcher.with_mail(LogMailer, from);
        }
        let generator = AlertGenerator::new(
            store.clone(),
            inventory.clone(),
            inventory,
            dispatcher,
            time,
            notify,
        );

        Ok(Self {
            alerts: AlertService::new(
                store.clone(),
                Arc::clone(&registry),
                time,
                notify.retention(),
            ),
            generator: Arc::new(generator),
            sweeper: RetentionSweeper::new(store, time, notify.retention()),
            heartbeat: HeartbeatMonitor::new(Arc::clone(&registry)),
            registry,
            auth,
            time,
            jobs: Arc::new(Mutex::new(Vec::new())),
            config,
        })
    }

    /// Spawns the alert generator, retention sweeper and heartbeat jobs.
    pub fn start_jobs(&self) {
        let notify = &self.config.notify;
        let scheduler = JobScheduler::new(self.time, notify.utc_offset);

        let generator = Arc::clone(&self.generator);
        let alerts_job = scheduler.spawn_daily("alert-generator", notify.generator_at, move || {
            let generator = Arc::clone(&generator);
            async move {
                if let Err(err) = generator.run().await {
                    error!("alert generator run failed: {err}");
                }
            }
        });

        let sweeper = self.sweeper.clone();
        let sweep_job = scheduler.spawn_daily("retention-sweeper", notify.sweeper_at, move || {
            let sweeper = sweeper.clone();
            async move {
                if let Err(err) = sweeper.run().await {
                    error!("retention sweep failed: {err}");
                }
            }
        });

        let heartbeat = self.heartbeat.clone();
        let heartbeat_job = scheduler.spawn_every("heartbeat", notify.heartbeat_interval(), move || {
            heartbeat.sweep();
            std::future::ready(())
        });

        info!(
            generator_at = %notify.generator_at,
            sweeper_at = %notify.sweeper_at,
            heartbeat_secs = notify.heartbeat_interval_secs,
            started_at = %self.time.now(),
            "scheduled jobs started"
        );
        self.jobs
            .lock()
            .extend([alerts_job, sweep_job, heartbeat_job]);
    }

    pub fn stop_jobs(&self) {
        for job in self.jobs.lock().drain(..) {
            job.abort();
        }
    }
}
