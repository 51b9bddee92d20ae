use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use callbrief_core::config::AppConfig;

use crate::pipeline::CallPipeline;
use crate::signature::SignatureVerifier;
use crate::status::StatusPage;

/// Whether the loaded configuration passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Invalid(String),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Ready => None,
            Self::Invalid(reason) => Some(reason),
        }
    }
}

/// Shared, immutable state handed to every route.
///
/// `pipeline` is `None` exactly when `readiness` is `Invalid`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub readiness: Readiness,
    pub pipeline: Option<Arc<CallPipeline>>,
    pub verifier: Option<Arc<SignatureVerifier>>,
    pub status_page: Arc<StatusPage>,
    pub in_flight: InFlight,
}

impl AppState {
    pub fn degraded(config: AppConfig, reason: impl Into<String>, status_page: StatusPage) -> Self {
        Self {
            config: Arc::new(config),
            readiness: Readiness::Invalid(reason.into()),
            pipeline: None,
            verifier: None,
            status_page: Arc::new(status_page),
            in_flight: InFlight::default(),
        }
    }
}

/// Counts background pipeline tasks so shutdown can wait for them.
#[derive(Clone, Debug, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(&self.0))
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Waits until no task is running or `grace` elapses; `false` on timeout.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait = async {
            while self.count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(grace, wait).await.is_ok()
    }
}

pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
