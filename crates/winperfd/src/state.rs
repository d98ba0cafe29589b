//! Shared application state.

use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::State;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use winperf_core::collector::{CollectorDescriptor, Scheduler, ScrapeSummary};

/// Status of the collectors as of the last completed scrape.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct StatusSnapshot {
    pub collectors: Vec<CollectorDescriptor>,
    pub last_scrape: Option<ScrapeSummary>,
}

pub(crate) struct AppInner {
    /// Held for the whole round, which serializes concurrent scrapes.
    pub scheduler: AsyncMutex<Scheduler>,
    status: Mutex<StatusSnapshot>,
}

impl AppInner {
    pub fn new(scheduler: Scheduler) -> Self {
        let status = StatusSnapshot {
            collectors: scheduler.descriptors(),
            last_scrape: None,
        };
        Self {
            scheduler: AsyncMutex::new(scheduler),
            status: Mutex::new(status),
        }
    }

    pub fn record(&self, collectors: Vec<CollectorDescriptor>, summary: ScrapeSummary) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.collectors = collectors;
        status.last_scrape = Some(summary);
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub(crate) type SharedState = Arc<AppInner>;
pub(crate) type AppState = State<SharedState>;
