//! Fire-and-forget access logging.
//!
//! The handler pushes one record per served request onto an unbounded
//! channel and moves on; a background task drains the channel, emits a log
//! line under the `access` target and keeps a bounded in-memory window of
//! recent records for inspection. The request path never blocks on any of
//! this.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

const RECENT_CAPACITY: usize = 1024;

/// One served request.
#[derive(Debug, Clone, Serialize)]
pub struct AccessRecord {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub path_info: String,
    pub method: String,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
}

impl AccessRecord {
    pub fn new(
        user_id: Option<i64>,
        ip_address: Option<String>,
        path_info: impl Into<String>,
        method: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            ip_address,
            path_info: path_info.into(),
            method: method.into(),
            status_code,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct AccessLogger {
    tx: mpsc::UnboundedSender<AccessRecord>,
    recent: Arc<RwLock<VecDeque<AccessRecord>>>,
}

impl AccessLogger {
    /// Start the drain task on the current runtime and hand back the
    /// sending side.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<AccessRecord>();
        let recent = Arc::new(RwLock::new(VecDeque::with_capacity(RECENT_CAPACITY)));
        let sink = recent.clone();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                info!(
                    target: "access",
                    "{} {:7} {} {:6} {:15} {}",
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    record.method,
                    record.status_code,
                    record
                        .user_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    record.ip_address.as_deref().unwrap_or("-"),
                    record.path_info,
                );
                let mut window = sink.write().unwrap_or_else(|e| e.into_inner());
                if window.len() == RECENT_CAPACITY {
                    window.pop_front();
                }
                window.push_back(record);
            }
        });
        Self { tx, recent }
    }

    /// Enqueue a record. Never blocks; if the drain task is gone the
    /// record is silently dropped.
    pub fn record(&self, record: AccessRecord) {
        let _ = self.tx.send(record);
    }

    /// Snapshot of the most recent records, oldest first.
    pub fn recent(&self) -> Vec<AccessRecord> {
        self.recent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
