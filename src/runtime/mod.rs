//! Runtime status tables.
//!
//! # Data Flow
//! ```text
//! StatusUpdater (load_balancer/status.rs)
//!     → ServiceInfo::update_server_status (one table per backend pool)
//!
//! Readers:
//!     → admin API (GET /api/health/status)
//!     → operational dashboards
//! ```
//!
//! # Design Decisions
//! - Entries are overwritten, never deleted: every address ever seen stays
//!   listed for the lifetime of the process
//! - Tables are concurrent maps so readers never block the health checker

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

/// Observable state of one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerStatus {
    Up,
    Down,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Up => f.write_str("UP"),
            ServerStatus::Down => f.write_str("DOWN"),
        }
    }
}

/// Status table of a single backend pool, keyed by server address.
#[derive(Debug, Default)]
pub struct ServiceInfo {
    server_status: DashMap<String, ServerStatus>,
}

impl ServiceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status` for `server`, replacing any previous record.
    pub fn update_server_status(&self, server: &str, status: ServerStatus) {
        self.server_status.insert(server.to_string(), status);
    }

    pub fn server_status(&self, server: &str) -> Option<ServerStatus> {
        self.server_status.get(server).map(|entry| *entry)
    }

    pub fn all_statuses(&self) -> BTreeMap<String, ServerStatus> {
        self.server_status
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

/// All status tables of the process, keyed by backend pool name.
#[derive(Debug, Default)]
pub struct Services {
    services: DashMap<String, Arc<ServiceInfo>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for `name`, created on first use.
    pub fn service(&self, name: &str) -> Arc<ServiceInfo> {
        self.services
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, ServerStatus>> {
        self.services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().all_statuses()))
            .collect()
    }
}
