use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use super::AdminState;
use crate::runtime::ServerStatus;

#[derive(Debug, Serialize)]
pub struct DisabledStatus {
    pub url: String,
    pub weight: u32,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub mode: String,
    pub interval_ms: u64,
    pub healthy: Vec<String>,
    pub disabled: Vec<DisabledStatus>,
}

/// `{ service: { url: "UP" | "DOWN" } }`
pub async fn get_status(
    State(state): State<AdminState>,
) -> Json<BTreeMap<String, BTreeMap<String, ServerStatus>>> {
    Json(state.services.snapshot())
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let backends = state.health.backends();

    let mut statuses: Vec<_> = backends
        .values()
        .map(|backend| {
            let options = backend.options();
            BackendStatus {
                name: backend.name().to_string(),
                mode: options.mode.to_string(),
                interval_ms: options.interval.as_millis() as u64,
                healthy: options.lb.servers().iter().map(|u| u.to_string()).collect(),
                disabled: backend
                    .disabled_servers()
                    .into_iter()
                    .map(|s| DisabledStatus {
                        url: s.url.to_string(),
                        weight: s.weight,
                    })
                    .collect(),
            }
        })
        .collect();

    statuses.sort_by(|a, b| a.name.cmp(&b.name));
    Json(statuses)
}
