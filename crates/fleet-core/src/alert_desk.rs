//! Operator actions on stored alerts.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::FleetResult;
use crate::lifecycle::{acknowledge_alert, dismiss_alert, resolve_alert};
use crate::models::{Alert, AlertSeverity, AlertStatus, AlertType, Page};
use crate::repository::FleetRepository;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub shipment_id: Option<String>,
    #[serde(rename = "type", alias = "alert_type")]
    pub alert_type: Option<AlertType>,
    pub severity: Option<AlertSeverity>,
    pub status: Option<AlertStatus>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

const DEFAULT_PAGE_LIMIT: usize = 20;
const MAX_PAGE_LIMIT: usize = 100;

pub struct AlertDesk<R> {
    repo: Arc<R>,
}

impl<R: FleetRepository> AlertDesk<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Newest first.
    pub fn list(&self, query: &AlertQuery) -> Page<Alert> {
        let mut alerts: Vec<Alert> = self
            .repo
            .alerts()
            .into_iter()
            .filter(|a| query.shipment_id.as_ref().map_or(true, |id| &a.shipment_id == id))
            .filter(|a| query.alert_type.map_or(true, |t| a.alert_type == t))
            .filter(|a| query.severity.map_or(true, |s| a.severity == s))
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));

        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        Page::paginate(alerts, query.page.unwrap_or(1), limit)
    }

    pub fn acknowledge(&self, id: &str, by: Option<String>) -> FleetResult<Alert> {
        let alert = self.repo.update_alert(id, &mut |alert: &mut Alert| {
            acknowledge_alert(alert, by.clone(), Utc::now())
        })?;
        tracing::info!(alert_id = id, by = ?alert.acknowledged_by, "Alert acknowledged");
        Ok(alert)
    }

    pub fn resolve(&self, id: &str, resolution: Option<String>) -> FleetResult<Alert> {
        let alert = self.repo.update_alert(id, &mut |alert: &mut Alert| {
            resolve_alert(alert, resolution.clone(), Utc::now())
        })?;
        tracing::info!(alert_id = id, "Alert resolved");
        Ok(alert)
    }

    pub fn dismiss(&self, id: &str, notes: Option<String>) -> FleetResult<Alert> {
        let alert = self.repo.update_alert(id, &mut |alert: &mut Alert| {
            dismiss_alert(alert, notes.clone(), Utc::now())
        })?;
        tracing::info!(alert_id = id, "Alert dismissed");
        Ok(alert)
    }
}
