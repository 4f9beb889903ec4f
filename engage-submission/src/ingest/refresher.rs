//! Projection refresher
//!
//! Recomputes `projection_detailed`, `projection_medium` and
//! `projection_summary` from active row-records of completed uploads.
//! Every trigger (after an upload, on request, on the interval timer) calls
//! [`ProjectionRefresher::refresh`], and refreshes run one at a time.

use chrono::Utc;
use engage_common::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::validator::{CATEGORY, DEPARTMENT, SUBMISSION_DATE};
use crate::models::{MediumRecord, ProjectionSet, ProjectionSourceRow, SummaryRecord};
use crate::store::ProjectionStore;

/// Row counts written by one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub detailed_rows: usize,
    pub medium_rows: usize,
    pub summary_rows: usize,
    pub duration_ms: u64,
}

pub struct ProjectionRefresher {
    store: Arc<dyn ProjectionStore>,
    /// Serializes refreshes within this process
    lock: Mutex<()>,
}

impl ProjectionRefresher {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn refresh(&self) -> Result<RefreshReport> {
        let _guard = self.lock.lock().await;
        let started = Instant::now();

        let source = self.store.load_projection_source().await?;
        let sensitive = self.store.load_sensitive_fields().await?;
        let projections = build_projections(source, &sensitive);

        self.store.replace_projections(&projections, Utc::now()).await?;

        let report = RefreshReport {
            detailed_rows: projections.detailed.len(),
            medium_rows: projections.medium.len(),
            summary_rows: projections.summary.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            detailed = report.detailed_rows,
            medium = report.medium_rows,
            summary = report.summary_rows,
            duration_ms = report.duration_ms,
            "Projections refreshed"
        );

        Ok(report)
    }

    /// Refresh every `interval` until the task is dropped
    pub fn spawn_interval(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Scheduled projection refresh enabled");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Scheduled projection refresh");
                if let Err(e) = self.refresh().await {
                    warn!("Scheduled projection refresh failed: {}", e);
                }
            }
        })
    }
}

/// Derive all three projections from ordered source rows
pub fn build_projections(
    source: Vec<ProjectionSourceRow>,
    sensitive: &HashMap<String, HashSet<String>>,
) -> ProjectionSet {
    let no_sensitive = HashSet::new();
    let mut summary: BTreeMap<(Option<String>, Option<String>, Option<String>), i64> = BTreeMap::new();
    let mut medium = Vec::with_capacity(source.len());

    for row in &source {
        let month = row
            .submission_date
            .as_deref()
            .and_then(|d| d.get(..7))
            .map(str::to_string);
        *summary
            .entry((month, row.department.clone(), row.category.clone()))
            .or_insert(0) += 1;

        let hidden = sensitive.get(&row.template_id).unwrap_or(&no_sensitive);
        let mut data_fields = row.data_fields.clone();
        data_fields.retain(|key, _| !hidden.contains(key));

        medium.push(MediumRecord {
            data_id: row.data_id.clone(),
            file_id: row.file_id.clone(),
            row_number: row.row_number,
            submission_date: row.submission_date.clone().filter(|_| !hidden.contains(SUBMISSION_DATE)),
            department: row.department.clone().filter(|_| !hidden.contains(DEPARTMENT)),
            category: row.category.clone().filter(|_| !hidden.contains(CATEGORY)),
            data_fields,
            template_id: row.template_id.clone(),
        });
    }

    let summary = summary
        .into_iter()
        .map(|((month, department, category), record_count)| SummaryRecord {
            month,
            department,
            category,
            record_count,
        })
        .collect();

    ProjectionSet {
        detailed: source,
        medium,
        summary,
    }
}
