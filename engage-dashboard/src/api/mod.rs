//! HTTP API handlers for engage-dashboard

pub mod executive;
pub mod health;
pub mod public;
pub mod staff;

pub use executive::executive_routes;
pub use health::health_routes;
pub use public::public_routes;
pub use staff::staff_routes;

use chrono::NaiveDate;
use engage_common::api::CallerIdentity;
use engage_common::models::AccessTier;
use serde::{Deserialize, Serialize};

use crate::db::queries::RecordFilter;
use crate::error::{ApiError, ApiResult};
use crate::pagination::Pagination;

/// Query parameters for record listings
#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
    pub department: Option<String>,
    pub category: Option<String>,
    /// Earliest submission date, inclusive (`YYYY-MM-DD`)
    #[serde(alias = "start_date")]
    pub from: Option<String>,
    /// Latest submission date, inclusive (`YYYY-MM-DD`)
    #[serde(alias = "end_date")]
    pub to: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bound(name: &str, value: &Option<String>) -> ApiResult<Option<NaiveDate>> {
    non_empty(value)
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| ApiError::BadRequest(format!("{} must be a YYYY-MM-DD date, got '{}'", name, v)))
        })
        .transpose()
}

impl RecordQuery {
    /// Blank values are ignored; malformed or reversed dates are rejected
    pub fn filter(&self) -> ApiResult<RecordFilter> {
        let from = parse_bound("from", &self.from)?;
        let to = parse_bound("to", &self.to)?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ApiError::BadRequest(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }

        Ok(RecordFilter {
            department: non_empty(&self.department),
            category: non_empty(&self.category),
            from: from.map(|d| d.format("%Y-%m-%d").to_string()),
            to: to.map(|d| d.format("%Y-%m-%d").to_string()),
        })
    }
}

/// One page of projection records
#[derive(Debug, Serialize)]
pub struct RecordPage<T> {
    pub total_records: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub records: Vec<T>,
}

impl<T> RecordPage<T> {
    pub fn new(total_records: i64, pagination: Pagination, records: Vec<T>) -> Self {
        Self {
            total_records,
            page: pagination.page,
            page_size: pagination.page_size,
            total_pages: pagination.total_pages,
            records,
        }
    }
}

pub(crate) fn require_tier(caller: &CallerIdentity, tier: AccessTier) -> ApiResult<()> {
    if caller.has_tier(tier) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Role '{}' may not view this dashboard",
            caller.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: Option<&str>, to: Option<&str>) -> RecordQuery {
        RecordQuery {
            page: 1,
            department: Some("  ".to_string()),
            category: Some(" Event ".to_string()),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    #[test]
    fn test_filter_trims_and_drops_blanks() {
        let filter = query(Some(" 2024-01-01 "), Some("")).filter().unwrap();
        assert_eq!(
            filter,
            RecordFilter {
                department: None,
                category: Some("Event".to_string()),
                from: Some("2024-01-01".to_string()),
                to: None,
            }
        );
    }

    #[test]
    fn test_filter_rejects_bad_dates() {
        assert!(matches!(query(Some("01/02/2024"), None).filter(), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            query(Some("2024-03-01"), Some("2024-02-01")).filter(),
            Err(ApiError::BadRequest(_))
        ));
    }
}
