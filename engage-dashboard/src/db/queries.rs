//! Projection queries
//!
//! Record listings are newest submission first; ties (and undated rows,
//! which sort last) keep the order the refresher wrote them in.
//! Functions take a connection so a handler can run several of them inside
//! one read transaction.

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

const RECORD_ORDER: &str = " ORDER BY submission_date DESC, rowid";

/// Optional filters on promoted columns
///
/// `from` and `to` are inclusive `YYYY-MM-DD` bounds on `submission_date`;
/// undated rows never match a bounded range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub department: Option<String>,
    pub category: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RecordFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        let conditions = [
            ("department = ", &self.department),
            ("category = ", &self.category),
            ("submission_date >= ", &self.from),
            ("submission_date <= ", &self.to),
        ];

        let mut clause = " WHERE ";
        for (column, value) in conditions {
            if let Some(value) = value {
                builder.push(clause).push(column).push_bind(value.clone());
                clause = " AND ";
            }
        }
    }
}

/// Row of `projection_detailed`
#[derive(Debug, Clone, Serialize)]
pub struct DetailedRecord {
    pub data_id: String,
    pub file_id: String,
    pub row_number: i64,
    pub submission_date: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub data_fields: Map<String, Value>,
    pub filename: String,
    pub template_id: String,
    pub uploaded_by: String,
    pub uploader_role: String,
    pub uploaded_at: String,
}

/// Row of `projection_medium`
#[derive(Debug, Clone, Serialize)]
pub struct MediumRecord {
    pub data_id: String,
    pub row_number: i64,
    pub submission_date: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub data_fields: Map<String, Value>,
}

/// Row of `projection_summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SummaryRow {
    pub month: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub record_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct MonthlyTotal {
    pub month: Option<String>,
    pub record_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveStats {
    pub total_records: i64,
    pub total_uploads: i64,
    pub departments: i64,
    pub categories: i64,
    pub months_covered: i64,
    pub first_month: Option<String>,
    pub last_month: Option<String>,
    pub last_refreshed_at: Option<String>,
}

fn parse_fields(row: &SqliteRow) -> Result<Map<String, Value>, sqlx::Error> {
    let text: String = row.try_get("data_fields")?;
    serde_json::from_str(&text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn detailed_from_row(row: &SqliteRow) -> Result<DetailedRecord, sqlx::Error> {
    Ok(DetailedRecord {
        data_id: row.try_get("data_id")?,
        file_id: row.try_get("file_id")?,
        row_number: row.try_get("row_number")?,
        submission_date: row.try_get("submission_date")?,
        department: row.try_get("department")?,
        category: row.try_get("category")?,
        data_fields: parse_fields(row)?,
        filename: row.try_get("filename")?,
        template_id: row.try_get("template_id")?,
        uploaded_by: row.try_get("uploaded_by")?,
        uploader_role: row.try_get("uploader_role")?,
        uploaded_at: row.try_get("uploaded_at")?,
    })
}

fn medium_from_row(row: &SqliteRow) -> Result<MediumRecord, sqlx::Error> {
    Ok(MediumRecord {
        data_id: row.try_get("data_id")?,
        row_number: row.try_get("row_number")?,
        submission_date: row.try_get("submission_date")?,
        department: row.try_get("department")?,
        category: row.try_get("category")?,
        data_fields: parse_fields(row)?,
    })
}

pub async fn count_records(
    conn: &mut SqliteConnection,
    table: &'static str,
    filter: &RecordFilter,
) -> Result<i64, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table));
    filter.push_where(&mut builder);
    builder.build_query_scalar::<i64>().fetch_one(conn).await
}

pub async fn detailed_page(
    conn: &mut SqliteConnection,
    filter: &RecordFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<DetailedRecord>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT data_id, file_id, row_number, submission_date, department, category, data_fields, \
                filename, template_id, uploaded_by, uploader_role, uploaded_at \
         FROM projection_detailed",
    );
    filter.push_where(&mut builder);
    builder
        .push(RECORD_ORDER)
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(conn).await?;
    rows.iter().map(detailed_from_row).collect()
}

pub async fn medium_page(
    conn: &mut SqliteConnection,
    filter: &RecordFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<MediumRecord>, sqlx::Error> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT data_id, row_number, submission_date, department, category, data_fields \
         FROM projection_medium",
    );
    filter.push_where(&mut builder);
    builder
        .push(RECORD_ORDER)
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(conn).await?;
    rows.iter().map(medium_from_row).collect()
}

pub async fn summary_rows(conn: &mut SqliteConnection) -> Result<Vec<SummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, SummaryRow>(
        "SELECT month, department, category, record_count FROM projection_summary ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn monthly_totals(conn: &mut SqliteConnection) -> Result<Vec<MonthlyTotal>, sqlx::Error> {
    sqlx::query_as::<_, MonthlyTotal>(
        "SELECT month, SUM(record_count) AS record_count FROM projection_summary \
         GROUP BY month ORDER BY month",
    )
    .fetch_all(&mut *conn)
    .await
}

pub async fn executive_stats(conn: &mut SqliteConnection) -> Result<ExecutiveStats, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total_records, \
                COUNT(DISTINCT file_id) AS total_uploads, \
                COUNT(DISTINCT department) AS departments, \
                COUNT(DISTINCT category) AS categories, \
                COUNT(DISTINCT substr(submission_date, 1, 7)) AS months_covered, \
                MIN(substr(submission_date, 1, 7)) AS first_month, \
                MAX(substr(submission_date, 1, 7)) AS last_month \
         FROM projection_detailed",
    )
    .fetch_one(&mut *conn)
    .await?;

    let last_refreshed_at: Option<String> = sqlx::query_scalar("SELECT MAX(refreshed_at) FROM projection_refreshes")
        .fetch_one(&mut *conn)
        .await?;

    Ok(ExecutiveStats {
        total_records: row.try_get("total_records")?,
        total_uploads: row.try_get("total_uploads")?,
        departments: row.try_get("departments")?,
        categories: row.try_get("categories")?,
        months_covered: row.try_get("months_covered")?,
        first_month: row.try_get("first_month")?,
        last_month: row.try_get("last_month")?,
        last_refreshed_at,
    })
}
