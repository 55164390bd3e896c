use crate::entity::data_usage;
use crate::error::{LedgerError, Result};
use chrono::{Days, Local, NaiveDate};
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Retrieval window used when the caller does not ask for one.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS data_usage (
        date TEXT PRIMARY KEY NOT NULL,
        sent INTEGER NOT NULL,
        received INTEGER NOT NULL
    )
"#;

/// Totals recorded for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub sent: u64,
    pub received: u64,
}

/// Sum of the per-day snapshots in a window.
///
/// Each day stores the cumulative counters seen at its last update, not the
/// traffic of that day, so this is a sum of snapshots rather than the volume
/// transferred during the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageSummary {
    pub total_sent: u64,
    pub total_received: u64,
}

impl TryFrom<data_usage::Model> for UsageRecord {
    type Error = LedgerError;

    fn try_from(row: data_usage::Model) -> Result<Self> {
        let corrupt = |reason: String| LedgerError::CorruptRecord {
            date: row.date.clone(),
            reason,
        };

        let date = NaiveDate::parse_from_str(&row.date, DATE_FORMAT)
            .map_err(|e| corrupt(format!("invalid date: {e}")))?;
        let sent = u64::try_from(row.sent)
            .map_err(|_| corrupt(format!("negative sent total {}", row.sent)))?;
        let received = u64::try_from(row.received)
            .map_err(|_| corrupt(format!("negative received total {}", row.received)))?;

        Ok(Self {
            date,
            sent,
            received,
        })
    }
}

/// Daily usage table in SQLite. One row per local calendar date; writes for
/// a date replace the previous totals.
pub struct UsageLedger {
    db: DatabaseConnection,
}

impl UsageLedger {
    #[instrument(skip(database_path))]
    pub async fn connect<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let database_path = database_path.as_ref();

        if let Some(parent) = database_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let db = Database::connect(&database_url).await?;

        let ledger = Self { db };
        ledger.ensure_schema().await?;

        info!("Connected to SQLite database: {}", database_path.display());
        Ok(ledger)
    }

    /// Create the usage table if it is missing. Existing rows are untouched.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                CREATE_TABLE_SQL.to_string(),
            ))
            .await?;
        Ok(())
    }

    /// Store the totals under today's local date.
    pub async fn record_usage(&self, sent: u64, received: u64) -> Result<()> {
        self.record_usage_on(today(), sent, received).await
    }

    #[instrument(skip(self))]
    pub async fn record_usage_on(&self, date: NaiveDate, sent: u64, received: u64) -> Result<()> {
        let row = data_usage::ActiveModel {
            date: Set(format_date(date)),
            sent: Set(to_column(sent, "sent")?),
            received: Set(to_column(received, "received")?),
        };

        data_usage::Entity::insert(row)
            .on_conflict(
                OnConflict::column(data_usage::Column::Date)
                    .update_columns([data_usage::Column::Sent, data_usage::Column::Received])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        debug!("Recorded usage for {}", date);
        Ok(())
    }

    pub async fn query_recent(&self, window_days: u32) -> Result<Vec<UsageRecord>> {
        self.query_recent_from(today(), window_days).await
    }

    /// Records dated within `[today - window_days, today]`, newest first.
    #[instrument(skip(self))]
    pub async fn query_recent_from(
        &self,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<Vec<UsageRecord>> {
        let since = today
            .checked_sub_days(Days::new(window_days.into()))
            .unwrap_or(NaiveDate::MIN);

        let rows = data_usage::Entity::find()
            .filter(data_usage::Column::Date.gte(format_date(since)))
            .filter(data_usage::Column::Date.lte(format_date(today)))
            .order_by_desc(data_usage::Column::Date)
            .all(&self.db)
            .await?;

        rows.into_iter().map(UsageRecord::try_from).collect()
    }

    pub async fn summarize(&self, window_days: u32) -> Result<UsageSummary> {
        self.summarize_from(today(), window_days).await
    }

    #[instrument(skip(self))]
    pub async fn summarize_from(&self, today: NaiveDate, window_days: u32) -> Result<UsageSummary> {
        let records = self.query_recent_from(today, window_days).await?;
        Ok(records
            .iter()
            .fold(UsageSummary::default(), |acc, record| UsageSummary {
                total_sent: acc.total_sent.saturating_add(record.sent),
                total_received: acc.total_received.saturating_add(record.received),
            }))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn to_column(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        LedgerError::ValueOutOfRange(format!("{field} total {value} exceeds storable range"))
    })
}
