use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{BookSummary, Fine, FineAssessment, FineDetails, FineStatus, FineTotals, UserSummary},
    error::{AppError, Result},
    repository::FineRepository,
};

#[derive(FromRow)]
struct FineRow {
    id: String,
    user_id: String,
    book_id: String,
    issue_id: String,
    amount: i64,
    due_date: NaiveDateTime,
    return_date: Option<NaiveDateTime>,
    days_overdue: i64,
    status: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct FineDetailsRow {
    #[sqlx(flatten)]
    fine: FineRow,
    user_username: String,
    user_email: String,
    book_title: Option<String>,
    book_author: Option<String>,
    book_cover_image: Option<String>,
    book_category: Option<String>,
}

#[derive(FromRow)]
struct TotalsRow {
    total: i64,
    count: i64,
}

const FINE_COLUMNS: &str = r#"
    id, user_id, book_id, issue_id, amount, due_date, return_date,
    days_overdue, status, paid_at, created_at, updated_at
"#;

const SELECT_DETAILS: &str = r#"
    SELECT f.id, f.user_id, f.book_id, f.issue_id, f.amount, f.due_date, f.return_date,
           f.days_overdue, f.status, f.paid_at, f.created_at, f.updated_at,
           u.username AS user_username, u.email AS user_email,
           b.title AS book_title, b.author AS book_author,
           b.cover_image AS book_cover_image, b.category AS book_category
    FROM fines f
    JOIN users u ON u.id = f.user_id
    LEFT JOIN books b ON b.id = f.book_id
"#;

pub struct SqliteFineRepository {
    pool: SqlitePool,
}

impl SqliteFineRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_fine(row: FineRow) -> Result<Fine> {
        Ok(Fine {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            book_id: Uuid::parse_str(&row.book_id).map_err(|e| AppError::Database(e.to_string()))?,
            issue_id: Uuid::parse_str(&row.issue_id).map_err(|e| AppError::Database(e.to_string()))?,
            amount: row.amount,
            due_date: DateTime::from_naive_utc_and_offset(row.due_date, Utc),
            return_date: row.return_date.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            days_overdue: row.days_overdue,
            status: FineStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid fine status: {}", row.status)))?,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_details(row: FineDetailsRow) -> Result<FineDetails> {
        let fine = Self::row_to_fine(row.fine)?;
        let book = match (row.book_title, row.book_author, row.book_cover_image) {
            (Some(title), Some(author), Some(cover_image)) => Some(BookSummary {
                id: fine.book_id,
                title,
                author,
                cover_image,
                category: row.book_category,
            }),
            _ => None,
        };

        Ok(FineDetails {
            user: UserSummary {
                id: fine.user_id,
                username: row.user_username,
                email: row.user_email,
            },
            book,
            fine,
        })
    }
}

#[async_trait]
impl FineRepository for SqliteFineRepository {
    async fn upsert_pending(&self, assessment: &FineAssessment) -> Result<Fine> {
        let now = Utc::now().naive_utc();

        // One statement keyed by the unique issue_id, so concurrent returns and
        // refreshes cannot race into a second row. Figures only ever grow.
        sqlx::query(
            r#"
            INSERT INTO fines (
                id, user_id, book_id, issue_id, amount, due_date, return_date,
                days_overdue, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(issue_id) DO UPDATE SET
                amount = MAX(fines.amount, excluded.amount),
                days_overdue = MAX(fines.days_overdue, excluded.days_overdue),
                return_date = COALESCE(excluded.return_date, fines.return_date),
                updated_at = excluded.updated_at
            WHERE fines.status = 'pending'
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(assessment.user_id.to_string())
        .bind(assessment.book_id.to_string())
        .bind(assessment.issue_id.to_string())
        .bind(assessment.amount)
        .bind(assessment.due_date.naive_utc())
        .bind(assessment.return_date.map(|dt| dt.naive_utc()))
        .bind(assessment.days_overdue)
        .bind(FineStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_issue(assessment.issue_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve reconciled fine".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Fine>> {
        let row = sqlx::query_as::<_, FineRow>(&format!(
            "SELECT {} FROM fines WHERE id = ?",
            FINE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_fine).transpose()
    }

    async fn find_by_issue(&self, issue_id: Uuid) -> Result<Option<Fine>> {
        let row = sqlx::query_as::<_, FineRow>(&format!(
            "SELECT {} FROM fines WHERE issue_id = ?",
            FINE_COLUMNS
        ))
        .bind(issue_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_fine).transpose()
    }

    async fn find_details(&self, id: Uuid) -> Result<Option<FineDetails>> {
        let row = sqlx::query_as::<_, FineDetailsRow>(&format!("{} WHERE f.id = ?", SELECT_DETAILS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_details).transpose()
    }

    async fn list_details(&self, user_id: Option<Uuid>) -> Result<Vec<FineDetails>> {
        let rows = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, FineDetailsRow>(&format!(
                    "{} WHERE f.user_id = ? ORDER BY f.created_at DESC",
                    SELECT_DETAILS
                ))
                .bind(user_id.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, FineDetailsRow>(&format!(
                    "{} ORDER BY f.created_at DESC",
                    SELECT_DETAILS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter()
            .map(Self::row_to_details)
            .collect()
    }

    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<Option<Fine>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE fines
            SET status = ?, paid_at = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(FineStatus::Paid.as_str())
        .bind(paid_at.naive_utc())
        .bind(now)
        .bind(id.to_string())
        .bind(FineStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn totals(&self, status: FineStatus) -> Result<FineTotals> {
        let row = sqlx::query_as::<_, TotalsRow>(
            "SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count FROM fines WHERE status = ?",
        )
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(FineTotals {
            total: row.total,
            count: row.count,
        })
    }
}
