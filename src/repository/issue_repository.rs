use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{BookSummary, Issue, IssueDetails, IssueStatus, NewIssue, UserSummary},
    error::{AppError, Result},
    repository::IssueRepository,
};

#[derive(FromRow)]
struct IssueRow {
    id: String,
    user_id: String,
    book_id: String,
    issue_date: Option<NaiveDateTime>,
    due_date: NaiveDateTime,
    return_date: Option<NaiveDateTime>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct IssueDetailsRow {
    #[sqlx(flatten)]
    issue: IssueRow,
    user_username: String,
    user_email: String,
    book_title: Option<String>,
    book_author: Option<String>,
    book_cover_image: Option<String>,
    book_category: Option<String>,
}

const ISSUE_COLUMNS: &str =
    "id, user_id, book_id, issue_date, due_date, return_date, status, created_at, updated_at";

const SELECT_DETAILS: &str = r#"
    SELECT i.id, i.user_id, i.book_id, i.issue_date, i.due_date, i.return_date,
           i.status, i.created_at, i.updated_at,
           u.username AS user_username, u.email AS user_email,
           b.title AS book_title, b.author AS book_author,
           b.cover_image AS book_cover_image, b.category AS book_category
    FROM issues i
    JOIN users u ON u.id = i.user_id
    LEFT JOIN books b ON b.id = i.book_id
"#;

pub struct SqliteIssueRepository {
    pool: SqlitePool,
}

impl SqliteIssueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_issue(row: IssueRow) -> Result<Issue> {
        let created_at = DateTime::from_naive_utc_and_offset(row.created_at, Utc);
        Ok(Issue {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            book_id: Uuid::parse_str(&row.book_id).map_err(|e| AppError::Database(e.to_string()))?,
            // Rows written without an explicit issue date fall back to creation time
            issue_date: row
                .issue_date
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or(created_at),
            due_date: DateTime::from_naive_utc_and_offset(row.due_date, Utc),
            return_date: row.return_date.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            status: IssueStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid issue status: {}", row.status)))?,
            created_at,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_details(row: IssueDetailsRow) -> Result<IssueDetails> {
        let issue = Self::row_to_issue(row.issue)?;
        let book = match (row.book_title, row.book_author, row.book_cover_image) {
            (Some(title), Some(author), Some(cover_image)) => Some(BookSummary {
                id: issue.book_id,
                title,
                author,
                cover_image,
                category: row.book_category,
            }),
            _ => None,
        };

        Ok(IssueDetails {
            user: UserSummary {
                id: issue.user_id,
                username: row.user_username,
                email: row.user_email,
            },
            book,
            issue,
        })
    }

    async fn fetch_details(&self, sql: &str, bind: Option<String>) -> Result<Vec<IssueDetails>> {
        let mut query = sqlx::query_as::<_, IssueDetailsRow>(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(Self::row_to_details)
            .collect()
    }
}

#[async_trait]
impl IssueRepository for SqliteIssueRepository {
    async fn create(&self, issue: NewIssue) -> Result<Issue> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO issues (
                id, user_id, book_id, issue_date, due_date, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(issue.user_id.to_string())
        .bind(issue.book_id.to_string())
        .bind(issue.issue_date.naive_utc())
        .bind(issue.due_date.naive_utc())
        .bind(IssueStatus::Issued.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("You already have this book issued".to_string())
            }
            other => other,
        })?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created issue".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Issue>> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM issues WHERE id = ?",
            ISSUE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_issue).transpose()
    }

    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<Issue>> {
        let row = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM issues WHERE user_id = ? AND book_id = ? AND status = ?",
            ISSUE_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(book_id.to_string())
        .bind(IssueStatus::Issued.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_issue).transpose()
    }

    async fn mark_returned(&self, id: Uuid, return_date: DateTime<Utc>) -> Result<Option<Issue>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE issues
            SET status = ?, return_date = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(IssueStatus::Returned.as_str())
        .bind(return_date.naive_utc())
        .bind(now)
        .bind(id.to_string())
        .bind(IssueStatus::Issued.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn list_active(&self) -> Result<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(&format!(
            "SELECT {} FROM issues WHERE status = ? ORDER BY created_at",
            ISSUE_COLUMNS
        ))
        .bind(IssueStatus::Issued.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_issue)
            .collect()
    }

    async fn list_details(&self, user_id: Option<Uuid>) -> Result<Vec<IssueDetails>> {
        match user_id {
            Some(user_id) => {
                let sql = format!("{} WHERE i.user_id = ? ORDER BY i.created_at DESC", SELECT_DETAILS);
                self.fetch_details(&sql, Some(user_id.to_string())).await
            }
            None => {
                let sql = format!("{} ORDER BY i.created_at DESC", SELECT_DETAILS);
                self.fetch_details(&sql, None).await
            }
        }
    }

    async fn list_active_details(&self) -> Result<Vec<IssueDetails>> {
        let sql = format!("{} WHERE i.status = ? ORDER BY i.created_at DESC", SELECT_DETAILS);
        self.fetch_details(&sql, Some(IssueStatus::Issued.as_str().to_string())).await
    }

    async fn count_active(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM issues WHERE status = ?")
            .bind(IssueStatus::Issued.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
