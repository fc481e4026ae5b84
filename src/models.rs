use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// Clinical area a subject belongs to. `GeneralPool` and `Simulated` are the
/// pooled practice buckets: they never enter the review cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClinicalArea {
    Surgery,
    InternalMedicine,
    ObGyn,
    Pediatrics,
    PreventiveMedicine,
    GeneralPool,
    Simulated,
    Other,
}

impl ClinicalArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalArea::Surgery => "Surgery",
            ClinicalArea::InternalMedicine => "Internal Medicine",
            ClinicalArea::ObGyn => "OB/GYN",
            ClinicalArea::Pediatrics => "Pediatrics",
            ClinicalArea::PreventiveMedicine => "Preventive Medicine",
            ClinicalArea::GeneralPool => "General Pool",
            ClinicalArea::Simulated => "Simulated",
            ClinicalArea::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<ClinicalArea> {
        match s {
            "Surgery" => Some(ClinicalArea::Surgery),
            "Internal Medicine" => Some(ClinicalArea::InternalMedicine),
            "OB/GYN" => Some(ClinicalArea::ObGyn),
            "Pediatrics" => Some(ClinicalArea::Pediatrics),
            "Preventive Medicine" => Some(ClinicalArea::PreventiveMedicine),
            "General Pool" => Some(ClinicalArea::GeneralPool),
            "Simulated" => Some(ClinicalArea::Simulated),
            "Other" => Some(ClinicalArea::Other),
            _ => None,
        }
    }

    /// Unknown tags fall back to `Other` so a bad row cannot wedge a read path.
    pub fn parse_lossy(s: &str) -> ClinicalArea {
        ClinicalArea::parse(s).unwrap_or_else(|| {
            log::warn!("unrecognized clinical area tag '{}', treating as Other", s);
            ClinicalArea::Other
        })
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, ClinicalArea::GeneralPool | ClinicalArea::Simulated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    Completed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "Pending",
            ReviewStatus::Completed => "Completed",
        }
    }
}

/// Kind of study event a mission counts. Matches the `kind` column of the
/// missions table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    QuestionsAnswered,
    ReviewCompleted,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::QuestionsAnswered => "questions-answered",
            ActionKind::ReviewCompleted => "review-completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub area: ClinicalArea,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for Subject {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let area: String = row.try_get("area")?;
        Ok(Subject {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            area: ClinicalArea::parse_lossy(&area),
        })
    }
}

/// Immutable record of one study or review-completion event.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub study_date: NaiveDate,
    pub correct: i64,
    pub total: i64,
    pub pct: f64,
}

/// A scheduled review obligation. `stage` is kept as the raw stored label so
/// an unrecognized value survives the round trip and is handled (treated as
/// terminal) at completion time instead of poisoning every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub scheduled_for: NaiveDate,
    pub stage: String,
    pub status: ReviewStatus,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ReviewEntry {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = match status.as_str() {
            "Completed" => ReviewStatus::Completed,
            _ => ReviewStatus::Pending,
        };
        Ok(ReviewEntry {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            subject_id: row.try_get("subject_id")?,
            scheduled_for: row.try_get("scheduled_for")?,
            stage: row.try_get("stage")?,
            status,
        })
    }
}

/// Review joined with its subject, for the listing endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewListing {
    pub id: String,
    pub subject: String,
    pub area: ClinicalArea,
    pub scheduled_for: NaiveDate,
    pub stage: String,
    pub status: ReviewStatus,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ReviewListing {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = match status.as_str() {
            "Completed" => ReviewStatus::Completed,
            _ => ReviewStatus::Pending,
        };
        let area: String = row.try_get("area")?;
        Ok(ReviewListing {
            id: row.try_get("id")?,
            subject: row.try_get("subject")?,
            area: ClinicalArea::parse_lossy(&area),
            scheduled_for: row.try_get("scheduled_for")?,
            stage: row.try_get("stage")?,
            status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GamerProfile {
    pub user_id: String,
    pub level: i64,
    pub current_xp: i64,
    pub lifetime_xp: i64,
}

/// Profile read model with the derived fields the dashboard renders.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSnapshot {
    pub level: i64,
    pub current_xp: i64,
    pub lifetime_xp: i64,
    pub title: &'static str,
    pub next_threshold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub user_id: String,
    pub mission_date: NaiveDate,
    pub kind: ActionKind,
    pub description: String,
    pub target: i64,
    pub progress: i64,
    pub xp_reward: i64,
    pub completed: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for Mission {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let kind = match kind.as_str() {
            "review-completed" => ActionKind::ReviewCompleted,
            _ => ActionKind::QuestionsAnswered,
        };
        Ok(Mission {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            mission_date: row.try_get("mission_date")?,
            kind,
            description: row.try_get("description")?,
            target: row.try_get("target")?,
            progress: row.try_get("progress")?,
            xp_reward: row.try_get("xp_reward")?,
            completed: row.try_get("completed")?,
        })
    }
}
