use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{ConnectOptions, Pool, Sqlite, SqliteConnection, Transaction};
use uuid::Uuid;

use crate::data::SEED_SUBJECTS;
use crate::models::{
    ClinicalArea, GamerProfile, HistoryEntry, Mission, ReviewEntry, ReviewListing, ReviewStatus,
    Subject,
};

#[derive(Clone)]
pub struct Db {
    pool: Pool<Sqlite>,
}

impl Db {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options).await?;

        let db = Db { pool };
        db.migrate().await?;
        db.seed_if_empty().await?;

        Ok(db)
    }

    /// Single-connection in-memory database, used by tests. One connection is
    /// required because every `:memory:` connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Db { pool };
        db.migrate().await?;
        db.seed_if_empty().await?;

        Ok(db)
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                area TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                study_date DATE NOT NULL,
                correct INTEGER NOT NULL,
                total INTEGER NOT NULL,
                pct REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                scheduled_for DATE NOT NULL,
                stage TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending'
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                level INTEGER NOT NULL DEFAULT 1,
                current_xp INTEGER NOT NULL DEFAULT 0,
                lifetime_xp INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS missions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                mission_date DATE NOT NULL,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                target INTEGER NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                xp_reward INTEGER NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                UNIQUE(user_id, mission_date, kind)
            );

            CREATE INDEX IF NOT EXISTS idx_history_user_date ON history(user_id, study_date);
            CREATE INDEX IF NOT EXISTS idx_reviews_user_status ON reviews(user_id, status);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn seed_if_empty(&self) -> anyhow::Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM subjects")
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            log::info!("seeding default curriculum ({} subjects)", SEED_SUBJECTS.len());
            for seed in SEED_SUBJECTS {
                sqlx::query("INSERT OR IGNORE INTO subjects (id, name, area) VALUES (?, ?, ?)")
                    .bind(Uuid::new_v4().to_string())
                    .bind(seed.name)
                    .bind(seed.area.as_str())
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    // --- pool-level reads (single statements, no chaining) ---

    pub async fn find_subject_by_name(&self, name: &str) -> Result<Option<Subject>, sqlx::Error> {
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_subject(&self, id: &str) -> Result<Option<Subject>, sqlx::Error> {
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, sqlx::Error> {
        sqlx::query_as::<_, Subject>("SELECT * FROM subjects ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    /// Area correction for an existing subject.
    pub async fn set_subject_area(
        &self,
        id: &str,
        area: ClinicalArea,
    ) -> Result<bool, sqlx::Error> {
        let res = sqlx::query("UPDATE subjects SET area = ? WHERE id = ?")
            .bind(area.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn list_history(&self, user_id: &str) -> Result<Vec<HistoryEntry>, sqlx::Error> {
        sqlx::query_as::<_, HistoryEntry>(
            "SELECT * FROM history WHERE user_id = ? ORDER BY study_date, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Bulk reset of a user's entire study log.
    pub async fn clear_history(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let res = sqlx::query("DELETE FROM history WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    /// Questions answered by the user on `date`, for the daily dashboard.
    pub async fn questions_answered_on(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM history WHERE user_id = ? AND study_date = ?",
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
    }

    /// Reviews joined with subject name and area, sorted by scheduled date.
    pub async fn list_reviews(
        &self,
        user_id: &str,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<ReviewListing>, sqlx::Error> {
        let base = r#"
            SELECT r.id, s.name AS subject, s.area, r.scheduled_for, r.stage, r.status
            FROM reviews r
            JOIN subjects s ON s.id = r.subject_id
            WHERE r.user_id = ?
        "#;
        match status {
            Some(status) => {
                let sql = format!("{base} AND r.status = ? ORDER BY r.scheduled_for, r.id");
                sqlx::query_as::<_, ReviewListing>(&sql)
                    .bind(user_id)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{base} ORDER BY r.scheduled_for, r.id");
                sqlx::query_as::<_, ReviewListing>(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await
            }
        }
    }
}

// --- transaction-scoped operations ---
//
// Everything below takes an explicit connection so a study event can chain
// history, review, XP and mission writes inside one transaction.

pub async fn find_subject_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>("SELECT * FROM subjects WHERE name = ?")
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn insert_subject(
    conn: &mut SqliteConnection,
    name: &str,
    area: ClinicalArea,
) -> Result<Subject, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO subjects (id, name, area) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(area.as_str())
        .execute(conn)
        .await?;
    Ok(Subject {
        id,
        name: name.to_string(),
        area,
    })
}

pub async fn insert_history(
    conn: &mut SqliteConnection,
    user_id: &str,
    subject_id: &str,
    study_date: NaiveDate,
    correct: i64,
    total: i64,
) -> Result<HistoryEntry, sqlx::Error> {
    let entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        subject_id: subject_id.to_string(),
        study_date,
        correct,
        total,
        pct: correct as f64 / total as f64 * 100.0,
    };
    sqlx::query(
        "INSERT INTO history (id, user_id, subject_id, study_date, correct, total, pct)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(&entry.subject_id)
    .bind(entry.study_date)
    .bind(entry.correct)
    .bind(entry.total)
    .bind(entry.pct)
    .execute(conn)
    .await?;
    Ok(entry)
}

pub async fn insert_review(
    conn: &mut SqliteConnection,
    user_id: &str,
    subject_id: &str,
    scheduled_for: NaiveDate,
    stage: &str,
) -> Result<ReviewEntry, sqlx::Error> {
    let entry = ReviewEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        subject_id: subject_id.to_string(),
        scheduled_for,
        stage: stage.to_string(),
        status: ReviewStatus::Pending,
    };
    sqlx::query(
        "INSERT INTO reviews (id, user_id, subject_id, scheduled_for, stage, status)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(&entry.subject_id)
    .bind(entry.scheduled_for)
    .bind(&entry.stage)
    .bind(entry.status.as_str())
    .execute(conn)
    .await?;
    Ok(entry)
}

pub async fn get_review(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ReviewEntry>, sqlx::Error> {
    sqlx::query_as::<_, ReviewEntry>("SELECT * FROM reviews WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Pending -> Completed transition. Returns false when the row was already
/// completed (or is gone), so a stale second submit cannot run the completion
/// chain twice.
pub async fn mark_review_completed(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE reviews SET status = 'Completed' WHERE id = ? AND status = 'Pending'")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn ensure_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<GamerProfile, sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO profiles (user_id, level, current_xp, lifetime_xp) VALUES (?, 1, 0, 0)",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, GamerProfile>("SELECT * FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(conn)
        .await
}

pub async fn save_profile(
    conn: &mut SqliteConnection,
    profile: &GamerProfile,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE profiles SET level = ?, current_xp = ?, lifetime_xp = ? WHERE user_id = ?")
        .bind(profile.level)
        .bind(profile.current_xp)
        .bind(profile.lifetime_xp)
        .bind(&profile.user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Idempotent mission instantiation: the `(user, date, kind)` unique key
/// makes a second call of the day a no-op.
pub async fn insert_mission_ignore(
    conn: &mut SqliteConnection,
    user_id: &str,
    date: NaiveDate,
    kind: &str,
    description: &str,
    target: i64,
    xp_reward: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO missions
            (id, user_id, mission_date, kind, description, target, progress, xp_reward, completed)
         VALUES (?, ?, ?, ?, ?, ?, 0, ?, 0)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(date)
    .bind(kind)
    .bind(description)
    .bind(target)
    .bind(xp_reward)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_missions_for_day(
    conn: &mut SqliteConnection,
    user_id: &str,
    date: NaiveDate,
) -> Result<Vec<Mission>, sqlx::Error> {
    sqlx::query_as::<_, Mission>(
        "SELECT * FROM missions WHERE user_id = ? AND mission_date = ? ORDER BY kind",
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(conn)
    .await
}

pub async fn set_mission_progress(
    conn: &mut SqliteConnection,
    id: &str,
    progress: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE missions SET progress = ? WHERE id = ? AND completed = 0")
        .bind(progress)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Flips a mission to completed, clamping the displayed progress at its
/// target. The `completed = 0` guard makes the flip first-writer-wins, which
/// is what keeps the reward credit at-most-once.
pub async fn complete_mission(
    conn: &mut SqliteConnection,
    id: &str,
    target: i64,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE missions SET progress = ?, completed = 1 WHERE id = ? AND completed = 0")
        .bind(target)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(res.rows_affected() == 1)
}
