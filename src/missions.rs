//! Daily missions: fixed objective templates instantiated per user per day,
//! advanced by qualifying study events, paying out an XP reward exactly once
//! on completion.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::db::{self, Db};
use crate::error::{retry_transient, EngineResult};
use crate::ledger;
use crate::models::{ActionKind, Mission};

pub struct MissionTemplate {
    pub description: &'static str,
    pub kind: ActionKind,
    pub target: i64,
    pub xp_reward: i64,
}

pub const DAILY_MISSIONS: &[MissionTemplate] = &[
    MissionTemplate {
        description: "Answer 20 questions",
        kind: ActionKind::QuestionsAnswered,
        target: 20,
        xp_reward: 100,
    },
    MissionTemplate {
        description: "Complete 1 review",
        kind: ActionKind::ReviewCompleted,
        target: 1,
        xp_reward: 150,
    },
];

/// Instantiates today's missions if they do not exist yet and returns the
/// full set. Safe to call any number of times per day; the unique key on
/// `(user, date, kind)` turns re-creation into a no-op.
pub async fn ensure_in_tx(
    conn: &mut SqliteConnection,
    user_id: &str,
    date: NaiveDate,
) -> Result<Vec<Mission>, sqlx::Error> {
    for template in DAILY_MISSIONS {
        db::insert_mission_ignore(
            conn,
            user_id,
            date,
            template.kind.as_str(),
            template.description,
            template.target,
            template.xp_reward,
        )
        .await?;
    }
    db::list_missions_for_day(conn, user_id, date).await
}

pub async fn ensure_today(db: &Db, user_id: &str, date: NaiveDate) -> EngineResult<Vec<Mission>> {
    retry_transient("ensure daily missions", || async move {
        let mut tx = db.begin().await?;
        let missions = ensure_in_tx(&mut tx, user_id, date).await?;
        tx.commit().await?;
        Ok(missions)
    })
    .await
}

/// Advances every open mission of `kind` for the day by `amount`. Crossing
/// the target completes the mission and credits its reward; the conditional
/// completion update guarantees the credit fires at most once per mission
/// even if two requests race on the same row.
pub async fn advance_in_tx(
    conn: &mut SqliteConnection,
    user_id: &str,
    date: NaiveDate,
    kind: ActionKind,
    amount: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let missions = ensure_in_tx(conn, user_id, date).await?;

    let mut notices = Vec::new();
    for mission in missions {
        if mission.completed || mission.kind != kind {
            continue;
        }

        let progress = mission.progress + amount;
        if progress >= mission.target {
            // Display progress clamps at the target.
            if db::complete_mission(conn, &mission.id, mission.target).await? {
                ledger::credit_in_tx(conn, user_id, mission.xp_reward).await?;
                notices.push(format!("🏆 Mission complete: {}", mission.description));
            }
        } else {
            db::set_mission_progress(conn, &mission.id, progress).await?;
        }
    }

    Ok(notices)
}

pub async fn advance(
    db: &Db,
    user_id: &str,
    date: NaiveDate,
    kind: ActionKind,
    amount: i64,
) -> EngineResult<Vec<String>> {
    retry_transient("mission advance", || async move {
        let mut tx = db.begin().await?;
        let notices = advance_in_tx(&mut tx, user_id, date, kind, amount).await?;
        tx.commit().await?;
        Ok(notices)
    })
    .await
}
