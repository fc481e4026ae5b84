//! XP ledger: the only writer of gamer profiles. Credits go through a
//! read-modify-write inside a transaction so two concurrent submits cannot
//! drop XP, with a bounded retry for writer contention.

use crate::db::{self, Db};
use crate::error::{retry_transient, EngineError, EngineResult};
use crate::level;
use crate::models::{GamerProfile, ProfileSnapshot};
use sqlx::SqliteConnection;

pub fn snapshot(profile: &GamerProfile) -> ProfileSnapshot {
    ProfileSnapshot {
        level: profile.level,
        current_xp: profile.current_xp,
        lifetime_xp: profile.lifetime_xp,
        title: level::title_for(profile.level),
        next_threshold: level::threshold_for(profile.level),
    }
}

/// Credit step for use inside an already-open event transaction. A zero
/// amount still ensures the profile exists but writes nothing.
pub async fn credit_in_tx(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i64,
) -> Result<GamerProfile, sqlx::Error> {
    let mut profile = db::ensure_profile(conn, user_id).await?;

    if amount > 0 {
        let (new_level, new_xp) = level::apply_credit(profile.level, profile.current_xp, amount);
        if new_level > profile.level {
            log::info!(
                "user {} leveled up: {} -> {}",
                user_id,
                profile.level,
                new_level
            );
        }
        profile.level = new_level;
        profile.current_xp = new_xp;
        profile.lifetime_xp += amount;
        db::save_profile(conn, &profile).await?;
    }

    Ok(profile)
}

/// Standalone credit: own transaction, retried a few times on transient
/// lock contention before giving up with `StorageUnavailable`.
pub async fn credit(db: &Db, user_id: &str, amount: i64) -> EngineResult<ProfileSnapshot> {
    if amount < 0 {
        return Err(EngineError::InvalidInput(format!(
            "negative XP credit: {amount}"
        )));
    }

    let profile = retry_transient("xp credit", || async move {
        let mut tx = db.begin().await?;
        let profile = credit_in_tx(&mut tx, user_id, amount).await?;
        tx.commit().await?;
        Ok(profile)
    })
    .await?;
    Ok(snapshot(&profile))
}

/// Profile read model for the dashboard, creating the level-1 profile on
/// first sight of the user.
pub async fn profile_snapshot(db: &Db, user_id: &str) -> EngineResult<ProfileSnapshot> {
    let profile = retry_transient("profile snapshot", || async move {
        let mut tx = db.begin().await?;
        let profile = db::ensure_profile(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(profile)
    })
    .await?;
    Ok(snapshot(&profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::threshold_for;

    #[tokio::test]
    async fn credit_accumulates_and_conserves_lifetime_xp() {
        let db = Db::in_memory().await.unwrap();

        let s1 = credit(&db, "ana", 300).await.unwrap();
        assert_eq!(s1.level, 1);
        assert_eq!(s1.current_xp, 300);
        assert_eq!(s1.lifetime_xp, 300);

        let s2 = credit(&db, "ana", 500).await.unwrap();
        assert_eq!(s2.current_xp, 800);
        assert_eq!(s2.lifetime_xp, 800);
    }

    #[tokio::test]
    async fn credit_cascades_levels() {
        let db = Db::in_memory().await.unwrap();

        // 1100 + 1200 spent, 200 left over at level 3.
        let s = credit(&db, "ana", 2500).await.unwrap();
        assert_eq!(s.level, 3);
        assert_eq!(s.current_xp, 200);
        assert_eq!(s.lifetime_xp, 2500);
        assert!(s.current_xp < threshold_for(s.level));
    }

    #[tokio::test]
    async fn level_three_overflow_scenario() {
        let db = Db::in_memory().await.unwrap();

        // Park the profile at level 3 with 1250 current XP.
        credit(&db, "ana", 1100 + 1200 + 1250).await.unwrap();
        let s = credit(&db, "ana", 200).await.unwrap();
        assert_eq!(s.level, 4);
        assert_eq!(s.current_xp, 150);
    }

    #[tokio::test]
    async fn zero_credit_succeeds_without_change() {
        let db = Db::in_memory().await.unwrap();

        credit(&db, "ana", 250).await.unwrap();
        let s = credit(&db, "ana", 0).await.unwrap();
        assert_eq!(s.level, 1);
        assert_eq!(s.current_xp, 250);
        assert_eq!(s.lifetime_xp, 250);
    }

    #[tokio::test]
    async fn negative_credit_is_rejected() {
        let db = Db::in_memory().await.unwrap();
        let err = credit(&db, "ana", -5).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn snapshot_derives_title_and_threshold() {
        let db = Db::in_memory().await.unwrap();
        let s = profile_snapshot(&db, "ana").await.unwrap();
        assert_eq!(s.level, 1);
        assert_eq!(s.title, "Freshman");
        assert_eq!(s.next_threshold, 1100);
    }
}
