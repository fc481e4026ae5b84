//! Study event processor: the entry point that turns a submitted result into
//! its full set of consequences (history row, scheduled review, XP credit,
//! mission progress) inside one transaction.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::data::pooled_area_for;
use crate::db::{self, Db};
use crate::error::{retry_transient, EngineError, EngineResult};
use crate::ledger;
use crate::missions;
use crate::models::{ActionKind, Mission, ProfileSnapshot, Subject};
use crate::srs::{self, ReviewStage};

/// XP multipliers and bonuses. Deployment policy, not contract: the values
/// below are the defaults the progress bars were tuned against.
#[derive(Debug, Clone)]
pub struct XpPolicy {
    /// XP per question in an ordinary study session.
    pub study_per_question: f64,
    /// XP per question in a simulated-exam batch.
    pub exam_per_question: f64,
    /// Flat bonus for completing a scheduled review.
    pub review_flat_bonus: i64,
    /// Volume bonus per question answered during a review.
    pub review_per_question: i64,
}

impl Default for XpPolicy {
    fn default() -> Self {
        XpPolicy {
            study_per_question: 2.0,
            exam_per_question: 2.5,
            review_flat_bonus: 100,
            review_per_question: 2,
        }
    }
}

/// One line of a simulated-exam submission.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaResult {
    pub area: String,
    pub correct: i64,
    pub total: i64,
}

/// Dashboard read model: profile, today's missions, today's volume.
#[derive(Debug, Serialize)]
pub struct GamerStatus {
    pub profile: ProfileSnapshot,
    pub missions: Vec<Mission>,
    pub questions_today: i64,
}

#[derive(Clone)]
pub struct Engine {
    db: Db,
    policy: XpPolicy,
}

impl Engine {
    pub fn new(db: Db) -> Self {
        Engine {
            db,
            policy: XpPolicy::default(),
        }
    }

    pub fn with_policy(db: Db, policy: XpPolicy) -> Self {
        Engine { db, policy }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Records an ordinary study session. Named curriculum subjects must
    /// already exist; pooled names (question bank, simulated buckets) are
    /// created on first reference. Validation failures leave no writes.
    pub async fn record_study(
        &self,
        user_id: &str,
        subject_name: &str,
        correct: i64,
        total: i64,
        date: NaiveDate,
    ) -> EngineResult<String> {
        validate_result(correct, total)?;

        let db = &self.db;
        let policy = &self.policy;
        retry_transient("record study", || async move {
            let mut tx = db.begin().await?;

            let subject = resolve_subject(&mut tx, subject_name).await?;

            db::insert_history(&mut tx, user_id, &subject.id, date, correct, total).await?;

            if !subject.area.is_pooled() {
                db::insert_review(
                    &mut tx,
                    user_id,
                    &subject.id,
                    srs::initial_review_date(date),
                    ReviewStage::OneWeek.label(),
                )
                .await?;
            }

            let xp = (total as f64 * policy.study_per_question) as i64;
            ledger::credit_in_tx(&mut tx, user_id, xp).await?;

            let notices = missions::advance_in_tx(
                &mut tx,
                user_id,
                date,
                ActionKind::QuestionsAnswered,
                total,
            )
            .await?;

            tx.commit().await?;

            log::info!(
                "recorded study for user {} on '{}': {}/{} (+{} xp)",
                user_id,
                subject.name,
                correct,
                total,
                xp
            );
            Ok(compose("✅ Study session recorded!", &notices))
        })
        .await
    }

    /// Records a simulated-exam batch: one history row per area under its
    /// pooled `"Simulated - <Area>"` subject, never any review, and a single
    /// aggregate XP credit over the summed volume.
    pub async fn record_simulated_exam(
        &self,
        user_id: &str,
        results: &[AreaResult],
        date: NaiveDate,
    ) -> EngineResult<String> {
        // Zero-total lines are skipped, everything else validates up front.
        for line in results.iter().filter(|l| l.total > 0) {
            validate_result(line.correct, line.total)?;
        }

        let db = &self.db;
        let policy = &self.policy;
        retry_transient("record simulated exam", || async move {
            let mut tx = db.begin().await?;

            let mut total_questions = 0;
            for line in results.iter().filter(|l| l.total > 0) {
                total_questions += line.total;
                let name = format!("Simulated - {}", line.area);
                let subject = resolve_subject(&mut tx, &name).await?;
                db::insert_history(&mut tx, user_id, &subject.id, date, line.correct, line.total)
                    .await?;
            }

            let xp = (total_questions as f64 * policy.exam_per_question) as i64;
            ledger::credit_in_tx(&mut tx, user_id, xp).await?;

            let notices = missions::advance_in_tx(
                &mut tx,
                user_id,
                date,
                ActionKind::QuestionsAnswered,
                total_questions,
            )
            .await?;

            tx.commit().await?;

            log::info!(
                "recorded simulated exam for user {}: {} questions (+{} xp)",
                user_id,
                total_questions,
                xp
            );
            Ok(compose("✅ Simulated exam saved!", &notices))
        })
        .await
    }

    /// Completes a pending review: history row dated today, the next cadence
    /// stage scheduled when one exists, review XP and mission credit.
    pub async fn complete_review(
        &self,
        review_id: &str,
        correct: i64,
        total: i64,
    ) -> EngineResult<String> {
        self.complete_review_on(review_id, correct, total, Utc::now().date_naive())
            .await
    }

    async fn complete_review_on(
        &self,
        review_id: &str,
        correct: i64,
        total: i64,
        today: NaiveDate,
    ) -> EngineResult<String> {
        validate_result(correct, total)?;

        let db = &self.db;
        let policy = &self.policy;
        retry_transient("complete review", || async move {
            let mut tx = db.begin().await?;

            let review = db::get_review(&mut tx, review_id)
                .await?
                .ok_or_else(|| EngineError::ReviewNotFound(review_id.to_string()))?;

            // Conditional update, so a racing duplicate submit loses here.
            if !db::mark_review_completed(&mut tx, review_id).await? {
                return Err(EngineError::ReviewAlreadyCompleted(review_id.to_string()));
            }

            let user_id = review.user_id.clone();
            db::insert_history(&mut tx, &user_id, &review.subject_id, today, correct, total)
                .await?;

            let next = match ReviewStage::parse(&review.stage) {
                Some(stage) => stage.next(),
                None => {
                    // Data-integrity fallback: an unknown label ends the cycle
                    // instead of wedging the obligation forever.
                    log::warn!(
                        "review {} carries unrecognized stage '{}', treating as terminal",
                        review_id,
                        review.stage
                    );
                    None
                }
            };

            let mut message = String::from("✅ Review completed!");
            if let Some((days, next_stage)) = next {
                db::insert_review(
                    &mut tx,
                    &user_id,
                    &review.subject_id,
                    today + chrono::Duration::days(days),
                    next_stage.label(),
                )
                .await?;
                message.push_str(&format!(
                    " Next review in {} days ({}).",
                    days,
                    next_stage.label()
                ));
            }

            let xp = policy.review_flat_bonus + total * policy.review_per_question;
            ledger::credit_in_tx(&mut tx, &user_id, xp).await?;

            let notices =
                missions::advance_in_tx(&mut tx, &user_id, today, ActionKind::ReviewCompleted, 1)
                    .await?;

            tx.commit().await?;
            Ok(compose(&message, &notices))
        })
        .await
    }

    /// Dashboard status: profile snapshot, today's missions (created if
    /// absent), and today's answered-question count.
    pub async fn status(&self, user_id: &str, date: NaiveDate) -> EngineResult<GamerStatus> {
        let profile = ledger::profile_snapshot(&self.db, user_id).await?;
        let missions = missions::ensure_today(&self.db, user_id, date).await?;
        let questions_today = self.db.questions_answered_on(user_id, date).await?;
        Ok(GamerStatus {
            profile,
            missions,
            questions_today,
        })
    }

    /// Bulk reset: wipes the user's study history. Reviews, profile and
    /// missions are left alone.
    pub async fn reset_progress(&self, user_id: &str) -> EngineResult<u64> {
        Ok(self.db.clear_history(user_id).await?)
    }
}

fn validate_result(correct: i64, total: i64) -> EngineResult<()> {
    if total <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "total must be positive, got {total}"
        )));
    }
    if correct < 0 || correct > total {
        return Err(EngineError::InvalidInput(format!(
            "correct must be between 0 and {total}, got {correct}"
        )));
    }
    Ok(())
}

/// Looks a subject up by name, creating pooled subjects on first reference.
/// Curriculum names that do not exist are an error.
async fn resolve_subject(
    conn: &mut SqliteConnection,
    name: &str,
) -> EngineResult<Subject> {
    if let Some(subject) = db::find_subject_by_name(conn, name).await? {
        return Ok(subject);
    }
    match pooled_area_for(name) {
        Some(area) => Ok(db::insert_subject(conn, name, area).await?),
        None => Err(EngineError::SubjectNotFound(name.to_string())),
    }
}

fn compose(message: &str, notices: &[String]) -> String {
    if notices.is_empty() {
        message.to_string()
    } else {
        format!("{} | {}", message, notices.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClinicalArea, ReviewStatus};

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn engine() -> Engine {
        Engine::new(Db::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn record_study_writes_history_review_and_xp() {
        let e = engine().await;
        let msg = e
            .record_study("ana", "Diabetes Mellitus", 8, 10, d("2026-03-01"))
            .await
            .unwrap();
        assert!(msg.contains("recorded"));

        let history = e.db().list_history("ana").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].correct, 8);
        assert_eq!(history[0].total, 10);
        assert!((history[0].pct - 80.0).abs() < f64::EPSILON);

        let reviews = e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].scheduled_for, d("2026-03-08"));
        assert_eq!(reviews[0].stage, "1 week");
        assert_eq!(reviews[0].subject, "Diabetes Mellitus");

        let s = ledger::profile_snapshot(e.db(), "ana").await.unwrap();
        assert_eq!(s.lifetime_xp, 20); // 2 xp per question
    }

    #[tokio::test]
    async fn invalid_input_leaves_no_side_effects() {
        let e = engine().await;

        for (correct, total) in [(5, 0), (11, 10), (-1, 10)] {
            let err = e
                .record_study("ana", "Diabetes Mellitus", correct, total, d("2026-03-01"))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)));
        }

        assert!(e.db().list_history("ana").await.unwrap().is_empty());
        assert!(e.db().list_reviews("ana", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_curriculum_subject_is_rejected() {
        let e = engine().await;
        let err = e
            .record_study("ana", "Totally New Topic", 5, 10, d("2026-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SubjectNotFound(_)));
        assert!(e.db().list_history("ana").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pooled_subjects_never_schedule_reviews() {
        let e = engine().await;

        e.record_study("ana", "Question Bank - Free Practice", 30, 50, d("2026-03-01"))
            .await
            .unwrap();
        // Auto-created pooled bucket.
        e.record_study("ana", "Simulated - Surgery", 40, 60, d("2026-03-01"))
            .await
            .unwrap();

        assert!(e.db().list_reviews("ana", None).await.unwrap().is_empty());

        let subject = e
            .db()
            .find_subject_by_name("Simulated - Surgery")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subject.area, ClinicalArea::Simulated);
    }

    #[tokio::test]
    async fn completing_a_review_advances_the_cadence() {
        let e = engine().await;
        e.record_study("ana", "Acute Appendicitis", 8, 10, d("2026-03-01"))
            .await
            .unwrap();

        let pending = e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap();
        let msg = e
            .complete_review_on(&pending[0].id, 9, 10, d("2026-03-08"))
            .await
            .unwrap();
        assert!(msg.contains("30 days"));
        assert!(msg.contains("1 month"));

        let pending = e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].stage, "1 month");
        assert_eq!(pending[0].scheduled_for, d("2026-04-07"));

        // Review history row written with the completion date.
        let history = e.db().list_history("ana").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].study_date, d("2026-03-08"));

        // Study 20 + review (100 flat + 2*10) + review-mission reward 150.
        let s = ledger::profile_snapshot(e.db(), "ana").await.unwrap();
        assert_eq!(s.lifetime_xp, 20 + 120 + 150);
    }

    #[tokio::test]
    async fn duplicate_completion_is_rejected() {
        let e = engine().await;
        e.record_study("ana", "Acute Appendicitis", 8, 10, d("2026-03-01"))
            .await
            .unwrap();
        let pending = e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap();

        e.complete_review_on(&pending[0].id, 9, 10, d("2026-03-08"))
            .await
            .unwrap();
        let err = e
            .complete_review_on(&pending[0].id, 9, 10, d("2026-03-08"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReviewAlreadyCompleted(_)));

        let err = e
            .complete_review_on("no-such-review", 9, 10, d("2026-03-08"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ReviewNotFound(_)));
    }

    #[tokio::test]
    async fn terminal_stage_ends_the_cycle() {
        let e = engine().await;
        e.record_study("ana", "Acute Appendicitis", 8, 10, d("2026-03-01"))
            .await
            .unwrap();

        // Walk 1 week -> 1 month -> 2 months -> 4 months -> done.
        let mut when = d("2026-03-08");
        for _ in 0..4 {
            let pending = e
                .db()
                .list_reviews("ana", Some(ReviewStatus::Pending))
                .await
                .unwrap();
            assert_eq!(pending.len(), 1);
            e.complete_review_on(&pending[0].id, 10, 10, when)
                .await
                .unwrap();
            when += chrono::Duration::days(30);
        }

        assert!(e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap()
            .is_empty());
        let all = e.db().list_reviews("ana", None).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn unknown_stage_label_is_treated_as_terminal() {
        let e = engine().await;
        let subject = e
            .db()
            .find_subject_by_name("Diabetes Mellitus")
            .await
            .unwrap()
            .unwrap();

        let mut tx = e.db().begin().await.unwrap();
        let review = db::insert_review(&mut tx, "ana", &subject.id, d("2026-03-08"), "3 fortnights")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let msg = e
            .complete_review_on(&review.id, 5, 10, d("2026-03-08"))
            .await
            .unwrap();
        assert!(msg.contains("completed"));
        assert!(!msg.contains("Next review"));
        assert!(e
            .db()
            .list_reviews("ana", Some(ReviewStatus::Pending))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn simulated_exam_credits_aggregate_xp_once() {
        let e = engine().await;
        let results = vec![
            AreaResult { area: "Surgery".into(), correct: 15, total: 20 },
            AreaResult { area: "Pediatrics".into(), correct: 10, total: 20 },
            AreaResult { area: "OB/GYN".into(), correct: 0, total: 0 }, // skipped
        ];

        e.record_simulated_exam("ana", &results, d("2026-03-01"))
            .await
            .unwrap();

        let history = e.db().list_history("ana").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(e.db().list_reviews("ana", None).await.unwrap().is_empty());

        // One aggregate credit: floor(2.5 * 40) = 100, plus the 20-question
        // mission reward (40 >= 20) of 100.
        let s = ledger::profile_snapshot(e.db(), "ana").await.unwrap();
        assert_eq!(s.lifetime_xp, 200);
    }

    #[tokio::test]
    async fn simulated_exam_rejects_bad_lines_before_writing() {
        let e = engine().await;
        let results = vec![
            AreaResult { area: "Surgery".into(), correct: 15, total: 20 },
            AreaResult { area: "Pediatrics".into(), correct: 30, total: 20 },
        ];

        let err = e
            .record_simulated_exam("ana", &results, d("2026-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(e.db().list_history("ana").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn study_mission_completion_shows_up_in_the_message() {
        let e = engine().await;
        let msg = e
            .record_study("ana", "Diabetes Mellitus", 18, 25, d("2026-03-01"))
            .await
            .unwrap();
        assert!(msg.contains("Answer 20 questions"));

        // 25 questions * 2 + mission reward 100.
        let s = ledger::profile_snapshot(e.db(), "ana").await.unwrap();
        assert_eq!(s.lifetime_xp, 150);
    }

    #[tokio::test]
    async fn reset_clears_history_only() {
        let e = engine().await;
        e.record_study("ana", "Diabetes Mellitus", 8, 10, d("2026-03-01"))
            .await
            .unwrap();

        let removed = e.reset_progress("ana").await.unwrap();
        assert_eq!(removed, 1);
        assert!(e.db().list_history("ana").await.unwrap().is_empty());
        assert_eq!(e.db().list_reviews("ana", None).await.unwrap().len(), 1);

        let s = ledger::profile_snapshot(e.db(), "ana").await.unwrap();
        assert_eq!(s.lifetime_xp, 20);
    }

    #[tokio::test]
    async fn status_reports_profile_missions_and_volume() {
        let e = engine().await;
        e.record_study("ana", "Diabetes Mellitus", 8, 10, d("2026-03-01"))
            .await
            .unwrap();

        let status = e.status("ana", d("2026-03-01")).await.unwrap();
        assert_eq!(status.profile.level, 1);
        assert_eq!(status.profile.title, "Freshman");
        assert_eq!(status.missions.len(), 2);
        assert_eq!(status.questions_today, 10);

        let quiz = status
            .missions
            .iter()
            .find(|m| m.kind == ActionKind::QuestionsAnswered)
            .unwrap();
        assert_eq!(quiz.progress, 10);
    }
}
