use chrono::{Duration, NaiveDate};

/// Days between first studying a subject and its first review.
pub const INITIAL_REVIEW_DAYS: i64 = 7;

/// Stage of the escalating review cadence.
///
/// The full cycle for a subject is:
/// study -> +7d "1 week" -> +30d "1 month" -> +60d "2 months"
///       -> +120d "4 months" -> done.
///
/// Stage labels are stored as plain text, so a row written by an older (or
/// buggy) client can carry a label we no longer recognize. `parse` returns
/// `None` for those and callers treat the review as terminal rather than
/// refusing to complete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    OneWeek,
    OneMonth,
    TwoMonths,
    FourMonths,
}

impl ReviewStage {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStage::OneWeek => "1 week",
            ReviewStage::OneMonth => "1 month",
            ReviewStage::TwoMonths => "2 months",
            ReviewStage::FourMonths => "4 months",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStage> {
        match s {
            "1 week" => Some(ReviewStage::OneWeek),
            "1 month" => Some(ReviewStage::OneMonth),
            "2 months" => Some(ReviewStage::TwoMonths),
            "4 months" => Some(ReviewStage::FourMonths),
            _ => None,
        }
    }

    /// Next step of the cadence: `(days until it is due, its stage)`.
    /// `None` means the cycle ends here.
    pub fn next(&self) -> Option<(i64, ReviewStage)> {
        match self {
            ReviewStage::OneWeek => Some((30, ReviewStage::OneMonth)),
            ReviewStage::OneMonth => Some((60, ReviewStage::TwoMonths)),
            ReviewStage::TwoMonths => Some((120, ReviewStage::FourMonths)),
            ReviewStage::FourMonths => None,
        }
    }
}

/// Date of the first review for a subject studied on `study_date`.
pub fn initial_review_date(study_date: NaiveDate) -> NaiveDate {
    study_date + Duration::days(INITIAL_REVIEW_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn initial_review_is_one_week_out() {
        assert_eq!(initial_review_date(d("2026-03-01")), d("2026-03-08"));
    }

    #[test]
    fn cadence_escalates_then_terminates() {
        assert_eq!(
            ReviewStage::OneWeek.next(),
            Some((30, ReviewStage::OneMonth))
        );
        assert_eq!(
            ReviewStage::OneMonth.next(),
            Some((60, ReviewStage::TwoMonths))
        );
        assert_eq!(
            ReviewStage::TwoMonths.next(),
            Some((120, ReviewStage::FourMonths))
        );
        assert_eq!(ReviewStage::FourMonths.next(), None);
    }

    #[test]
    fn labels_round_trip() {
        for stage in [
            ReviewStage::OneWeek,
            ReviewStage::OneMonth,
            ReviewStage::TwoMonths,
            ReviewStage::FourMonths,
        ] {
            assert_eq!(ReviewStage::parse(stage.label()), Some(stage));
        }
    }

    #[test]
    fn unknown_label_is_unparseable() {
        assert_eq!(ReviewStage::parse("3 fortnights"), None);
        assert_eq!(ReviewStage::parse(""), None);
    }
}
