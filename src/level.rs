//! Level curve and titles. Pure arithmetic shared by the XP ledger and the
//! dashboard progress bar, so both always agree on the next threshold.

const XP_BASE: f64 = 1000.0;
const XP_GROWTH: f64 = 0.1;

/// XP required to advance past `level`.
///
/// `threshold = base * (1 + level * growth)`, which grows linearly and is
/// therefore monotone in `level`. Levels below 1 are clamped to 1.
pub fn threshold_for(level: i64) -> i64 {
    let level = level.max(1);
    (XP_BASE * (1.0 + level as f64 * XP_GROWTH)) as i64
}

/// Display title for a level, from the fixed rank ladder.
pub fn title_for(level: i64) -> &'static str {
    const TITLES: &[(i64, &str)] = &[
        (10, "Freshman"),
        (30, "Intern"),
        (60, "Resident"),
        (100, "Chief Resident"),
    ];
    TITLES
        .iter()
        .find(|(cap, _)| level <= *cap)
        .map(|(_, t)| *t)
        .unwrap_or("Legend")
}

/// Applies an XP credit to `(level, current_xp)` and cascades level-ups while
/// the accumulated XP still clears the (recomputed) threshold. A single large
/// credit can cross several levels; the leftover always ends up strictly
/// below the final level's threshold.
pub fn apply_credit(level: i64, current_xp: i64, amount: i64) -> (i64, i64) {
    let mut level = level.max(1);
    let mut xp = current_xp + amount;

    let mut threshold = threshold_for(level);
    while xp >= threshold {
        xp -= threshold;
        level += 1;
        threshold = threshold_for(level);
    }

    (level, xp)
}
