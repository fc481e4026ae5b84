use crate::models::ClinicalArea;

pub struct SeedSubject {
    pub name: &'static str,
    pub area: ClinicalArea,
}

/// Default curriculum seeded into an empty database, including the two pooled
/// practice buckets (free question bank and the general mock exam).
pub const SEED_SUBJECTS: &[SeedSubject] = &[
    SeedSubject { name: "Hemorrhagic Acute Abdomen", area: ClinicalArea::ObGyn },
    SeedSubject { name: "Acute Appendicitis", area: ClinicalArea::Surgery },
    SeedSubject { name: "Diabetes Mellitus", area: ClinicalArea::InternalMedicine },
    SeedSubject { name: "Arterial Hypertension", area: ClinicalArea::InternalMedicine },
    SeedSubject { name: "Prenatal Care", area: ClinicalArea::ObGyn },
    SeedSubject { name: "Immunization Schedule", area: ClinicalArea::Pediatrics },
    SeedSubject { name: "Public Health Principles", area: ClinicalArea::PreventiveMedicine },
    SeedSubject { name: "Question Bank - Free Practice", area: ClinicalArea::GeneralPool },
    SeedSubject { name: "Simulated - General", area: ClinicalArea::Simulated },
];

/// Name prefix for the pooled subjects backing simulated-exam batches.
pub const SIMULATED_PREFIX: &str = "Simulated";

/// Name prefix for the free question-bank pool.
pub const QUESTION_BANK_PREFIX: &str = "Question Bank";

/// Area for a subject name that is allowed to be created on first reference.
/// Curriculum subjects are managed rows and must already exist, so anything
/// that is not a pooled name returns `None`.
pub fn pooled_area_for(name: &str) -> Option<ClinicalArea> {
    if name.starts_with(SIMULATED_PREFIX) {
        Some(ClinicalArea::Simulated)
    } else if name.starts_with(QUESTION_BANK_PREFIX) {
        Some(ClinicalArea::GeneralPool)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_names_classify() {
        assert_eq!(
            pooled_area_for("Simulated - Pediatrics"),
            Some(ClinicalArea::Simulated)
        );
        assert_eq!(
            pooled_area_for("Question Bank - Free Practice"),
            Some(ClinicalArea::GeneralPool)
        );
        assert_eq!(pooled_area_for("Diabetes Mellitus"), None);
    }

    #[test]
    fn seed_contains_both_pools() {
        assert!(SEED_SUBJECTS.iter().any(|s| s.area == ClinicalArea::Simulated));
        assert!(SEED_SUBJECTS.iter().any(|s| s.area == ClinicalArea::GeneralPool));
    }
}
