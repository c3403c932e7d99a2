use serde::{Deserialize, Serialize};

use super::domain::Credits;
use super::rejection::RejectionReason;

/// Load band and guard toggles handed to the validator at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPolicy {
    pub max_credits: Credits,
    pub min_credits: Option<Credits>,
    /// Apply the lower bound when admitting into a section.
    pub min_on_admission: bool,
    /// Apply the lower bound when dropping a section.
    pub min_on_drop: bool,
    pub retake_guard: bool,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            max_credits: Credits::whole(40),
            min_credits: Some(Credits::whole(10)),
            min_on_admission: false,
            min_on_drop: false,
            retake_guard: true,
        }
    }
}

impl EnrollmentPolicy {
    pub fn check_admission_load(&self, projected: Credits) -> Result<(), RejectionReason> {
        if projected > self.max_credits {
            return Err(RejectionReason::CreditLoadExceeded {
                projected,
                maximum: self.max_credits,
            });
        }
        if self.min_on_admission {
            self.check_floor(projected)?;
        }
        Ok(())
    }

    pub fn check_drop_load(&self, remaining: Credits) -> Result<(), RejectionReason> {
        if self.min_on_drop {
            self.check_floor(remaining)?;
        }
        Ok(())
    }

    fn check_floor(&self, projected: Credits) -> Result<(), RejectionReason> {
        match self.min_credits {
            Some(minimum) if projected < minimum => {
                Err(RejectionReason::CreditLoadBelowMinimum { projected, minimum })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_is_inclusive() {
        let policy = EnrollmentPolicy::default();
        assert!(policy.check_admission_load(Credits::whole(40)).is_ok());
        assert_eq!(
            policy.check_admission_load(Credits::from_tenths(401)),
            Err(RejectionReason::CreditLoadExceeded {
                projected: Credits::from_tenths(401),
                maximum: Credits::whole(40),
            })
        );
    }

    #[test]
    fn floor_only_applies_where_enabled() {
        let relaxed = EnrollmentPolicy::default();
        assert!(relaxed.check_admission_load(Credits::whole(3)).is_ok());
        assert!(relaxed.check_drop_load(Credits::ZERO).is_ok());

        let strict = EnrollmentPolicy {
            min_on_admission: true,
            min_on_drop: true,
            ..EnrollmentPolicy::default()
        };
        assert!(matches!(
            strict.check_admission_load(Credits::whole(3)),
            Err(RejectionReason::CreditLoadBelowMinimum { .. })
        ));
        assert!(strict.check_drop_load(Credits::whole(10)).is_ok());
        assert!(strict.check_drop_load(Credits::whole(9)).is_err());
    }

    #[test]
    fn missing_floor_disables_lower_bound() {
        let policy = EnrollmentPolicy {
            min_credits: None,
            min_on_drop: true,
            ..EnrollmentPolicy::default()
        };
        assert!(policy.check_drop_load(Credits::ZERO).is_ok());
    }
}
