use crate::error::{BillingError, Result};
use crate::interval::Interval;
use crate::utils::{month_span, validate_month};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodState {
    #[schemars(
        description = "Derived display state: no reservations exist for this month yet. Never persisted."
    )]
    NotStarted,

    #[schemars(description = "Open for recomputation and override edits.")]
    Draft,

    #[schemars(
        description = "Locked for editing by policy. The engine still recomputes on demand; the caller decides whether to forbid writes."
    )]
    Finalized,
}

/// One (year, month) billing unit with its finalize/reopen state machine:
/// `Draft -> Finalized` and `Finalized -> Draft` are the only transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InvoicePeriod {
    pub year: i32,
    pub month: u32,
    state: PeriodState,
}

impl InvoicePeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        Ok(Self {
            year,
            month,
            state: PeriodState::Draft,
        })
    }

    pub fn state(&self) -> PeriodState {
        self.state
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.transition(PeriodState::Finalized)
    }

    pub fn reopen(&mut self) -> Result<()> {
        self.transition(PeriodState::Draft)
    }

    fn transition(&mut self, to: PeriodState) -> Result<()> {
        let allowed = matches!(
            (self.state, to),
            (PeriodState::Draft, PeriodState::Finalized)
                | (PeriodState::Finalized, PeriodState::Draft)
        );
        if !allowed {
            return Err(BillingError::InvalidPeriodTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// The state shown to users. A draft period with no reservations at all
    /// reads as `NotStarted`; that value is derived here and never stored.
    pub fn display_state(&self, reservation_count: usize) -> PeriodState {
        if self.state == PeriodState::Draft && reservation_count == 0 {
            PeriodState::NotStarted
        } else {
            self.state
        }
    }

    /// Month boundaries as a half-open interval.
    pub fn span(&self) -> Result<Interval> {
        month_span(self.year, self.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_period_starts_draft() {
        let period = InvoicePeriod::new(2023, 2).unwrap();
        assert_eq!(period.state(), PeriodState::Draft);
    }

    #[test]
    fn test_invalid_month_rejected() {
        assert!(matches!(
            InvoicePeriod::new(2023, 13),
            Err(BillingError::InvalidMonth(13))
        ));
    }

    #[test]
    fn test_finalize_and_reopen_cycle() {
        let mut period = InvoicePeriod::new(2023, 2).unwrap();
        period.finalize().unwrap();
        assert_eq!(period.state(), PeriodState::Finalized);
        period.reopen().unwrap();
        assert_eq!(period.state(), PeriodState::Draft);
        period.finalize().unwrap();
        assert_eq!(period.state(), PeriodState::Finalized);
    }

    #[test]
    fn test_double_finalize_rejected() {
        let mut period = InvoicePeriod::new(2023, 2).unwrap();
        period.finalize().unwrap();
        assert!(matches!(
            period.finalize(),
            Err(BillingError::InvalidPeriodTransition { .. })
        ));
    }

    #[test]
    fn test_reopen_of_draft_rejected() {
        let mut period = InvoicePeriod::new(2023, 2).unwrap();
        assert!(period.reopen().is_err());
    }

    #[test]
    fn test_display_state_derives_not_started() {
        let mut period = InvoicePeriod::new(2023, 2).unwrap();
        assert_eq!(period.display_state(0), PeriodState::NotStarted);
        assert_eq!(period.display_state(3), PeriodState::Draft);

        // A finalized month stays finalized even if every reservation vanished.
        period.finalize().unwrap();
        assert_eq!(period.display_state(0), PeriodState::Finalized);
    }

    #[test]
    fn test_state_serializes_screaming_snake() {
        let json = serde_json::to_value(PeriodState::Finalized).unwrap();
        assert_eq!(json, "FINALIZED");
        assert_eq!(
            serde_json::to_value(PeriodState::NotStarted).unwrap(),
            "NOT_STARTED"
        );
    }
}
