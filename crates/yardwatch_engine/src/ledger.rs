//! The yard ledger: sole owner of yard progress.

use crate::book::{CreditSink, YardCredit};
use crate::result::YardSnapshot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};
use yardwatch_model::{CleaningStatus, MachineId, Yard, YardDirectory, YardId};

/// A yard's status moved up the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YardTransition {
    /// Yard that changed.
    pub yard_id: YardId,
    /// Status before the credit.
    pub from: CleaningStatus,
    /// Status after the credit.
    pub to: CleaningStatus,
    /// Timestamp of the message whose credit caused the change.
    pub at: NaiveDateTime,
    /// Machine whose credit caused the change.
    pub machine_id: MachineId,
}

/// Progress of every yard in the directory plus the ordered transition log.
#[derive(Debug, Clone)]
pub struct YardLedger {
    yards: Vec<Yard>,
    index: HashMap<YardId, usize>,
    transitions: Vec<YardTransition>,
    credits_applied: u64,
}

impl YardLedger {
    /// Creates a ledger with every yard at 0%.
    pub fn new(directory: &YardDirectory) -> Self {
        let yards = directory.fresh_yards();
        let index = yards
            .iter()
            .enumerate()
            .map(|(position, yard)| (yard.id(), position))
            .collect();
        Self {
            yards,
            index,
            transitions: Vec::new(),
            credits_applied: 0,
        }
    }

    /// Applies one credit; returns the transition it caused, if any.
    pub fn apply(&mut self, credit: YardCredit) -> Option<YardTransition> {
        let Some(&position) = self.index.get(&credit.yard_id) else {
            warn!(yard_id = credit.yard_id, "credit for unknown yard ignored");
            return None;
        };
        self.credits_applied += 1;

        let yard = &mut self.yards[position];
        let (from, to) = yard.credit(credit.seconds)?;
        let transition = YardTransition {
            yard_id: credit.yard_id,
            from,
            to,
            at: credit.at,
            machine_id: credit.machine_id,
        };
        info!(
            yard_id = transition.yard_id,
            from = %from,
            to = %to,
            at = %transition.at,
            machine_id = transition.machine_id,
            percentage = yard.percentage(),
            "yard status changed"
        );
        self.transitions.push(transition);
        Some(transition)
    }

    /// Looks up a yard.
    pub fn get(&self, id: YardId) -> Option<&Yard> {
        self.index.get(&id).map(|&i| &self.yards[i])
    }

    /// Yards in directory order.
    pub fn yards(&self) -> &[Yard] {
        &self.yards
    }

    /// Transitions in the order they happened.
    pub fn transitions(&self) -> &[YardTransition] {
        &self.transitions
    }

    /// Number of credits applied to known yards.
    pub const fn credits_applied(&self) -> u64 {
        self.credits_applied
    }

    /// Number of yards at 100%.
    pub fn completed(&self) -> usize {
        self.yards
            .iter()
            .filter(|y| y.status().is_complete())
            .count()
    }

    /// Snapshots every yard in directory order.
    pub fn snapshots(&self) -> Vec<YardSnapshot> {
        self.yards.iter().map(YardSnapshot::from).collect()
    }

    /// Consumes the ledger, returning yard snapshots and transitions.
    pub fn into_parts(self) -> (Vec<YardSnapshot>, Vec<YardTransition>) {
        (self.snapshots(), self.transitions)
    }
}

impl CreditSink for YardLedger {
    fn credit(&mut self, credit: YardCredit) {
        self.apply(credit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use yardwatch_model::YardSpec;

    fn ledger() -> YardLedger {
        YardLedger::new(
            &YardDirectory::new(vec![
                YardSpec::new(1, 100.0, 1.0).unwrap(),
                YardSpec::new(2, 50.0, 0.5).unwrap(),
            ])
            .unwrap(),
        )
    }

    fn credit(yard_id: YardId, seconds: f64) -> YardCredit {
        YardCredit {
            yard_id,
            machine_id: 4,
            seconds,
            at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn records_each_status_change_once() {
        let mut ledger = ledger();
        assert!(ledger.apply(credit(1, 10.0)).is_none());
        let first = ledger.apply(credit(1, 10.0)).unwrap();
        assert_eq!((first.from, first.to), (CleaningStatus::Zero, CleaningStatus::Twenty));
        assert!(ledger.apply(credit(1, 5.0)).is_none());

        let jump = ledger.apply(credit(1, 60.0)).unwrap();
        assert_eq!((jump.from, jump.to), (CleaningStatus::Twenty, CleaningStatus::Eighty));
        assert_eq!(jump.machine_id, 4);

        assert_eq!(ledger.transitions().len(), 2);
        assert_eq!(ledger.get(1).unwrap().status(), CleaningStatus::Eighty);
        assert_eq!(ledger.get(2).unwrap().status(), CleaningStatus::Zero);
    }

    #[test]
    fn unknown_yard_is_ignored() {
        let mut ledger = ledger();
        assert!(ledger.apply(credit(42, 1000.0)).is_none());
        assert_eq!(ledger.credits_applied(), 0);
        assert!(ledger.yards().iter().all(|y| y.cleaned_seconds().abs() < f64::EPSILON));
    }

    #[test]
    fn completion_is_terminal() {
        let mut ledger = ledger();
        let done = ledger.apply(credit(2, 100.0)).unwrap();
        assert_eq!(done.to, CleaningStatus::Complete);
        assert!(ledger.apply(credit(2, 100.0)).is_none());
        assert_eq!(ledger.completed(), 1);

        let (yards, transitions) = ledger.into_parts();
        assert_eq!(yards.len(), 2);
        assert_eq!(transitions.len(), 1);
        assert!((yards[1].percentage - 100.0).abs() < f64::EPSILON);
    }
}
