//! Overdue sweep
//!
//! Runs once a day (cron binary or the in-process job) and flags every
//! pending boleto and receivable whose due date has passed. Running it again
//! on the same day changes nothing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{BoletoId, ReceivableId};
use crate::boleto::Boleto;
use crate::receivable::Receivable;

/// Sweep settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OverdueSweep {
    /// Days after the due date before a receivable counts as overdue
    pub grace_days: u32,
}

/// What a sweep changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub boletos_marked: Vec<BoletoId>,
    pub receivables_marked: Vec<ReceivableId>,
    /// Candidates that could not transition
    pub skipped: usize,
}

impl SweepReport {
    pub fn total_marked(&self) -> usize {
        self.boletos_marked.len() + self.receivables_marked.len()
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.boletos_marked.extend(other.boletos_marked);
        self.receivables_marked.extend(other.receivables_marked);
        self.skipped += other.skipped;
    }
}

impl OverdueSweep {
    pub fn new(grace_days: u32) -> Self {
        Self { grace_days }
    }

    /// Whether a boleto due on `due_date` is late on `today`
    pub fn is_late(&self, due_date: NaiveDate, today: NaiveDate) -> bool {
        (today - due_date).num_days() > i64::from(self.grace_days)
    }

    pub fn run(&self, today: NaiveDate, boletos: &mut [Boleto], receivables: &mut [Receivable]) -> SweepReport {
        let mut report = SweepReport::default();

        for boleto in boletos.iter_mut() {
            if !boleto.is_overdue_on(today) || !self.is_late(boleto.due_date, today) {
                continue;
            }
            match boleto.mark_overdue(today) {
                Ok(()) => report.boletos_marked.push(boleto.id),
                Err(e) => {
                    warn!(boleto = %boleto.id, error = %e, "boleto skipped by overdue sweep");
                    report.skipped += 1;
                }
            }
        }

        for receivable in receivables.iter_mut() {
            if receivable.mark_overdue(today, self.grace_days) {
                report.receivables_marked.push(receivable.id);
            }
        }

        if report.total_marked() > 0 {
            info!(
                %today,
                boletos = report.boletos_marked.len(),
                receivables = report.receivables_marked.len(),
                "overdue sweep marked items"
            );
        }
        report
    }
}
