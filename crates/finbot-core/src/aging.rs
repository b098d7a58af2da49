//! Receivable and payable aging
//!
//! Buckets open invoices by how far past due they are on the report
//! date. Invoices not yet due fall into the current bucket.

use chrono::NaiveDate;
use finbot_store::models::EntryType;
use finbot_store::Database;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::CoreResult;

/// Which side of the books to age
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgingDirection {
    /// Open income invoices: money owed to the team
    Receivable,
    /// Open expense invoices: money the team owes
    Payable,
}

impl std::str::FromStr for AgingDirection {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "receivable" => Ok(AgingDirection::Receivable),
            "payable" => Ok(AgingDirection::Payable),
            _ => Err(format!("Invalid aging direction: {}", s)),
        }
    }
}

/// One counterparty's buckets
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgingRow {
    pub counterparty: String,
    pub current: Decimal,
    pub days_1_30: Decimal,
    pub days_31_60: Decimal,
    pub days_61_90: Decimal,
    pub days_over_90: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub direction: AgingDirection,
    pub as_of: NaiveDate,
    pub rows: Vec<AgingRow>,
    pub grand_total: Decimal,
}

const UNNAMED: &str = "(no counterparty)";

/// Build the aging report for one team as of a given date
pub fn aging_report(
    db: &Database,
    team_id: Uuid,
    direction: AgingDirection,
    as_of: NaiveDate,
) -> CoreResult<AgingReport> {
    let wanted = match direction {
        AgingDirection::Receivable => EntryType::Income,
        AgingDirection::Payable => EntryType::Expense,
    };

    let mut by_party: BTreeMap<String, AgingRow> = BTreeMap::new();
    for invoice in db.open_invoices(team_id)? {
        if invoice.entry_type != wanted {
            continue;
        }
        let Some(due) = invoice.due_date else {
            continue;
        };
        let party = invoice
            .counterparty
            .clone()
            .unwrap_or_else(|| UNNAMED.to_string());
        let row = by_party.entry(party.clone()).or_insert_with(|| AgingRow {
            counterparty: party,
            ..Default::default()
        });

        let overdue_days = (as_of - due).num_days();
        let bucket = if overdue_days <= 0 {
            &mut row.current
        } else if overdue_days <= 30 {
            &mut row.days_1_30
        } else if overdue_days <= 60 {
            &mut row.days_31_60
        } else if overdue_days <= 90 {
            &mut row.days_61_90
        } else {
            &mut row.days_over_90
        };
        *bucket += invoice.amount;
        row.total += invoice.amount;
    }

    let rows: Vec<AgingRow> = by_party.into_values().collect();
    let grand_total = rows.iter().map(|r| r.total).sum();
    Ok(AgingReport {
        direction,
        as_of,
        rows,
        grand_total,
    })
}

// ==================== Tests ====================
