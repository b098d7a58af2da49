//! Cashbox ledger service
//!
//! Validates ledger operations before handing the mutation to the
//! store, which applies it atomically. The store enforces the
//! non-negative balance invariant; this layer rejects requests that
//! are malformed regardless of balance.

use finbot_store::models::{Cashbox, CashboxEntry, NewCashbox};
use finbot_store::Database;
use log::info;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Clone)]
pub struct CashboxLedger {
    db: Database,
}

impl CashboxLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn check_amount(amount: Decimal) -> CoreResult<()> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation(
                "Amount must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn create(
        &self,
        team_id: Uuid,
        new: NewCashbox,
        default_currency: &str,
    ) -> CoreResult<Cashbox> {
        if new.name.trim().is_empty() {
            return Err(CoreError::Validation("Name cannot be empty".to_string()));
        }
        Ok(self.db.create_cashbox(team_id, new, default_currency)?)
    }

    pub fn get(&self, team_id: Uuid, id: Uuid) -> CoreResult<Cashbox> {
        Ok(self.db.cashbox_by_id(team_id, id)?)
    }

    pub fn list(&self, team_id: Uuid, include_archived: bool) -> CoreResult<Vec<Cashbox>> {
        Ok(self.db.list_cashboxes(team_id, include_archived)?)
    }

    pub fn archive(&self, team_id: Uuid, id: Uuid) -> CoreResult<()> {
        Ok(self.db.archive_cashbox(team_id, id)?)
    }

    pub fn deposit(
        &self,
        team_id: Uuid,
        id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> CoreResult<CashboxEntry> {
        Self::check_amount(amount)?;
        let entry = self.db.cashbox_deposit(team_id, id, amount, note, actor_id)?;
        info!("Deposit of {} into cashbox {}", amount, id);
        Ok(entry)
    }

    pub fn withdraw(
        &self,
        team_id: Uuid,
        id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> CoreResult<CashboxEntry> {
        Self::check_amount(amount)?;
        let entry = self
            .db
            .cashbox_withdraw(team_id, id, amount, note, actor_id)?;
        info!("Withdrawal of {} from cashbox {}", amount, id);
        Ok(entry)
    }

    /// Transfer between two distinct boxes of the same team and
    /// currency. Currency is checked here for a typed error; the store
    /// re-checks inside the transaction.
    pub fn transfer(
        &self,
        team_id: Uuid,
        from_id: Uuid,
        to_id: Uuid,
        amount: Decimal,
        note: Option<&str>,
        actor_id: Uuid,
    ) -> CoreResult<(CashboxEntry, CashboxEntry)> {
        Self::check_amount(amount)?;
        if from_id == to_id {
            return Err(CoreError::Validation(
                "Cannot transfer a cashbox into itself".to_string(),
            ));
        }

        let from = self.db.cashbox_by_id(team_id, from_id)?;
        let to = self.db.cashbox_by_id(team_id, to_id)?;
        if from.currency != to.currency {
            return Err(CoreError::CurrencyMismatch {
                left: from.currency,
                right: to.currency,
            });
        }

        let legs = self
            .db
            .cashbox_transfer(team_id, from_id, to_id, amount, note, actor_id)?;
        info!("Transfer of {} from cashbox {} to {}", amount, from_id, to_id);
        Ok(legs)
    }

    pub fn history(&self, team_id: Uuid, id: Uuid, limit: usize) -> CoreResult<Vec<CashboxEntry>> {
        Ok(self.db.cashbox_history(team_id, id, limit)?)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use finbot_store::models::NewUser;

    fn setup() -> (CashboxLedger, Uuid, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(NewUser {
                email: "l@example.com".to_string(),
                display_name: "L".to_string(),
                password_hash: "h".to_string(),
                password_salt: "s".to_string(),
            })
            .unwrap();
        let team = db.create_team("T", user.id, "TRY").unwrap();
        (CashboxLedger::new(db), team.id, user.id)
    }

    fn make_box(ledger: &CashboxLedger, team: Uuid, name: &str, opening: i64) -> Cashbox {
        ledger
            .create(
                team,
                NewCashbox {
                    name: name.to_string(),
                    currency: None,
                    opening_balance: Some(Decimal::new(opening, 2)),
                },
                "TRY",
            )
            .unwrap()
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let (ledger, team, user) = setup();
        let cashbox = make_box(&ledger, team, "Till", 10000);

        for amount in [Decimal::ZERO, Decimal::new(-100, 2)] {
            let err = ledger.deposit(team, cashbox.id, amount, None, user).unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
    }

    #[test]
    fn test_self_transfer_rejected() {
        let (ledger, team, user) = setup();
        let cashbox = make_box(&ledger, team, "Till", 10000);
        let err = ledger
            .transfer(team, cashbox.id, cashbox.id, Decimal::new(100, 2), None, user)
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_currency_mismatch_is_typed() {
        let (ledger, team, user) = setup();
        let a = make_box(&ledger, team, "A", 10000);
        let b = ledger
            .create(
                team,
                NewCashbox {
                    name: "B".to_string(),
                    currency: Some("USD".to_string()),
                    opening_balance: None,
                },
                "TRY",
            )
            .unwrap();

        let err = ledger
            .transfer(team, a.id, b.id, Decimal::new(100, 2), None, user)
            .unwrap_err();
        assert!(matches!(err, CoreError::CurrencyMismatch { .. }));
    }

    #[test]
    fn test_overdraw_surfaces_insufficient_funds() {
        let (ledger, team, user) = setup();
        let cashbox = make_box(&ledger, team, "Till", 5000);
        let err = ledger
            .withdraw(team, cashbox.id, Decimal::new(10000, 2), None, user)
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_round_trip_history() {
        let (ledger, team, user) = setup();
        let a = make_box(&ledger, team, "A", 0);
        let b = make_box(&ledger, team, "B", 0);

        ledger.deposit(team, a.id, Decimal::new(10000, 2), None, user).unwrap();
        ledger
            .transfer(team, a.id, b.id, Decimal::new(4000, 2), None, user)
            .unwrap();
        ledger.withdraw(team, b.id, Decimal::new(1000, 2), None, user).unwrap();

        assert_eq!(ledger.history(team, a.id, 50).unwrap().len(), 2);
        assert_eq!(ledger.history(team, b.id, 50).unwrap().len(), 2);
        assert_eq!(ledger.get(team, a.id).unwrap().balance, Decimal::new(6000, 2));
        assert_eq!(ledger.get(team, b.id).unwrap().balance, Decimal::new(3000, 2));
    }
}
