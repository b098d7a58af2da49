//! Row models and shared enumerations for the finbot store

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==================== Users & Sessions ====================

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Salted password digest, never serialized in API responses
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub password_salt: String,
}

/// An opaque bearer session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ==================== Teams ====================

/// Membership role within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Whether this role may mutate team-level resources
    /// (cashbox operations, credits, member management)
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Admin => write!(f, "admin"),
            Role::Member => write!(f, "member"),
        }
    }
}

/// A tenant: every data row is scoped to one team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub default_currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// ==================== Accounts ====================

/// Account kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Bank,
    Cash,
    CreditCard,
    Investment,
}

impl Default for AccountKind {
    fn default() -> Self {
        AccountKind::Bank
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bank" => Ok(AccountKind::Bank),
            "cash" => Ok(AccountKind::Cash),
            "credit_card" => Ok(AccountKind::CreditCard),
            "investment" => Ok(AccountKind::Investment),
            _ => Err(format!("Invalid account kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKind::Bank => write!(f, "bank"),
            AccountKind::Cash => write!(f, "cash"),
            AccountKind::CreditCard => write!(f, "credit_card"),
            AccountKind::Investment => write!(f, "investment"),
        }
    }
}

/// A bookkeeping account (bank, cash drawer, card...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub opening_balance: Decimal,
    /// Soft delete flag
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(default)]
    pub kind: AccountKind,
    pub currency: Option<String>,
    pub opening_balance: Option<Decimal>,
}

// ==================== Transactions ====================

/// Direction of a bookkeeping entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl std::str::FromStr for EntryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(EntryType::Income),
            "expense" => Ok(EntryType::Expense),
            _ => Err(format!("Invalid entry type: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryType::Income => write!(f, "income"),
            EntryType::Expense => write!(f, "expense"),
        }
    }
}

/// A concrete bookkeeping transaction.
///
/// Rows with a `due_date` and no `settled_at` are open invoices:
/// income direction means a receivable, expense direction a payable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub team_id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub description: String,
    pub counterparty: Option<String>,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub settled_at: Option<DateTime<Utc>>,
    /// Template that spawned this row, if any
    pub recurring_id: Option<Uuid>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with its sign: income positive, expense negative
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Income => self.amount,
            EntryType::Expense => -self.amount,
        }
    }

    /// Whether this row is an unsettled invoice
    pub fn is_open_invoice(&self) -> bool {
        self.due_date.is_some() && self.settled_at.is_none() && !self.deleted
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub account_id: Uuid,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub counterparty: Option<String>,
    pub date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub recurring_id: Option<Uuid>,
}

/// Filters for transaction listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub unsettled_only: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ==================== Cashboxes ====================

/// Kind of cashbox ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashboxEntryType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl std::str::FromStr for CashboxEntryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(CashboxEntryType::Deposit),
            "withdrawal" => Ok(CashboxEntryType::Withdrawal),
            "transfer_in" => Ok(CashboxEntryType::TransferIn),
            "transfer_out" => Ok(CashboxEntryType::TransferOut),
            _ => Err(format!("Invalid cashbox entry type: {}", s)),
        }
    }
}

impl std::fmt::Display for CashboxEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashboxEntryType::Deposit => write!(f, "deposit"),
            CashboxEntryType::Withdrawal => write!(f, "withdrawal"),
            CashboxEntryType::TransferIn => write!(f, "transfer_in"),
            CashboxEntryType::TransferOut => write!(f, "transfer_out"),
        }
    }
}

/// A cash-balance ledger entity, distinct from bookkeeping accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cashbox {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One movement in a cashbox ledger, with the balance at commit time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashboxEntry {
    pub id: Uuid,
    pub cashbox_id: Uuid,
    pub entry_type: CashboxEntryType,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub note: Option<String>,
    /// The opposite leg of a transfer
    pub counterpart_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCashbox {
    pub name: String,
    pub currency: Option<String>,
    pub opening_balance: Option<Decimal>,
}

// ==================== Audit ====================

/// Immutable audit trail row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub team_id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub entity: String,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ==================== Recurring ====================

/// Schedule step unit for recurring templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl std::str::FromStr for IntervalUnit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(IntervalUnit::Daily),
            "weekly" => Ok(IntervalUnit::Weekly),
            "monthly" => Ok(IntervalUnit::Monthly),
            "quarterly" => Ok(IntervalUnit::Quarterly),
            "yearly" => Ok(IntervalUnit::Yearly),
            _ => Err(format!("Invalid interval unit: {}", s)),
        }
    }
}

impl std::fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalUnit::Daily => write!(f, "daily"),
            IntervalUnit::Weekly => write!(f, "weekly"),
            IntervalUnit::Monthly => write!(f, "monthly"),
            IntervalUnit::Quarterly => write!(f, "quarterly"),
            IntervalUnit::Yearly => write!(f, "yearly"),
        }
    }
}

/// A template that spawns concrete transactions on a schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: Uuid,
    pub team_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub category: String,
    pub interval_unit: IntervalUnit,
    pub interval_count: u32,
    pub next_due: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecurring {
    pub account_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub category: String,
    pub interval_unit: IntervalUnit,
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
    pub next_due: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

fn default_interval_count() -> u32 {
    1
}

// ==================== Credits ====================

/// An installment credit (loan) taken by the team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub principal: Decimal,
    pub balance: Decimal,
    /// Annual interest rate in basis points (1250 = 12.50%)
    pub annual_rate_bps: i64,
    pub installment: Decimal,
    pub start_date: NaiveDate,
    pub term_months: u32,
    pub next_payment_due: NaiveDate,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPayment {
    pub id: Uuid,
    pub credit_id: Uuid,
    pub amount: Decimal,
    pub principal_part: Decimal,
    pub interest_part: Decimal,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCredit {
    pub name: String,
    pub principal: Decimal,
    pub annual_rate_bps: i64,
    pub installment: Decimal,
    pub start_date: NaiveDate,
    pub term_months: u32,
}

// ==================== Investments ====================

/// A held investment position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub kind: String,
    pub units: Decimal,
    pub unit_cost: Decimal,
    pub current_price: Decimal,
    pub currency: String,
    pub purchased_at: NaiveDate,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl Investment {
    pub fn cost_basis(&self) -> Decimal {
        self.units * self.unit_cost
    }

    pub fn market_value(&self) -> Decimal {
        self.units * self.current_price
    }

    pub fn gain(&self) -> Decimal {
        self.market_value() - self.cost_basis()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvestment {
    pub name: String,
    pub kind: String,
    pub units: Decimal,
    pub unit_cost: Decimal,
    pub current_price: Option<Decimal>,
    pub currency: Option<String>,
    pub purchased_at: NaiveDate,
}

// ==================== Forecasts ====================

/// A persisted forecast run: scenario input and percentile output as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub horizon_months: u32,
    pub iterations: u32,
    pub params: serde_json::Value,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A month's aggregated flows, used by reports and the forecast engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyFlow {
    /// Month key in `YYYY-MM` form
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
}

impl MonthlyFlow {
    pub fn net(&self) -> Decimal {
        self.income - self.expense
    }
}
