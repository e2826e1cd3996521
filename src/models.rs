use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One row of the portal's property index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Assigned by the sink on commit.
    pub id: Option<i64>,
    pub account_number: i64,
    pub block: String,
    pub lot: String,
    pub qualifier: String,
    pub owners_name: String,
    pub property_location: String,
    /// Relative URL of the payment history page.
    pub view_pay_link: String,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{} {} {}\t{}\t{}\t{}",
            self.account_number,
            self.block,
            self.lot,
            self.qualifier,
            self.property_location,
            self.owners_name,
            self.view_pay_link
        )
    }
}

/// One billing or payment line from a property's history page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub property_id: i64,
    pub year: i32,
    pub qtr: i32,
    pub due_date: NaiveDate,
    pub description: String,
    pub billed: Option<Decimal>,
    pub paid: Option<Decimal>,
    pub open_balance: Option<Decimal>,
    pub days: Option<i32>,
    pub interest_due: Option<Decimal>,
    pub paid_by: String,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let money = |d: &Option<Decimal>| d.map(|v| v.to_string()).unwrap_or_default();
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.property_id,
            self.due_date,
            self.description,
            money(&self.billed),
            money(&self.paid),
            money(&self.open_balance),
            self.days.map(|d| d.to_string()).unwrap_or_default(),
            money(&self.interest_due),
            self.paid_by
        )
    }
}
