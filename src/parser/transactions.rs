use scraper::{ElementRef, Html};

use super::{cell_texts, element_text, TH, TR};
use crate::error::{Result, ScrapeError};
use crate::models::{Property, Transaction};
use crate::money::{parse_amount, parse_due_date};

const HEADER_MARKER: &str = "Year";
const CELLS: usize = 10;

/// Parse a payment history page into transactions owned by `property`.
///
/// Some history pages open with an unrelated summary table, so every row up to
/// and including the `Year` header row is dropped. A page without that header
/// is rejected rather than parsed.
pub fn parse(property: &Property, html: &str) -> Result<Vec<Transaction>> {
    let property_id = property.id.ok_or(ScrapeError::Unpersisted {
        account_number: property.account_number,
    })?;

    let document = Html::parse_document(html);
    let rows: Vec<ElementRef<'_>> = document.select(&TR).collect();
    let header = rows.iter().position(|row| is_header_row(*row)).ok_or_else(|| {
        ScrapeError::Parse(format!(
            "no {:?} header on history page for account {}",
            HEADER_MARKER, property.account_number
        ))
    })?;

    rows[header + 1..]
        .iter()
        .map(|row| parse_row(property_id, *row))
        .collect()
}

fn is_header_row(row: ElementRef<'_>) -> bool {
    row.select(&TH)
        .next()
        .is_some_and(|th| element_text(th) == HEADER_MARKER)
}

fn parse_row(property_id: i64, row: ElementRef<'_>) -> Result<Transaction> {
    let cells = cell_texts(row);
    if cells.len() < CELLS {
        return Err(ScrapeError::Parse(format!(
            "history row has {} cells, expected {}: {:?}",
            cells.len(),
            CELLS,
            cells
        )));
    }

    Ok(Transaction {
        id: None,
        property_id,
        year: parse_int("Year", &cells[0])?,
        qtr: parse_int("Qtr", &cells[1])?,
        due_date: parse_due_date(&cells[2])?,
        description: cells[3].clone(),
        billed: parse_amount(&cells[4])?,
        paid: parse_amount(&cells[5])?,
        open_balance: parse_amount(&cells[6])?,
        days: if cells[7].is_empty() {
            None
        } else {
            Some(parse_int("Days", &cells[7])?)
        },
        interest_due: parse_amount(&cells[8])?,
        paid_by: cells[9].clone(),
    })
}

fn parse_int(column: &str, text: &str) -> Result<i32> {
    text.parse()
        .map_err(|e| ScrapeError::Parse(format!("bad {} {:?}: {}", column, text, e)))
}
