use scraper::Html;
use tracing::debug;

use super::{cell_texts, ANCHOR, TR};
use crate::error::{Result, ScrapeError};
use crate::models::Property;

const MIN_CELLS: usize = 6;

/// Parse every data row of a property index page, skipping the header row.
pub fn parse(html: &str) -> Result<Vec<Property>> {
    let document = Html::parse_document(html);
    let mut properties = Vec::new();

    for (i, row) in document.select(&TR).enumerate().skip(1) {
        let cells = cell_texts(row);
        if cells.len() < MIN_CELLS {
            return Err(ScrapeError::Parse(format!(
                "index row {} has {} cells, expected {}",
                i,
                cells.len(),
                MIN_CELLS
            )));
        }

        // The link comes from the first anchor anywhere in the row, not from a cell's text.
        let view_pay_link = row
            .select(&ANCHOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| ScrapeError::Parse(format!("index row {} has no payment link", i)))?
            .trim()
            .to_string();

        let account_number = cells[0].parse::<i64>().map_err(|e| {
            ScrapeError::Parse(format!("bad account number {:?} in row {}: {}", cells[0], i, e))
        })?;

        let property = Property {
            id: None,
            account_number,
            block: cells[1].clone(),
            lot: cells[2].clone(),
            qualifier: cells[3].clone(),
            owners_name: cells[4].clone(),
            property_location: cells[5].clone(),
            view_pay_link,
        };
        debug!("{}", property);
        properties.push(property);
    }

    Ok(properties)
}
