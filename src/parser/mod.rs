pub mod pages;
pub mod properties;
pub mod transactions;

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Trimmed text of every `td` under `row`, in document order.
fn cell_texts(row: ElementRef<'_>) -> Vec<String> {
    row.select(&TD).map(element_text).collect()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
