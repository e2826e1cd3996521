use tracing::{info, warn};

use crate::db::RecordSink;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::parser::{pages, properties, transactions};
use crate::settings::Settings;

/// Counts returned after a completed run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub pages: usize,
    pub properties: usize,
    pub transactions: usize,
}

/// Pages to visit, plus the page 1 body fetched to count them.
pub struct PageRange {
    pub pages: Vec<u32>,
    first_page: String,
}

/// Sequential fetch → parse → persist over the whole portal.
pub struct Pipeline<F, S> {
    base_url: String,
    include_last_page: bool,
    fetcher: F,
    sink: S,
}

impl<F: Fetch, S: RecordSink> Pipeline<F, S> {
    pub fn new(settings: &Settings, fetcher: F, sink: S) -> Self {
        Self {
            base_url: settings.base().to_string(),
            include_last_page: settings.include_last_page,
            fetcher,
            sink,
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn index_url(&self, page: u32) -> String {
        format!("{}/?page={}", self.base_url, page)
    }

    pub fn history_url(&self, view_pay_link: &str) -> String {
        if view_pay_link.starts_with("http://") || view_pay_link.starts_with("https://") {
            view_pay_link.to_string()
        } else if view_pay_link.starts_with('/') {
            format!("{}{}", self.base_url, view_pay_link)
        } else {
            format!("{}/{}", self.base_url, view_pay_link)
        }
    }

    pub fn resolve_page_range(&self) -> Result<PageRange> {
        let url = self.index_url(1);
        info!("Fetching page range from {}", url);
        let first_page = self.fetcher.get(&url)?;
        let last = pages::last_page_number(&first_page)?;
        let pages = pages::page_sequence(last, self.include_last_page);
        info!(
            "Last page link points at {}; visiting {} pages",
            last,
            pages.len()
        );
        Ok(PageRange { pages, first_page })
    }

    /// Run the whole scrape. The first fetch, parse or database error aborts it.
    pub fn run(&mut self) -> Result<RunStats> {
        let range = self.resolve_page_range()?;
        if range.pages.is_empty() {
            warn!("Page range is empty, nothing to fetch");
        }

        let mut stats = RunStats::default();
        let mut first_page = Some(range.first_page);

        for page in range.pages {
            let cached = if page == 1 { first_page.take() } else { None };
            let html = match cached {
                Some(body) => body,
                None => {
                    let url = self.index_url(page);
                    info!("Fetching properties for page {}: {}", page, url);
                    self.fetcher.get(&url)?
                }
            };

            let mut props = properties::parse(&html)?;
            if props.is_empty() {
                warn!("Page {} listed no properties", page);
            }
            self.sink.save_properties(&mut props)?;
            stats.pages += 1;
            stats.properties += props.len();

            for property in &props {
                let url = self.history_url(&property.view_pay_link);
                info!(
                    "Fetching transactions for property {} (account {}): {}",
                    property.id.unwrap_or_default(),
                    property.account_number,
                    url
                );
                let body = self.fetcher.get(&url)?;
                let mut txs = transactions::parse(property, &body)?;
                self.sink.save_transactions(&mut txs)?;
                stats.transactions += txs.len();
            }
        }

        info!(
            "Run complete: {} pages, {} properties, {} transactions",
            stats.pages, stats.properties, stats.transactions
        );
        Ok(stats)
    }
}
