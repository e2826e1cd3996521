use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{Result, ScrapeError};

static PAGER_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.btn-primary").unwrap());
static PAGE_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"page=(\d+)").unwrap());

/// Page number targeted by the last pager button on an index page.
pub fn last_page_number(html: &str) -> Result<u32> {
    let document = Html::parse_document(html);
    let link = document
        .select(&PAGER_LINK)
        .last()
        .ok_or_else(|| ScrapeError::Parse("no pager link on index page".into()))?;
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| ScrapeError::Parse("pager link has no href".into()))?;
    let digits = PAGE_PARAM_RE
        .captures(href)
        .and_then(|c| c.get(1))
        .ok_or_else(|| ScrapeError::Parse(format!("no page number in pager link {:?}", href)))?;
    digits
        .as_str()
        .parse()
        .map_err(|e| ScrapeError::Parse(format!("bad page number in {:?}: {}", href, e)))
}

/// Pages to visit. The portal's last page is skipped unless `include_last`.
pub fn page_sequence(last: u32, include_last: bool) -> Vec<u32> {
    if include_last {
        (1..=last).collect()
    } else {
        (1..last).collect()
    }
}
