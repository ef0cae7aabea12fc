use std::sync::LazyLock;

use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{IngestError, Result};

pub const TRADES_BASE_URL: &str = "https://www.capitoltrades.com/trades";

static OG_DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());

/// Anything that can produce the preview description for a trade id.
pub trait TradeSource {
    async fn fetch_description(&self, trade_id: i64) -> Result<String>;
}

/// Trade detail pages on the public site.
pub struct TradePages {
    client: reqwest::Client,
    base_url: String,
}

impl TradePages {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn trade_url(&self, trade_id: i64) -> String {
        format!("{}/{}", self.base_url, trade_id)
    }
}

impl TradeSource for TradePages {
    /// Single GET, no retry.
    async fn fetch_description(&self, trade_id: i64) -> Result<String> {
        let url = self.trade_url(trade_id);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        ensure_success(trade_id, response.status())?;
        let html = response.text().await?;
        extract_description(trade_id, &html)
    }
}

fn ensure_success(trade_id: i64, status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(IngestError::Fetch { trade_id, status })
    }
}

/// Pull the `og:description` content out of a trade page.
pub fn extract_description(trade_id: i64, html: &str) -> Result<String> {
    let doc = Html::parse_document(html);
    doc.select(&OG_DESCRIPTION)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| IngestError::Parse {
            trade_id,
            reason: "description meta tag not found".into(),
        })
}
