use crate::error::ApiError;
use crate::responses::{ChartEnvelope, ChartResult, QuoteEnvelope};
use crate::{HistorySource, QuoteSource};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use configuration::ApiConfig;
use core_types::{PriceBar, Quote};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

// Yahoo refuses requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Quotes and daily bars from Yahoo Finance.
///
/// The quote endpoint needs a session crumb. It is fetched lazily on first use,
/// cached for the lifetime of the client, and dropped again if Yahoo rejects it.
pub struct YahooFinanceClient {
    client: reqwest::Client,
    base_url: String,
    cookie_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceClient {
    pub fn new(api_config: &ApiConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(api_config.request_timeout())
                .user_agent(USER_AGENT)
                .cookie_store(true)
                .build()?,
            base_url: api_config.yahoo_base_url.trim_end_matches('/').to_string(),
            cookie_url: api_config.yahoo_cookie_url.clone(),
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String, ApiError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // Only the cookies matter here; this page answers 404 on success.
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            tracing::debug!(error = %e, "Cookie priming request failed.");
        }

        let crumb = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let crumb = crumb.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') || crumb.contains(' ') {
            return Err(ApiError::InvalidData(format!("unusable crumb '{}'", crumb)));
        }

        *cached = Some(crumb.clone());
        Ok(crumb)
    }
}

fn to_decimal(value: f64, field: &str, symbol: &str) -> Result<Decimal, ApiError> {
    Decimal::from_f64(value)
        .ok_or_else(|| ApiError::InvalidData(format!("{symbol}: {field} {value} is not a finite number")))
}

/// Extracts the quote for `symbol` from a `/v7/finance/quote` payload.
pub fn parse_quote(symbol: &str, envelope: QuoteEnvelope) -> Result<Option<Quote>, ApiError> {
    if let Some(error) = envelope.quote_response.error.filter(|e| !e.is_null()) {
        return Err(ApiError::ApiError(error.to_string()));
    }

    let Some(result) = envelope
        .quote_response
        .result
        .into_iter()
        .find(|r| r.symbol.eq_ignore_ascii_case(symbol))
    else {
        return Ok(None);
    };

    match (result.market_cap, result.regular_market_price) {
        (Some(market_cap), Some(price)) => Ok(Some(Quote {
            symbol: symbol.to_string(),
            market_cap: to_decimal(market_cap, "market cap", symbol)?,
            price: to_decimal(price, "price", symbol)?,
        })),
        _ => Ok(None),
    }
}

/// Converts a `/v8/finance/chart` payload into daily bars.
///
/// Bars with a missing close are skipped; missing open/high/low fall back to the
/// close and a missing volume to zero.
pub fn parse_chart(symbol: &str, envelope: ChartEnvelope) -> Result<Vec<PriceBar>, ApiError> {
    if let Some(error) = envelope.chart.error {
        return Err(ApiError::ApiError(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    bars_from_result(symbol, result)
}

fn bars_from_result(symbol: &str, result: ChartResult) -> Result<Vec<PriceBar>, ApiError> {
    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.into_iter().enumerate() {
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        let field = |series: &Vec<Option<f64>>| series.get(i).copied().flatten().unwrap_or(close);

        let date = DateTime::from_timestamp(ts + offset, 0)
            .ok_or_else(|| ApiError::InvalidData(format!("{symbol}: bad timestamp {ts}")))?
            .date_naive();
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);

        bars.push(PriceBar {
            date,
            ticker: symbol.to_string(),
            open: to_decimal(field(&quote.open), "open", symbol)?,
            high: to_decimal(field(&quote.high), "high", symbol)?,
            low: to_decimal(field(&quote.low), "low", symbol)?,
            close: to_decimal(close, "close", symbol)?,
            volume: volume.max(0.0).round() as i64,
        });
    }

    Ok(bars)
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl QuoteSource for YahooFinanceClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>, ApiError> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v7/finance/quote", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbols", symbol), ("crumb", crumb.as_str())])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            // Stale crumb; the next call negotiates a fresh one.
            self.crumb.lock().await.take();
        }
        if !status.is_success() {
            return Err(ApiError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        parse_quote(symbol, serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl HistorySource for YahooFinanceClient {
    async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, ApiError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", unix_midnight(start).to_string()),
                ("period2", unix_midnight(end).to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        // Unknown symbols come back as 404 with a chart.error body, which
        // `parse_chart` turns into a readable message.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let bars = parse_chart(symbol, serde_json::from_str(&text)?)?;
        Ok(bars.into_iter().filter(|b| b.date >= start && b.date < end).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_with_market_cap_and_price() {
        let envelope: QuoteEnvelope = serde_json::from_str(
            r#"{"quoteResponse":{"result":[
                {"symbol":"AAPL","marketCap":2950000000000,"regularMarketPrice":190.25}
            ],"error":null}}"#,
        )
        .unwrap();

        let quote = parse_quote("AAPL", envelope).unwrap().unwrap();
        assert_eq!(quote.market_cap, dec!(2950000000000));
        assert_eq!(quote.price, dec!(190.25));
    }

    #[test]
    fn quote_without_market_cap_is_absent() {
        let envelope: QuoteEnvelope = serde_json::from_str(
            r#"{"quoteResponse":{"result":[{"symbol":"QQQ","regularMarketPrice":480.1}],"error":null}}"#,
        )
        .unwrap();
        assert_eq!(parse_quote("QQQ", envelope).unwrap(), None);

        let empty: QuoteEnvelope =
            serde_json::from_str(r#"{"quoteResponse":{"result":[],"error":null}}"#).unwrap();
        assert_eq!(parse_quote("ZZZZ", empty).unwrap(), None);
    }

    #[test]
    fn chart_bars_use_exchange_local_dates_and_skip_null_closes() {
        // 2025-03-13 and 2025-03-14, 13:30 UTC (09:30 New York, offset -4h).
        let envelope: ChartEnvelope = serde_json::from_str(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":-14400},
                "timestamp":[1741872600,1741959000,1742045400],
                "indicators":{"quote":[{
                    "open":[100.0,101.0,null],
                    "high":[102.0,null,null],
                    "low":[99.5,100.5,null],
                    "close":[101.5,100.75,null],
                    "volume":[1200,null,null]
                }]}
            }],"error":null}}"#,
        )
        .unwrap();

        let bars = parse_chart("MSFT", envelope).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2025, 3, 13).unwrap());
        assert_eq!(bars[0].volume, 1200);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(bars[1].high, dec!(100.75));
        assert_eq!(bars[1].volume, 0);
        assert!(bars.iter().all(|b| b.ticker == "MSFT"));
    }

    #[test]
    fn chart_error_is_reported() {
        let envelope: ChartEnvelope = serde_json::from_str(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        )
        .unwrap();

        let err = parse_chart("GONE", envelope).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }
}
