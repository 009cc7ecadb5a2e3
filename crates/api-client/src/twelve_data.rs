use crate::error::ApiError;
use crate::responses::StocksResponse;
use crate::UniverseSource;
use async_trait::async_trait;
use configuration::ApiConfig;

/// Lists the symbols traded on one exchange via Twelve Data's reference endpoint.
#[derive(Clone)]
pub struct TwelveDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    exchange: String,
}

impl TwelveDataClient {
    pub fn new(api_config: &ApiConfig) -> Result<Self, ApiError> {
        let api_key = api_config
            .require_twelve_data_key()
            .map_err(|e| ApiError::MissingCredentials(e.to_string()))?
            .to_string();

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(api_config.request_timeout())
                .build()?,
            base_url: api_config.twelve_data_base_url.trim_end_matches('/').to_string(),
            api_key,
            exchange: api_config.exchange.clone(),
        })
    }
}

/// Turns a `/stocks` payload into the ordered symbol list, keeping the first
/// occurrence of symbols listed more than once.
pub fn parse_universe(response: StocksResponse) -> Result<Vec<String>, ApiError> {
    if response.status.as_deref() == Some("error") {
        return Err(ApiError::ApiError(format!(
            "code {}: {}",
            response.code.unwrap_or_default(),
            response.message.unwrap_or_else(|| "unknown error".to_string())
        )));
    }

    let listings = response.data.ok_or_else(|| {
        ApiError::InvalidData("stocks response has no 'data' array".to_string())
    })?;

    let mut seen = std::collections::HashSet::new();
    Ok(listings
        .into_iter()
        .map(|listing| listing.symbol.trim().to_string())
        .filter(|symbol| !symbol.is_empty() && seen.insert(symbol.clone()))
        .collect())
}

#[async_trait]
impl UniverseSource for TwelveDataClient {
    async fn fetch_universe(&self) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/stocks", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("exchange", self.exchange.as_str()), ("apikey", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::ApiError(format!("HTTP {}: {}", status, text)));
        }

        let payload: StocksResponse = serde_json::from_str(&text)?;
        let symbols = parse_universe(payload)?;
        tracing::info!(exchange = %self.exchange, count = symbols.len(), "Fetched ticker universe.");
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_source_order_and_drops_repeats() {
        let payload: StocksResponse = serde_json::from_str(
            r#"{"data":[
                {"symbol":"AAPL","name":"Apple Inc","exchange":"NASDAQ"},
                {"symbol":"MSFT","name":"Microsoft Corp","exchange":"NASDAQ"},
                {"symbol":"AAPL","name":"Apple Inc","exchange":"NASDAQ"},
                {"symbol":" ","name":"blank"},
                {"symbol":"NVDA"}
            ],"status":"ok"}"#,
        )
        .unwrap();

        assert_eq!(parse_universe(payload).unwrap(), vec!["AAPL", "MSFT", "NVDA"]);
    }

    #[test]
    fn error_status_is_reported() {
        let payload: StocksResponse = serde_json::from_str(
            r#"{"code":401,"message":"**apikey** parameter is incorrect","status":"error"}"#,
        )
        .unwrap();

        let err = parse_universe(payload).unwrap_err();
        assert!(matches!(err, ApiError::ApiError(msg) if msg.contains("401")));
    }

    #[test]
    fn missing_data_is_invalid() {
        let payload: StocksResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(matches!(parse_universe(payload), Err(ApiError::InvalidData(_))));
    }

    #[test]
    fn constructor_requires_api_key() {
        let config = ApiConfig::default();
        assert!(matches!(
            TwelveDataClient::new(&config),
            Err(ApiError::MissingCredentials(_))
        ));
    }
}
