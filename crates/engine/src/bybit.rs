use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use common::{
    Candle, Error, Instrument, Interval, MarketDataGateway, Result, Ticker, TickerSnapshot,
};

pub const DEFAULT_BASE_URL: &str = "https://api.bybit.com";
const CATEGORY: &str = "linear";
const INSTRUMENTS_PAGE_LIMIT: &str = "1000";
const MAX_INSTRUMENT_PAGES: usize = 10;

/// Public REST client for Bybit v5 linear market data. No credentials needed.
pub struct BybitClient {
    base_url: String,
    http: Client,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = Url::parse_with_params(&format!("{}{path}", self.base_url), params)
            .map_err(|e| Error::Http(format!("bad url for {path}: {e}")))?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketDataGateway for BybitClient {
    async fn ticker_snapshot(&self) -> Result<TickerSnapshot> {
        let body = self.get("/v5/market/tickers", &[("category", CATEGORY)]).await?;
        let snapshot = parse_tickers(&body)?;
        if snapshot.rejected > 0 {
            warn!(rejected = snapshot.rejected, "Ticker rows failed to parse");
        }
        debug!(tickers = snapshot.tickers.len(), "Ticker snapshot fetched");
        Ok(snapshot)
    }

    async fn candles(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Vec<Candle>> {
        let limit = limit.to_string();
        let body = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", CATEGORY),
                    ("symbol", symbol),
                    ("interval", interval.as_str()),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;
        parse_klines(&body)
    }

    async fn instruments(&self) -> Result<Vec<Instrument>> {
        let mut out = Vec::new();
        let mut cursor = String::new();

        for _ in 0..MAX_INSTRUMENT_PAGES {
            let mut params = vec![("category", CATEGORY), ("limit", INSTRUMENTS_PAGE_LIMIT)];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }
            let body = self.get("/v5/market/instruments-info", &params).await?;
            let (page, next) = parse_instruments(&body)?;
            out.extend(page);

            match next {
                Some(next) if !next.is_empty() => cursor = next,
                _ => break,
            }
        }

        debug!(instruments = out.len(), "Instruments fetched");
        Ok(out)
    }
}

/// Unwrap the v5 envelope. A non-zero `retCode` is an exchange error.
fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if envelope.ret_code != 0 {
        return Err(Error::Exchange(format!(
            "retCode {}: {}",
            envelope.ret_code, envelope.ret_msg
        )));
    }
    envelope
        .result
        .ok_or_else(|| Error::Exchange("response has no result".into()))
}

/// Parse a tickers response. Rows with an unparseable price or turnover are
/// dropped and counted; an empty funding rate reads as zero.
pub fn parse_tickers(body: &str) -> Result<TickerSnapshot> {
    let result: ListResult<RawTicker> = unwrap_envelope(body)?;
    let mut snapshot = TickerSnapshot::default();

    for raw in result.list {
        let (Ok(last_price), Ok(turnover_24h)) =
            (raw.last_price.parse::<f64>(), raw.turnover_24h.parse::<f64>())
        else {
            snapshot.rejected += 1;
            continue;
        };
        snapshot.tickers.push(Ticker {
            symbol: raw.symbol,
            last_price,
            turnover_24h,
            funding_rate: raw.funding_rate.parse().unwrap_or(0.0),
            delivery_time: raw.delivery_time.parse().unwrap_or(0),
            price_scale: None,
        });
    }
    Ok(snapshot)
}

/// Parse a kline response, keeping exchange order (newest first). A
/// malformed row fails the whole series: a gap would skew every indicator.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let result: ListResult<Vec<String>> = unwrap_envelope(body)?;
    result.list.iter().map(|row| parse_kline_row(row)).collect()
}

fn parse_kline_row(row: &[String]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::Exchange(format!("kline row has {} fields", row.len())));
    }
    let num = |i: usize| {
        row[i]
            .parse::<f64>()
            .map_err(|e| Error::Exchange(format!("kline field {i} '{}': {e}", row[i])))
    };
    Ok(Candle {
        timestamp: row[0]
            .parse::<i64>()
            .map_err(|e| Error::Exchange(format!("kline timestamp '{}': {e}", row[0])))?,
        open: num(1)?,
        high: num(2)?,
        low: num(3)?,
        close: num(4)?,
        volume: num(5)?,
    })
}

/// Parse one instruments-info page and its continuation cursor.
pub fn parse_instruments(body: &str) -> Result<(Vec<Instrument>, Option<String>)> {
    let result: ListResult<RawInstrument> = unwrap_envelope(body)?;
    let instruments = result
        .list
        .into_iter()
        .map(|raw| Instrument {
            symbol: raw.symbol,
            delivery_time: raw.delivery_time.parse().unwrap_or(0),
            price_scale: raw.price_scale.parse().ok(),
        })
        .collect();
    Ok((instruments, result.next_page_cursor))
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResult<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    #[serde(default)]
    last_price: String,
    #[serde(default, rename = "turnover24h")]
    turnover_24h: String,
    #[serde(default)]
    funding_rate: String,
    #[serde(default)]
    delivery_time: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstrument {
    symbol: String,
    #[serde(default)]
    delivery_time: String,
    #[serde(default)]
    price_scale: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickers_parse_and_count_rejects() {
        let body = r#"{
            "retCode": 0, "retMsg": "OK",
            "result": {"category": "linear", "list": [
                {"symbol": "BTCUSDT", "lastPrice": "65000.5", "turnover24h": "1500000000",
                 "fundingRate": "0.0001", "deliveryTime": "0"},
                {"symbol": "NEWUSDT", "lastPrice": "0.25", "turnover24h": "2000000",
                 "fundingRate": ""},
                {"symbol": "BADUSDT", "lastPrice": "", "turnover24h": "1"}
            ]}
        }"#;
        let snapshot = parse_tickers(body).unwrap();
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.tickers.len(), 2);
        assert_eq!(snapshot.tickers[0].last_price, 65000.5);
        assert_eq!(snapshot.tickers[0].funding_rate, 0.0001);
        assert_eq!(snapshot.tickers[1].funding_rate, 0.0);
        assert_eq!(snapshot.tickers[1].delivery_time, 0);
    }

    #[test]
    fn nonzero_ret_code_is_exchange_error() {
        let body = r#"{"retCode": 10001, "retMsg": "params error", "result": {}}"#;
        match parse_tickers(body) {
            Err(Error::Exchange(msg)) => assert!(msg.contains("10001")),
            other => panic!("expected exchange error, got {other:?}"),
        }
    }

    #[test]
    fn klines_keep_exchange_order() {
        let body = r#"{"retCode": 0, "retMsg": "OK", "result": {"symbol": "BTCUSDT", "list": [
            ["1700000060000", "101", "102", "100", "101.5", "10", "1015"],
            ["1700000000000", "100", "101", "99", "101", "12", "1212"]
        ]}}"#;
        let candles = parse_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_060_000);
        assert_eq!(candles[1].close, 101.0);
    }

    #[test]
    fn malformed_kline_row_fails_series() {
        let body = r#"{"retCode": 0, "result": {"list": [["1700000000000", "x", "1", "1", "1", "1"]]}}"#;
        assert!(parse_klines(body).is_err());
    }

    #[test]
    fn instruments_carry_delivery_and_cursor() {
        let body = r#"{"retCode": 0, "result": {"nextPageCursor": "abc", "list": [
            {"symbol": "BTCUSDT", "deliveryTime": "0", "priceScale": "2"},
            {"symbol": "OLDUSDT", "deliveryTime": "1735689600000", "priceScale": "4"}
        ]}}"#;
        let (list, cursor) = parse_instruments(body).unwrap();
        assert_eq!(cursor.as_deref(), Some("abc"));
        assert!(!list[0].is_delisting());
        assert!(list[1].is_delisting());
        assert_eq!(list[0].price_scale, Some(2));
    }
}
