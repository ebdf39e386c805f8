//! Redis backend.
//!
//! Rides are RedisJSON documents under a key prefix, indexed by RediSearch.
//! Servers without those modules answer with response errors, which surface
//! as [`Error::Unsupported`] and mark the backend unavailable.

use std::time::Duration;

use redis::{Commands, Connection, Value};

use crate::config::RedisConfig;
use crate::error::{Error, Result};
use crate::fixtures::{CatalogQuery, ProbeRide};

use super::{Backend, BackendKind, RecordId};

/// Timeout for establishing the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Key prefix of probe records, kept apart from the ride keys.
const PROBE_PREFIX: &str = "bench:probe:";

/// Redis backend for benchmarks.
pub struct RedisBackend {
    con: Connection,
    index: String,
    key_prefix: String,
    fetch_keys: Option<Vec<String>>,
}

/// Native form of a catalog query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedisQuery {
    /// `FT.SEARCH <index> <query>`
    Search(&'static str),
    /// `FT.AGGREGATE <index> <args...>`
    Aggregate(&'static [&'static str]),
}

impl RedisBackend {
    /// Connect using the configured URL.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| Error::Connection(format!("redis: {e}")))?;
        let con = client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| Error::Connection(format!("redis: {e}")))?;

        Ok(Self {
            con,
            index: config.index.clone(),
            key_prefix: config.key_prefix.clone(),
            fetch_keys: None,
        })
    }

    fn scan_keys(&mut self, limit: usize) -> Result<Vec<String>> {
        let pattern = format!("{}*", self.key_prefix);
        let keys: Vec<String> = self.con.scan_match(pattern)?.take(limit).collect();
        Ok(keys)
    }
}

impl Backend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn insert_probe(&mut self, seq: usize) -> Result<RecordId> {
        let key = format!("{PROBE_PREFIX}{seq}");
        let json = serde_json::to_string(&ProbeRide::new())
            .map_err(|e| Error::Query(format!("failed to encode probe ride: {e}")))?;

        redis::cmd("JSON.SET")
            .arg(&key)
            .arg("$")
            .arg(json)
            .query::<()>(&mut self.con)?;

        Ok(RecordId::Key(key))
    }

    fn delete_record(&mut self, id: &RecordId) -> Result<()> {
        let key = record_key(id)?;
        let _: () = self.con.del(key)?;
        Ok(())
    }

    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()> {
        let key = record_key(id)?;
        redis::cmd("JSON.SET")
            .arg(key)
            .arg("$.price.price")
            .arg(price)
            .query::<()>(&mut self.con)?;
        Ok(())
    }

    fn prepare_fetch(&mut self, limit: usize) -> Result<()> {
        self.fetch_keys = Some(self.scan_keys(limit)?);
        Ok(())
    }

    fn fetch_rides(&mut self, limit: usize) -> Result<usize> {
        let keys = match self.fetch_keys.take() {
            Some(keys) => keys,
            None => self.scan_keys(limit)?,
        };
        if keys.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        for key in keys.iter().take(limit) {
            pipe.cmd("JSON.GET").arg(key);
        }
        let payloads: Vec<Option<String>> = pipe.query(&mut self.con)?;

        Ok(decode_rides(&payloads))
    }

    fn run_query(&mut self, query: CatalogQuery) -> Result<usize> {
        let reply: Value = match native_query(query) {
            RedisQuery::Search(text) => redis::cmd("FT.SEARCH")
                .arg(&self.index)
                .arg(text)
                .query(&mut self.con)?,
            RedisQuery::Aggregate(args) => redis::cmd("FT.AGGREGATE")
                .arg(&self.index)
                .arg(args)
                .query(&mut self.con)?,
        };

        Ok(reply_rows(&reply, query.is_aggregate()))
    }
}

fn record_key(id: &RecordId) -> Result<&str> {
    match id {
        RecordId::Key(key) => Ok(key),
        other => Err(Error::Query(format!("expected a key, got {other}"))),
    }
}

fn decode_ride(payload: &str) -> Result<serde_json::Value> {
    serde_json::from_str(payload).map_err(|e| Error::Decode(format!("ride document: {e}")))
}

/// Decode `JSON.GET` payloads, skipping missing keys and undecodable values.
fn decode_rides(payloads: &[Option<String>]) -> usize {
    let mut decoded = 0;
    for payload in payloads.iter().flatten() {
        match decode_ride(payload) {
            Ok(_) => decoded += 1,
            Err(e) => tracing::warn!(error = %e, "skipping undecodable ride document"),
        }
    }
    decoded
}

/// Result rows in an `FT.SEARCH` or `FT.AGGREGATE` reply.
///
/// Both replies start with a total count. Search replies then alternate key
/// and field list; aggregate replies carry one entry per group.
fn reply_rows(reply: &Value, aggregate: bool) -> usize {
    match reply {
        Value::Array(items) if !items.is_empty() => {
            let rest = items.len() - 1;
            if aggregate {
                rest
            } else {
                rest / 2
            }
        }
        _ => 0,
    }
}

fn native_query(query: CatalogQuery) -> RedisQuery {
    match query {
        CatalogQuery::RidesByLyft => RedisQuery::Search("@cab_type:Lyft"),
        CatalogQuery::RidesFromNorthStation => RedisQuery::Search("@source:\"North Station\""),
        CatalogQuery::PriceDistanceFilter => {
            RedisQuery::Search("@price_distance:[2 +inf] @price_price:[-inf 30]")
        }
        CatalogQuery::RidesInDecember => RedisQuery::Search("@month:[12 12]"),
        CatalogQuery::RideNamesTempAbove40 => RedisQuery::Search("@temp_high:[40 +inf]"),
        CatalogQuery::RidesWindyDry => {
            RedisQuery::Search("@wind_speed:[5 +inf] @weather_humidity:[-inf 0.7]")
        }
        CatalogQuery::AvgPriceByCabType => RedisQuery::Aggregate(&[
            "*", "GROUPBY", "1", "@cab_type", "REDUCE", "AVG", "1", "@price_price", "AS",
            "avgPrice",
        ]),
        CatalogQuery::RideCountsByHour => RedisQuery::Aggregate(&[
            "*", "GROUPBY", "1", "@hour", "REDUCE", "COUNT", "0", "AS", "count",
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_skips_bad_items() {
        let payloads = vec![
            Some(r#"{"source":"a","price":{"price":12.5}}"#.to_string()),
            Some("{not json".to_string()),
            None,
            Some(r#"[{"source":"b"}]"#.to_string()),
        ];
        assert_eq!(decode_rides(&payloads), 2);
    }

    #[test]
    fn test_undecodable_ride_is_decode_error() {
        assert!(matches!(decode_ride("{not json"), Err(Error::Decode(_))));
        assert!(decode_ride(r#"{"source":"a"}"#).is_ok());
    }

    #[test]
    fn test_reply_rows() {
        let search = Value::Array(vec![
            Value::Int(2),
            Value::BulkString(b"ride:1".to_vec()),
            Value::Array(vec![]),
            Value::BulkString(b"ride:2".to_vec()),
            Value::Array(vec![]),
        ]);
        assert_eq!(reply_rows(&search, false), 2);

        let aggregate = Value::Array(vec![
            Value::Int(3),
            Value::Array(vec![]),
            Value::Array(vec![]),
            Value::Array(vec![]),
        ]);
        assert_eq!(reply_rows(&aggregate, true), 3);

        assert_eq!(reply_rows(&Value::Nil, false), 0);
        assert_eq!(reply_rows(&Value::Array(vec![]), true), 0);
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key(&RecordId::Key("ride:1".into())).unwrap(), "ride:1");
        assert!(record_key(&RecordId::Row(1)).is_err());
    }

    #[test]
    fn test_aggregates_use_ft_aggregate() {
        for query in CatalogQuery::ALL {
            assert_eq!(
                matches!(native_query(query), RedisQuery::Aggregate(_)),
                query.is_aggregate()
            );
        }
    }
}
