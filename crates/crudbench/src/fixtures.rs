//! Benchmark fixtures.
//!
//! The ride dataset itself is loaded outside the harness; this module only
//! holds the probe record the write workloads create, the price generator,
//! and the catalog of read queries shared by every backend.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Price written to every probe record.
pub const PROBE_PRICE: f64 = 10.0;

/// Price component of a probe ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbePrice {
    pub price: f64,
}

/// Throwaway ride document inserted by the write workloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRide {
    pub source: String,
    pub destination: String,
    pub price: ProbePrice,
    pub cab_type: String,
    pub product_id: String,
    pub name: String,
}

impl ProbeRide {
    pub fn new() -> Self {
        Self {
            source: "test".into(),
            destination: "test".into(),
            price: ProbePrice { price: PROBE_PRICE },
            cab_type: "test".into(),
            product_id: "test".into(),
            name: "test".into(),
        }
    }
}

impl Default for ProbeRide {
    fn default() -> Self {
        Self::new()
    }
}

/// Seeded generator of update prices, uniform in [10, 20) with two decimals.
pub struct PriceGenerator {
    rng: StdRng,
}

impl PriceGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_price(&mut self) -> f64 {
        let raw: f64 = self.rng.gen_range(10.0..20.0);
        (raw * 100.0).round() / 100.0
    }
}

/// Read queries timed by the `queries` workload.
///
/// Each backend translates a query into its own syntax: SQL for the
/// relational stores, a filter or aggregation pipeline for MongoDB, and a
/// RediSearch query for Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogQuery {
    RidesByLyft,
    RidesFromNorthStation,
    PriceDistanceFilter,
    RidesInDecember,
    RideNamesTempAbove40,
    RidesWindyDry,
    AvgPriceByCabType,
    RideCountsByHour,
}

impl CatalogQuery {
    /// Every query, easiest first.
    pub const ALL: [CatalogQuery; 8] = [
        CatalogQuery::RidesByLyft,
        CatalogQuery::RidesFromNorthStation,
        CatalogQuery::PriceDistanceFilter,
        CatalogQuery::RidesInDecember,
        CatalogQuery::RideNamesTempAbove40,
        CatalogQuery::RidesWindyDry,
        CatalogQuery::AvgPriceByCabType,
        CatalogQuery::RideCountsByHour,
    ];

    /// Row label in reports.
    pub fn label(&self) -> &'static str {
        match self {
            CatalogQuery::RidesByLyft => "rides_by_lyft",
            CatalogQuery::RidesFromNorthStation => "rides_from_north_station",
            CatalogQuery::PriceDistanceFilter => "price_distance_filter",
            CatalogQuery::RidesInDecember => "rides_in_december",
            CatalogQuery::RideNamesTempAbove40 => "ride_names_temp_above_40",
            CatalogQuery::RidesWindyDry => "rides_wind_gt5_humidity_lt07",
            CatalogQuery::AvgPriceByCabType => "avg_price_by_cab_type",
            CatalogQuery::RideCountsByHour => "ride_counts_by_hour",
        }
    }

    /// Whether the query groups rows instead of filtering them.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            CatalogQuery::AvgPriceByCabType | CatalogQuery::RideCountsByHour
        )
    }

    /// SQL text, identical for PostgreSQL and MySQL.
    pub fn sql(&self) -> &'static str {
        match self {
            CatalogQuery::RidesByLyft => "SELECT * FROM Ride WHERE cab_type = 'Lyft'",
            CatalogQuery::RidesFromNorthStation => {
                "SELECT * FROM Ride WHERE source = 'North Station'"
            }
            CatalogQuery::PriceDistanceFilter => {
                "SELECT * FROM Price WHERE distance > 2 AND price < 30 ORDER BY price DESC"
            }
            CatalogQuery::RidesInDecember => "SELECT * FROM Time WHERE month = 12",
            CatalogQuery::RideNamesTempAbove40 => {
                "SELECT r.name FROM Ride r \
                 JOIN Weather w ON r.weather_id = w.id \
                 JOIN Temperature t ON w.temperature_id = t.id \
                 WHERE t.temperatureHigh > 40"
            }
            CatalogQuery::RidesWindyDry => {
                "SELECT r.* FROM Ride r \
                 JOIN Weather w ON r.weather_id = w.id \
                 JOIN Wind wi ON w.wind_id = wi.id \
                 WHERE wi.windSpeed > 5 AND w.humidity < 0.7"
            }
            CatalogQuery::AvgPriceByCabType => {
                "SELECT r.cab_type, AVG(p.price) FROM Ride r \
                 JOIN Price p ON r.price_id = p.id \
                 GROUP BY r.cab_type"
            }
            CatalogQuery::RideCountsByHour => {
                "SELECT t.hour, COUNT(*) FROM Ride r \
                 JOIN Time t ON r.time_id = t.id \
                 GROUP BY t.hour"
            }
        }
    }
}

/// Full join of a ride with all of its dimension rows, limited by a bind
/// parameter. `placeholder` is `$1` for PostgreSQL and `?` for MySQL.
pub fn full_ride_select(placeholder: &str) -> String {
    format!(
        "SELECT r.*, p.*, t.*, w.*, temp.*, atemp.*, wind.*, cond.* \
         FROM Ride r \
         JOIN Price p ON r.price_id = p.id \
         JOIN Time t ON r.time_id = t.id \
         JOIN Weather w ON r.weather_id = w.id \
         JOIN Temperature temp ON w.temperature_id = temp.id \
         JOIN ApparentTemperature atemp ON w.apparent_temperature_id = atemp.id \
         JOIN Wind wind ON w.wind_id = wind.id \
         JOIN Conditions cond ON w.conditions_id = cond.id \
         LIMIT {placeholder}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prices_in_range_with_two_decimals() {
        let mut prices = PriceGenerator::new(7);
        for _ in 0..1000 {
            let p = prices.next_price();
            assert!((10.0..=20.0).contains(&p), "price out of range: {p}");
            assert!(((p * 100.0).round() - p * 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_prices_reproducible() {
        let a: Vec<f64> = {
            let mut g = PriceGenerator::new(42);
            (0..10).map(|_| g.next_price()).collect()
        };
        let b: Vec<f64> = {
            let mut g = PriceGenerator::new(42);
            (0..10).map(|_| g.next_price()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_catalog_labels_unique() {
        let mut labels: Vec<_> = CatalogQuery::ALL.iter().map(|q| q.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), CatalogQuery::ALL.len());
    }

    #[test]
    fn test_aggregates() {
        let aggregates: Vec<_> = CatalogQuery::ALL
            .iter()
            .filter(|q| q.is_aggregate())
            .collect();
        assert_eq!(aggregates.len(), 2);
        assert!(CatalogQuery::AvgPriceByCabType.sql().contains("GROUP BY"));
    }

    #[test]
    fn test_full_ride_select_placeholder() {
        assert!(full_ride_select("$1").ends_with("LIMIT $1"));
        assert!(full_ride_select("?").ends_with("LIMIT ?"));
    }
}
