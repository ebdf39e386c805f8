//! MongoDB backend.
//!
//! Rides live in one collection as nested documents, so the catalog queries
//! become plain filters on dotted paths, or `$group` pipelines for the
//! aggregates.

use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tokio::runtime::Runtime;

use crate::config::MongoConfig;
use crate::error::{Error, Result};
use crate::fixtures::{CatalogQuery, ProbeRide};

use super::{runtime, Backend, BackendKind, RecordId};

/// MongoDB backend for benchmarks.
pub struct MongoBackend {
    collection: Collection<Document>,
    rt: Runtime,
}

/// Native form of a catalog query.
#[derive(Debug, Clone, PartialEq)]
enum MongoQuery {
    Find(Document),
    Aggregate(Vec<Document>),
}

impl MongoBackend {
    /// Connect and ping the server so an unreachable server fails here
    /// rather than on the first timed call.
    pub fn connect(config: &MongoConfig) -> Result<Self> {
        let rt = runtime()?;

        let collection = rt
            .block_on(async {
                let mut options = ClientOptions::parse(&config.uri).await?;
                options.server_selection_timeout = Some(config.server_selection_timeout());
                let client = Client::with_options(options)?;
                let db = client.database(&config.database);
                db.run_command(doc! { "ping": 1 }).await?;
                Ok::<_, mongodb::error::Error>(db.collection::<Document>(&config.collection))
            })
            .map_err(|e| Error::Connection(format!("mongodb: {e}")))?;

        Ok(Self { collection, rt })
    }
}

impl Backend for MongoBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    fn insert_probe(&mut self, _seq: usize) -> Result<RecordId> {
        let mut probe = bson::to_document(&ProbeRide::new())
            .map_err(|e| Error::Query(format!("failed to encode probe ride: {e}")))?;
        probe.insert(
            "time",
            doc! {
                "hour": 1, "day": 1, "month": 1,
                "datetime": "2022-01-01", "timezone": "UTC",
            },
        );
        probe.insert("weather", Document::new());

        let inserted = self
            .rt
            .block_on(async { self.collection.insert_one(probe).await })?;

        inserted
            .inserted_id
            .as_object_id()
            .map(|oid| RecordId::Document(oid.to_hex()))
            .ok_or_else(|| Error::Query("insert did not return an ObjectId".into()))
    }

    fn delete_record(&mut self, id: &RecordId) -> Result<()> {
        let oid = object_id(id)?;
        self.rt
            .block_on(async { self.collection.delete_one(doc! { "_id": oid }).await })?;
        Ok(())
    }

    fn update_price(&mut self, id: &RecordId, price: f64) -> Result<()> {
        let oid = object_id(id)?;
        self.rt.block_on(async {
            self.collection
                .update_one(doc! { "_id": oid }, doc! { "$set": { "price.price": price } })
                .await
        })?;
        Ok(())
    }

    fn fetch_rides(&mut self, limit: usize) -> Result<usize> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let count = self.rt.block_on(async {
            let cursor = self.collection.find(doc! {}).limit(limit).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok::<_, mongodb::error::Error>(docs.len())
        })?;
        Ok(count)
    }

    fn run_query(&mut self, query: CatalogQuery) -> Result<usize> {
        let native = native_query(query);
        let count = self.rt.block_on(async {
            let docs: Vec<Document> = match native {
                MongoQuery::Find(filter) => {
                    self.collection.find(filter).await?.try_collect().await?
                }
                MongoQuery::Aggregate(pipeline) => {
                    self.collection.aggregate(pipeline).await?.try_collect().await?
                }
            };
            Ok::<_, mongodb::error::Error>(docs.len())
        })?;
        Ok(count)
    }
}

fn object_id(id: &RecordId) -> Result<ObjectId> {
    match id {
        RecordId::Document(hex) => ObjectId::parse_str(hex)
            .map_err(|e| Error::Query(format!("invalid ObjectId {hex:?}: {e}"))),
        other => Err(Error::Query(format!("expected a document id, got {other}"))),
    }
}

fn native_query(query: CatalogQuery) -> MongoQuery {
    match query {
        CatalogQuery::RidesByLyft => MongoQuery::Find(doc! { "cab_type": "Lyft" }),
        CatalogQuery::RidesFromNorthStation => {
            MongoQuery::Find(doc! { "source": "North Station" })
        }
        CatalogQuery::PriceDistanceFilter => MongoQuery::Find(doc! {
            "price.distance": { "$gt": 2 },
            "price.price": { "$lt": 30 },
        }),
        CatalogQuery::RidesInDecember => MongoQuery::Find(doc! { "time.month": 12 }),
        CatalogQuery::RideNamesTempAbove40 => MongoQuery::Find(doc! {
            "weather.temperature.temperatureHigh": { "$gt": 40 },
        }),
        CatalogQuery::RidesWindyDry => MongoQuery::Find(doc! {
            "weather.wind.windSpeed": { "$gt": 5 },
            "weather.humidity": { "$lt": 0.7 },
        }),
        CatalogQuery::AvgPriceByCabType => MongoQuery::Aggregate(vec![doc! {
            "$group": { "_id": "$cab_type", "avgPrice": { "$avg": "$price.price" } },
        }]),
        CatalogQuery::RideCountsByHour => MongoQuery::Aggregate(vec![doc! {
            "$group": { "_id": "$time.hour", "count": { "$sum": 1 } },
        }]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_parsing() {
        let id = RecordId::Document("67f144c61fd8f48fc214971f".into());
        assert_eq!(object_id(&id).unwrap().to_hex(), "67f144c61fd8f48fc214971f");
        assert!(object_id(&RecordId::Document("nope".into())).is_err());
        assert!(object_id(&RecordId::Row(1)).is_err());
    }

    #[test]
    fn test_aggregates_use_pipelines() {
        for query in CatalogQuery::ALL {
            let native = native_query(query);
            assert_eq!(
                matches!(native, MongoQuery::Aggregate(_)),
                query.is_aggregate(),
                "{}",
                query.label()
            );
        }
    }

    #[test]
    fn test_filter_paths() {
        assert_eq!(
            native_query(CatalogQuery::RidesInDecember),
            MongoQuery::Find(doc! { "time.month": 12 })
        );
    }
}
