//! Payload retrieval.
//!
//! Serves the reassembled payload through the result cache. A cache read
//! failure counts as a miss; a cache write failure (oversized entry, backend
//! error) is logged and the freshly built payload is still returned. Used by
//! both `feed fetch` and `GET /payload`.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::access_log::{AccessEvent, Operation, Outcome};
use crate::backends::Backends;
use crate::cache::payload_cache_key;
use crate::config::Config;
use crate::error::FetchError;
use crate::reassemble::reassemble;

/// Where a served payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Store,
}

/// Serialized payload plus provenance.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub json: String,
    pub source: PayloadSource,
    pub skipped_rows: usize,
}

/// Return the serialized payload, from cache when possible.
pub async fn fetch_payload(
    config: &Config,
    backends: &Backends,
) -> Result<FetchedPayload, FetchError> {
    let result = fetch_inner(config, backends).await;

    let event = match &result {
        Ok(fetched) if fetched.source == PayloadSource::Cache => AccessEvent::new(
            Operation::FetchPayload,
            Outcome::CacheHit,
            format!("{} bytes", fetched.json.len()),
        ),
        Ok(fetched) => AccessEvent::new(
            Operation::FetchPayload,
            Outcome::Success,
            format!(
                "{} bytes rebuilt, {} rows skipped",
                fetched.json.len(),
                fetched.skipped_rows
            ),
        ),
        Err(e) => AccessEvent::new(Operation::FetchPayload, Outcome::Failure, e.to_string()),
    };
    backends.log.record(event).await;

    result
}

async fn fetch_inner(config: &Config, backends: &Backends) -> Result<FetchedPayload, FetchError> {
    let key = payload_cache_key(&config.cache.key_prefix);

    match backends.cache.get(&key).await {
        Ok(Some(json)) => {
            debug!(key = %key, "serving cached payload");
            return Ok(FetchedPayload {
                json,
                source: PayloadSource::Cache,
                skipped_rows: 0,
            });
        }
        Ok(None) => {}
        Err(e) => warn!(key = %key, error = %e, "cache read failed, rebuilding payload"),
    }

    let reassembly = reassemble(backends.store.as_ref()).await?;
    let json = serde_json::to_string(&reassembly.payload)?;
    info!(
        config_keys = reassembly.payload.config.len(),
        data_keys = reassembly.payload.data.len(),
        skipped = reassembly.skipped.len(),
        bytes = json.len(),
        "payload rebuilt from store"
    );

    if let Err(e) = backends.cache.put(&key, &json, config.cache.ttl()).await {
        warn!(key = %key, error = %e, "payload not cached");
    }

    Ok(FetchedPayload {
        json,
        source: PayloadSource::Store,
        skipped_rows: reassembly.skipped.len(),
    })
}

/// CLI entry point for `feed fetch`.
pub async fn run_fetch(config: &Config) -> Result<()> {
    let backends = Backends::open(config).await?;
    let fetched = fetch_payload(config, &backends).await?;
    println!("{}", fetched.json);
    Ok(())
}
