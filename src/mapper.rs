//! Record mappers: external aggregator schema → normalized records.
//!
//! Both mappers are pure and total: no I/O, deterministic, and they never
//! fail. Malformed individual fields degrade to `0` / `false` / `None`;
//! a record is dropped (mapped to `None`) only when it cannot be
//! persisted at all — below the TVL admission threshold, or missing its
//! natural key.

use serde_json::Value;

use crate::storage::models::{NewPool, NewProtocol};

/// Maps one raw pool element, applying the minimum-TVL admission filter.
///
/// Returns `None` when `tvlUsd < min_tvl` (the boundary value is
/// admitted) or when the record has no pool id.
#[must_use]
pub fn map_pool(raw: &Value, min_tvl: f64) -> Option<NewPool> {
    let defillama_pool_id = key_field(raw, "pool")?;

    let tvl_usd = f64_field(raw, "tvlUsd");
    if tvl_usd < min_tvl {
        return None;
    }

    Some(NewPool {
        defillama_pool_id,
        symbol: str_field(raw, "symbol"),
        chain: str_field(raw, "chain"),
        project: str_field(raw, "project"),
        tvl_usd,
        apy: f64_field(raw, "apy"),
        apy_base: f64_field(raw, "apyBase"),
        apy_reward: f64_field(raw, "apyReward"),
        volume_usd_1d: f64_field(raw, "volumeUsd1d"),
        volume_usd_7d: f64_field(raw, "volumeUsd7d"),
        apy_mean_30d: f64_field(raw, "apyMean30d"),
        mu: f64_field(raw, "mu"),
        sigma: f64_field(raw, "sigma"),
        count: i64_field(raw, "count"),
        stablecoin: bool_field(raw, "stablecoin"),
        outlier: bool_field(raw, "outlier"),
        il_risk: opt_str_field(raw, "ilRisk"),
        exposure: opt_str_field(raw, "exposure"),
        pool_meta: opt_str_field(raw, "poolMeta"),
        underlying_tokens: opt_array_field(raw, "underlyingTokens"),
        url: opt_str_field(raw, "url"),
        inception: opt_str_field(raw, "inception"),
    })
}

/// Maps one raw protocol element.
///
/// The natural key is the external `id`, falling back to `slug`; a
/// record with neither is dropped. Missing tvl defaults to 0.
#[must_use]
pub fn map_protocol(raw: &Value) -> Option<NewProtocol> {
    let defillama_id = key_field(raw, "id").or_else(|| key_field(raw, "slug"))?;

    Some(NewProtocol {
        defillama_id,
        name: str_field(raw, "name"),
        slug: str_field(raw, "slug"),
        tvl: f64_field(raw, "tvl"),
        change_1d: f64_field(raw, "change_1d"),
        change_7d: f64_field(raw, "change_7d"),
        chains: opt_array_field(raw, "chains"),
        category: opt_str_field(raw, "category"),
        url: opt_str_field(raw, "url"),
        logo: opt_str_field(raw, "logo"),
    })
}

/// Extracts a natural-key field. Numeric ids are stringified; empty
/// strings count as absent.
fn key_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// String field defaulting to `""`. The aggregator occasionally sends
/// numbers where strings are expected; those degrade via `to_string`.
fn str_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Numeric field defaulting to `0.0` on missing, null, or non-numeric
/// values. NaN also degrades to `0.0` so it never reaches storage.
fn f64_field(raw: &Value, key: &str) -> f64 {
    raw.get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Integer field defaulting to `0`.
fn i64_field(raw: &Value, key: &str) -> i64 {
    raw.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Boolean field defaulting to `false`.
fn bool_field(raw: &Value, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Optional string field: `None` on missing, null, or empty.
fn opt_str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Optional JSON-array field, kept opaque for JSONB storage.
fn opt_array_field(raw: &Value, key: &str) -> Option<Value> {
    raw.get(key).filter(|v| v.is_array()).cloned()
}
