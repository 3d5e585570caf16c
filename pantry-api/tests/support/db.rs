use pantry_api::{DbConfig, PgStore};

/// Store against `PANTRY_DB_*`, schema applied.
pub async fn test_pg_store() -> PgStore {
    let store = PgStore::from_config(&DbConfig::from_env()).expect("Failed to create pool");
    store.apply_schema().await.expect("Failed to apply schema");
    store
}

/// Suffix that keeps rows from different runs apart.
pub fn unique_suffix() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0);
    nanos & 0x00FF_FFFF
}
