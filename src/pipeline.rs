use std::sync::Arc;

use crate::aliases::HeaderAliasTable;
use crate::cache::{CacheKey, TableCache};
use crate::error::SurveyError;
use crate::models::NormalizedTable;
use crate::normalize;
use crate::source::{self, SourceBytes};

/// Decodes and normalizes one source, consulting `cache` first.
///
/// Row-level date failures are counted in the result. Table-level
/// problems (empty or unreadable source, no time column, no usable rows)
/// are returned as errors and never cached.
pub fn load(
    input: &SourceBytes,
    aliases: &HeaderAliasTable,
    cache: &mut dyn TableCache,
) -> Result<Arc<NormalizedTable>, SurveyError> {
    if input.bytes.is_empty() {
        return Err(SurveyError::EmptySource);
    }

    let format = input.format();
    let key = CacheKey::new(&input.bytes, format, aliases.version());
    if let Some(table) = cache.get(&key) {
        tracing::info!(source = %input.name, key = &key.as_str()[..12], "cache hit");
        return Ok(table);
    }

    let raw = source::decode(&input.bytes, format)?;
    let table = normalize::normalize(&raw, aliases)?;

    if table.records.is_empty() {
        return Err(SurveyError::NoUsableRows {
            dropped: table.dropped,
        });
    }

    tracing::info!(
        source = %input.name,
        format = format.label(),
        records = table.records.len(),
        dropped = table.dropped,
        time_column = %table.time_column,
        "loaded survey table"
    );

    let table = Arc::new(table);
    cache.put(key, Arc::clone(&table));
    Ok(table)
}
