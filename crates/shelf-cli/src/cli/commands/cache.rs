//! Cache command handlers.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};
use serde_json::Value;
use shelf_core::config::Config;
use shelf_core::store::{CacheKey, FileCache, KvCache};

/// Human summary of one raw cache entry.
fn describe(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "absent".to_string();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => format!("{} record(s)", items.len()),
        Ok(Value::Null) => "empty".to_string(),
        Ok(_) => "1 record".to_string(),
        Err(_) => "corrupt (dropped on next start)".to_string(),
    }
}

pub fn show(config: &Config) -> Result<()> {
    let cache = FileCache::new(config.effective_cache_dir());
    println!("Cache directory: {}", cache.dir().display());

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Key", "File", "Contents"]);
    for key in CacheKey::ALL {
        let raw = cache.get(key)?;
        table.add_row(vec![
            key.as_str().to_string(),
            cache.path_for(key).display().to_string(),
            describe(raw.as_deref()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn clear(config: &Config) -> Result<()> {
    let mut cache = FileCache::new(config.effective_cache_dir());
    for key in CacheKey::ALL {
        cache.remove(key)?;
    }
    println!("Cleared cache at {}", cache.dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_entries() {
        assert_eq!(describe(None), "absent");
        assert_eq!(describe(Some("[1,2,3]")), "3 record(s)");
        assert_eq!(describe(Some("null")), "empty");
        assert_eq!(describe(Some("{\"job_id\":\"A\"}")), "1 record");
        assert!(describe(Some("{not json")).starts_with("corrupt"));
    }
}
