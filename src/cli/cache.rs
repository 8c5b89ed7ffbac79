//! Cache management commands

use chrono::{DateTime, Local, Utc};
use serde_json::json;

use crate::cache::{CacheEntry, CacheTtl, SqliteStore};
use crate::capture::asset::decode_data_url;
use crate::cli::{CommandContext, format_size};
use crate::error::Result;

/// Summary of a cached photo for display
pub(crate) struct EntrySummary {
    pub mime_type: String,
    pub size_bytes: usize,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl EntrySummary {
    pub fn from_entry(entry: &CacheEntry) -> Self {
        let (mime_type, size_bytes) = decode_data_url(&entry.image)
            .map(|(mime, bytes)| (mime, bytes.len()))
            .unwrap_or_else(|| ("unknown".to_string(), 0));
        let captured_at = DateTime::from_timestamp_millis(entry.captured_at_epoch_millis)
            .unwrap_or_default();
        let ttl = chrono::Duration::milliseconds(CacheTtl::IMAGE.as_millis() as i64);

        Self {
            mime_type,
            size_bytes,
            captured_at,
            expires_at: captured_at.checked_add_signed(ttl).unwrap_or(captured_at),
        }
    }

    /// "in 3h 12m" style remaining lifetime
    pub fn expires_in(&self, now: DateTime<Utc>) -> String {
        let remaining = self.expires_at.signed_duration_since(now);
        if remaining.num_seconds() <= 0 {
            return "now".to_string();
        }
        format!(
            "in {}h {}m",
            remaining.num_hours(),
            remaining.num_minutes() % 60
        )
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Show the cached photo
pub fn show(ctx: &CommandContext, raw: bool) -> Result<()> {
    let entry = ctx.cache().read()?;

    if ctx.format.is_json() {
        let value = match &entry {
            Some(entry) => {
                let summary = EntrySummary::from_entry(entry);
                let mut value = json!({
                    "cached": true,
                    "mime_type": summary.mime_type,
                    "size_bytes": summary.size_bytes,
                    "captured_at": summary.captured_at.to_rfc3339(),
                    "expires_at": summary.expires_at.to_rfc3339(),
                });
                if raw {
                    value["image"] = json!(entry.image);
                }
                value
            }
            None => json!({ "cached": false }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let Some(entry) = entry else {
        println!("No cached photo");
        return Ok(());
    };

    if raw {
        println!("{}", entry.image);
        return Ok(());
    }

    let summary = EntrySummary::from_entry(&entry);
    println!("Cached Photo");
    println!("────────────────────────────────────────");
    println!("Type:           {}", summary.mime_type);
    println!("Size:           {}", format_size(summary.size_bytes));
    println!("Captured:       {}", local_time(summary.captured_at));
    println!("Expires:        {}", summary.expires_in(Utc::now()));
    Ok(())
}

/// Show storage statistics
pub fn status(ctx: &CommandContext) -> Result<()> {
    let stats = ctx.store().stats()?;
    let path = ctx.store().db_path().display().to_string();

    if ctx.format.is_json() {
        let json = json!({
            "total_entries": stats.total_entries,
            "total_size_bytes": stats.total_size_bytes,
            "total_size_human": format_size(stats.total_size_bytes),
            "last_updated_timestamp": stats.last_updated,
            "path": path,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Cache Status");
    println!("────────────────────────────────────────");
    println!("Location:       {}", path);
    println!("Entries:        {}", stats.total_entries);
    println!("Total size:     {}", format_size(stats.total_size_bytes));
    if let Some(updated) = stats.last_updated {
        let dt = DateTime::from_timestamp(updated, 0)
            .map(local_time)
            .unwrap_or_else(|| "unknown".to_string());
        println!("Last write:     {}", dt);
    }
    Ok(())
}

/// Remove the cached photo
pub fn clear(ctx: &CommandContext) -> Result<()> {
    let had_entry = ctx.cache().read()?.is_some();
    ctx.cache().clear()?;

    if ctx.format.is_json() {
        let json = json!({ "cleared": had_entry, "success": true });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if had_entry {
        println!("Cleared cached photo");
    } else {
        println!("Cache was already empty");
    }
    Ok(())
}

/// Print the cache directory
pub fn path(ctx: &CommandContext) -> Result<()> {
    let dir = match &ctx.config.cache_dir {
        Some(dir) => dir.clone(),
        None => SqliteStore::cache_dir()?,
    };
    println!("{}", dir.display());
    Ok(())
}
