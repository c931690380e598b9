//! Shallow-recursive TOML table merge with per-leaf provenance tracking.

use crate::show::{ConfigLayer, FieldSources};

/// Merge `overlay` into `base` in place: tables merge recursively, every
/// other value type is replaced wholesale. Every leaf touched by `overlay`
/// is recorded in `sources` as having come from `layer`.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_value) in overlay_table {
                let field_path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match base_table.get_mut(key) {
                    Some(existing) => {
                        deep_merge_tracking(existing, overlay_value, &field_path, layer, sources);
                    }
                    None => {
                        base_table.insert(key.clone(), overlay_value.clone());
                        record_leaves(overlay_value, &field_path, layer, sources);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
            sources.record(prefix, layer);
        }
    }
}

/// Record every leaf field under `value` (recursing into tables) as coming
/// from `layer`, used when an overlay introduces a brand-new subtree.
fn record_leaves(value: &toml::Value, prefix: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    match value {
        toml::Value::Table(table) => {
            for (key, v) in table {
                let field_path = format!("{prefix}.{key}");
                record_leaves(v, &field_path, layer, sources);
            }
        }
        _ => sources.record(prefix, layer),
    }
}

/// Record every leaf field of `value` as coming from `layer`, used to seed
/// `FieldSources` with the embedded defaults before any overlay is applied.
pub fn record_all_as(value: &toml::Value, layer: ConfigLayer, sources: &mut FieldSources) {
    if let toml::Value::Table(table) = value {
        for (key, v) in table {
            record_leaves(v, key, layer, sources);
        }
    }
}
