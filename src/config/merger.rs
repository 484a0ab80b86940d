//! Layering of YAML configuration documents.
//!
//! - Mappings merge key by key
//! - Sequences and scalars in the overlay replace the base
//! - A `null` in the overlay removes the key

use serde_yaml::{Mapping, Value};

/// Apply `overlay` on top of `base` in place.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    base_map.remove(&key);
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Fold documents left to right; the last has the highest priority.
///
/// Empty documents (which YAML reads as `null`) contribute nothing.
pub fn merge_configs(layers: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Mapping(Mapping::new());
    for layer in layers.into_iter().filter(|v| !v.is_null()) {
        deep_merge(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn nested_mappings_merge() {
        let mut base = yaml("steam:\n  shortcut: true\n  autostart: true");
        deep_merge(&mut base, yaml("steam:\n  autostart: false"));
        assert_eq!(base, yaml("steam:\n  shortcut: true\n  autostart: false"));
    }

    #[test]
    fn sequences_are_replaced() {
        let mut base = yaml("verification:\n  packages: [a, b, c]");
        deep_merge(&mut base, yaml("verification:\n  packages: [d]"));
        assert_eq!(base["verification"]["packages"], yaml("[d]"));
    }

    #[test]
    fn null_removes_key() {
        let mut base = yaml("release: v1\nhomebrew_dir: /opt/hb");
        deep_merge(&mut base, yaml("homebrew_dir: ~"));
        assert_eq!(base, yaml("release: v1"));
    }

    #[test]
    fn later_layers_win_and_empty_layers_are_skipped() {
        let merged = merge_configs([
            yaml("release: v1\nmode: build"),
            Value::Null,
            yaml("release: v2"),
        ]);
        assert_eq!(merged, yaml("release: v2\nmode: build"));
    }
}
