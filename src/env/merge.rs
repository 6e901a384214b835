//! Recursive YAML mapping merge

use serde_yaml::{Mapping, Value};

/// Merge `src` into `dst` in place
///
/// Keys whose values are mappings on both sides are merged recursively;
/// every other value from `src` replaces the one in `dst`.
pub fn yaml_merge(dst: &mut Mapping, src: &Mapping) {
    for (key, value) in src {
        if let (Some(Value::Mapping(dst_inner)), Value::Mapping(src_inner)) =
            (dst.get_mut(key), value)
        {
            yaml_merge(dst_inner, src_inner);
            continue;
        }
        dst.insert(key.clone(), value.clone());
    }
}
