//! Deep merge of override sources
//!
//! Later sources take precedence over earlier ones. Mappings merge
//! recursively, sequences and scalars are replaced. See [`Value::merge`].

use crate::value::Value;

/// Merge `sources` left-to-right on top of an empty mapping
pub fn merge<I>(sources: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    sources
        .into_iter()
        .fold(Value::empty_mapping(), Value::merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn yaml(s: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(s).unwrap())
    }

    #[test]
    fn test_merge_no_sources() {
        assert_eq!(merge(Vec::new()), Value::empty_mapping());
    }

    #[test]
    fn test_merge_last_source_wins() {
        let result = merge(vec![yaml("x: a\ny: 1"), yaml("x: b"), yaml("x: c\nz: true")]);

        assert_eq!(result, yaml("x: c\ny: 1\nz: true"));
    }

    #[test]
    fn test_merge_keeps_every_key() {
        let result = merge(vec![
            yaml("a: {b: 1, c: {d: 2}}"),
            yaml("a: {c: {e: 3}}"),
            yaml("f: [1, 2]"),
            yaml("f: [3]"),
        ]);

        assert_eq!(result, yaml("a: {b: 1, c: {d: 2, e: 3}}\nf: [3]"));
    }
}
