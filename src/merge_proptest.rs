//! Property-based tests for fragment merging and path handling.
//!
//! These tests use proptest to generate random fragments and verify that
//! merge invariants hold regardless of processing order.

#[cfg(test)]
mod proptest_tests {
    use std::collections::BTreeMap;

    use crate::error::Error;
    use crate::fragments::Fragment;
    use crate::merge::{merge, MergePolicies};
    use crate::path::{format_path, parse_path};
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    fn mapping(entries: &[(String, Value)]) -> Value {
        let mut map = Mapping::new();
        for (key, value) in entries {
            map.insert(Value::String(key.clone()), value.clone());
        }
        Value::Mapping(map)
    }

    /// Two fragments with disjoint leaves, sharing the nested `shared` map.
    fn disjoint_fragments(entries: &BTreeMap<String, i64>) -> (Fragment, Fragment) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut left_shared = Vec::new();
        let mut right_shared = Vec::new();
        for (i, (key, value)) in entries.iter().enumerate() {
            let value = Value::Number((*value).into());
            match i % 4 {
                0 => left.push((key.clone(), value)),
                1 => right.push((key.clone(), value)),
                2 => left_shared.push((key.clone(), value)),
                _ => right_shared.push((key.clone(), value)),
            }
        }
        left.push(("shared".to_string(), mapping(&left_shared)));
        right.push(("shared".to_string(), mapping(&right_shared)));
        (
            Fragment::new("left.yaml", mapping(&left)),
            Fragment::new("right.yaml", mapping(&right)),
        )
    }

    // ============================================================================
    // merge property tests
    // ============================================================================

    proptest! {
        /// Property: merging fragments with disjoint keys is commutative
        #[test]
        fn merge_of_disjoint_fragments_is_commutative(
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            prop_assume!(!entries.contains_key("shared"));
            let (left, right) = disjoint_fragments(&entries);
            let policies = MergePolicies::default();

            let forward = merge(&[left.clone(), right.clone()], &policies).unwrap();
            let backward = merge(&[right, left], &policies).unwrap();
            prop_assert_eq!(
                forward.to_json_string().unwrap(),
                backward.to_json_string().unwrap()
            );
        }

        /// Property: conflicting scalars fail in either order
        #[test]
        fn conflicting_fragments_fail_in_either_order(
            key in "[a-z]{1,8}",
            a in any::<i64>(),
            b in any::<i64>(),
        ) {
            prop_assume!(a != b);
            let first = Fragment::new("a.yaml", mapping(&[(key.clone(), Value::Number(a.into()))]));
            let second = Fragment::new("b.yaml", mapping(&[(key, Value::Number(b.into()))]));
            let policies = MergePolicies::default();

            let forward = merge(&[first.clone(), second.clone()], &policies);
            let backward = merge(&[second, first], &policies);
            let is_duplicate = |result: &crate::error::Result<_>| {
                matches!(result, Err(Error::DuplicateConfigData { .. }))
            };
            prop_assert!(is_duplicate(&forward));
            prop_assert!(is_duplicate(&backward));
        }

        /// Property: merging a fragment with itself changes nothing
        #[test]
        fn merge_is_idempotent_for_scalars(
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..16)
        ) {
            let data = mapping(
                &entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::Number((*v).into())))
                    .collect::<Vec<_>>(),
            );
            let fragment = Fragment::new("a.yaml", data.clone());
            let merged = merge(&[fragment.clone(), fragment], &MergePolicies::default()).unwrap();
            prop_assert_eq!(merged.as_value(), &data);
        }
    }

    // ============================================================================
    // key path property tests
    // ============================================================================

    proptest! {
        /// Property: formatting a parsed dotted path reproduces it
        #[test]
        fn dotted_paths_survive_parse_and_format(
            keys in prop::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..5),
            index in prop::option::of(0usize..10),
        ) {
            let mut path = keys.join(".");
            if let Some(index) = index {
                path.push_str(&format!("[{}]", index));
            }
            prop_assert_eq!(format_path(&parse_path(&path)), path);
        }
    }
}
