//! Key-wise merging of labels and taints.
//!
//! Both merges keep the order of the global list, replace colliding
//! entries in place with the group's version, and append group-only
//! entries in the order they were given.

use crate::cloud_config::Taint;

fn label_key(label: &str) -> &str {
    label.split_once('=').map_or(label, |(k, _)| k)
}

/// Merge `k=v` label lists. The group wins on key collisions.
pub fn merge_labels(global: &[String], group: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = global.to_vec();
    for label in group {
        let key = label_key(label);
        match merged.iter_mut().find(|l| label_key(l) == key) {
            Some(existing) => *existing = label.clone(),
            None => merged.push(label.clone()),
        }
    }
    merged
}

/// Merge taints by key. The group's value and effect both win.
pub fn merge_taints(global: &[Taint], group: &[Taint]) -> Vec<Taint> {
    let mut merged: Vec<Taint> = global.to_vec();
    for taint in group {
        match merged.iter_mut().find(|t| t.key == taint.key) {
            Some(existing) => *existing = taint.clone(),
            None => merged.push(taint.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_config::TaintEffect;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labels_empty_inputs() {
        assert!(merge_labels(&[], &[]).is_empty());
        assert_eq!(merge_labels(&strings(&["a=1"]), &[]), strings(&["a=1"]));
        assert_eq!(merge_labels(&[], &strings(&["b=2"])), strings(&["b=2"]));
    }

    #[test]
    fn labels_without_value_merge_by_whole_string() {
        let merged = merge_labels(&strings(&["gpu", "env=prod"]), &strings(&["gpu", "zone=a"]));
        assert_eq!(merged, strings(&["gpu", "env=prod", "zone=a"]));
    }

    #[test]
    fn labels_value_may_contain_equals() {
        let merged = merge_labels(&strings(&["k=a=b"]), &strings(&["k=c"]));
        assert_eq!(merged, strings(&["k=c"]));
    }

    #[test]
    fn taints_keep_global_order() {
        let t = |k: &str, v: &str| Taint {
            key: k.to_string(),
            value: v.to_string(),
            effect: TaintEffect::NoSchedule,
        };
        let merged = merge_taints(&[t("a", "1"), t("b", "2")], &[t("c", "3"), t("a", "9")]);
        let keys: Vec<_> = merged.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(merged[0].value, "9");
    }
}
