//! Merge-on-read reconciliation. Pure: no I/O happens here.

use std::collections::HashMap;
use std::hash::Hash;

/// Merge a remote snapshot into a local collection.
///
/// - keys present in both: the remote value replaces the local one,
///   keeping the local position;
/// - keys only local: kept untouched;
/// - keys only remote: appended in remote order.
///
/// Duplicate keys inside `remote` collapse to the last occurrence.
pub fn merge_by_key<T, K, F>(local: Vec<T>, remote: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut remote_by_key: HashMap<K, T> = HashMap::with_capacity(remote.len());
    let mut remote_order: Vec<K> = Vec::with_capacity(remote.len());
    for item in remote {
        let k = key(&item);
        if remote_by_key.insert(key(&item), item).is_none() {
            remote_order.push(k);
        }
    }

    let mut merged = Vec::with_capacity(local.len() + remote_by_key.len());
    for item in local {
        match remote_by_key.remove(&key(&item)) {
            Some(newer) => merged.push(newer),
            None => merged.push(item),
        }
    }
    for k in remote_order {
        if let Some(item) = remote_by_key.remove(&k) {
            merged.push(item);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(k: &str, v: i32) -> (String, i32) {
        (k.to_string(), v)
    }

    fn merge(local: Vec<(String, i32)>, remote: Vec<(String, i32)>) -> Vec<(String, i32)> {
        merge_by_key(local, remote, |(k, _)| k.clone())
    }

    #[test]
    fn remote_wins_local_only_survives() {
        let local = vec![kv("a", 1), kv("b", 2), kv("c", 3)];
        let remote = vec![kv("b", 20), kv("d", 40)];
        assert_eq!(
            merge(local, remote),
            vec![kv("a", 1), kv("b", 20), kv("c", 3), kv("d", 40)]
        );
    }

    #[test]
    fn union_of_keys_with_remote_values() {
        let local = vec![kv("x", 1), kv("y", 2)];
        let remote = vec![kv("y", 9), kv("z", 3), kv("x", 7)];
        let merged = merge(local.clone(), remote.clone());

        assert_eq!(merged.len(), 3);
        for (k, v) in &merged {
            let expected = remote
                .iter()
                .find(|(rk, _)| rk == k)
                .or_else(|| local.iter().find(|(lk, _)| lk == k))
                .map(|(_, v)| *v);
            assert_eq!(Some(*v), expected, "key {k}");
        }
    }

    #[test]
    fn empty_sides() {
        assert_eq!(merge(vec![], vec![kv("a", 1)]), vec![kv("a", 1)]);
        assert_eq!(merge(vec![kv("a", 1)], vec![]), vec![kv("a", 1)]);
    }

    #[test]
    fn duplicate_remote_keys_keep_last() {
        let merged = merge(vec![], vec![kv("a", 1), kv("a", 2)]);
        assert_eq!(merged, vec![kv("a", 2)]);
    }
}
