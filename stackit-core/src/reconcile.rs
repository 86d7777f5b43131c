//! Reconcile - Keep user-ordered lists stable against unordered API results

use std::collections::HashSet;

/// Reconcile a locally ordered list against the remote content.
///
/// The local list is the source of truth for ordering and the remote list for
/// content: elements of `local` missing from `remote` are dropped, the rest keep
/// their relative order, and elements of `remote` not yet present are appended
/// in remote order.
pub fn reconcile_string_lists(local: &[String], remote: &[String]) -> Vec<String> {
    let in_remote: HashSet<&str> = remote.iter().map(String::as_str).collect();

    let mut result: Vec<String> = local
        .iter()
        .filter(|e| in_remote.contains(e.as_str()))
        .cloned()
        .collect();

    let mut in_result: HashSet<String> = result.iter().cloned().collect();
    for elem in remote {
        if in_result.insert(elem.clone()) {
            result.push(elem.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_order_drops_and_appends() {
        let result = reconcile_string_lists(&strings(&["a", "b", "c"]), &strings(&["d", "c", "b"]));
        assert_eq!(result, strings(&["b", "c", "d"]));
    }

    #[test]
    fn remote_order_does_not_matter_for_retained() {
        let local = strings(&["z", "y", "x"]);
        let result = reconcile_string_lists(&local, &strings(&["x", "y", "z"]));
        assert_eq!(result, local);
    }

    #[test]
    fn empty_local_takes_remote_order() {
        let result = reconcile_string_lists(&[], &strings(&["b", "a"]));
        assert_eq!(result, strings(&["b", "a"]));
    }

    #[test]
    fn empty_remote_clears() {
        let result = reconcile_string_lists(&strings(&["a"]), &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn duplicates_in_remote_are_appended_once() {
        let result = reconcile_string_lists(&strings(&["a"]), &strings(&["a", "b", "b"]));
        assert_eq!(result, strings(&["a", "b"]));
    }
}
