//! Ordering and retention over launch resource versions. Pure; no I/O.

use models::LaunchVersion;

use std::cmp::Ordering;

/// Compares two versions by creation time, ascending. A version with an
/// unknown creation time sorts as if it were the newest possible value, on
/// both sides of the comparison: a version whose age cannot be proven must
/// never become a retention-deletion candidate ahead of dated versions.
pub fn creation_order(a: &LaunchVersion, b: &LaunchVersion) -> Ordering {
    match (a.created, b.created) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Returns the given versions sorted oldest to newest under
/// [`creation_order`].
pub fn sorted_by_creation(mut versions: Vec<LaunchVersion>) -> Vec<LaunchVersion> {
    versions.sort_by(creation_order);
    versions
}

/// Returns the version numbers eligible for retention deletion: everything
/// strictly older than the `retain` newest entries. Field content plays no
/// part in this decision.
pub fn retention_candidates(versions: &[LaunchVersion], retain: usize) -> Vec<i64> {
    if versions.len() <= retain {
        return Vec::new();
    }
    let sorted = sorted_by_creation(versions.to_vec());
    let deletable = sorted.len() - retain;
    sorted[..deletable]
        .iter()
        .map(|version| version.version_number)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use models::LaunchVersion;

    fn dated_version(number: i64, minutes_ago: i64) -> LaunchVersion {
        let base = Utc.with_ymd_and_hms(2023, 4, 12, 9, 0, 0).unwrap();
        LaunchVersion {
            version_number: number,
            created: Some(base - Duration::minutes(minutes_ago)),
            ..Default::default()
        }
    }

    fn undated_version(number: i64) -> LaunchVersion {
        LaunchVersion {
            version_number: number,
            created: None,
            ..Default::default()
        }
    }

    #[test]
    fn orders_dated_versions_ascending() {
        let sorted = sorted_by_creation(vec![
            dated_version(3, 1),
            dated_version(1, 5),
            dated_version(2, 3),
        ]);
        let numbers: Vec<i64> = sorted.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_creation_time_sorts_newest() {
        let sorted = sorted_by_creation(vec![
            undated_version(9),
            dated_version(1, 5),
            dated_version(2, 3),
        ]);
        let numbers: Vec<i64> = sorted.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 9]);
    }

    #[test]
    fn retention_deletes_the_oldest_entries() {
        // Four versions with distinct creation times minutes apart; retaining
        // two must select exactly the two oldest for deletion.
        let versions = vec![
            dated_version(4, 0),
            dated_version(3, 1),
            dated_version(2, 3),
            dated_version(1, 5),
        ];
        assert_eq!(retention_candidates(&versions, 2), vec![1, 2]);
    }

    #[test]
    fn retention_is_a_noop_for_small_sets() {
        let versions = vec![dated_version(1, 5), dated_version(2, 3)];
        assert!(retention_candidates(&versions, 2).is_empty());
        assert!(retention_candidates(&versions, 10).is_empty());
    }

    #[test]
    fn undated_versions_are_retained_ahead_of_dated_ones() {
        let versions = vec![
            undated_version(7),
            dated_version(1, 5),
            dated_version(2, 3),
        ];
        // The undated version counts as newest, so only the oldest dated
        // version is deletable.
        assert_eq!(retention_candidates(&versions, 2), vec![1]);
    }
}
