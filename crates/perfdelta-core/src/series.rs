//! Grouping of flat report records into per-test series.

use std::collections::BTreeMap;

use crate::domain::{ReportRecord, TestSeries};

/// Partition records by test name.
///
/// Records keep the relative order in which they were supplied, which must
/// already be newest-commit-first. Nothing is dropped or deduplicated, so
/// repeated invocations at one commit all land in the series. The map is
/// sorted by test name only to make rendered output stable.
pub fn group_by_test_name<I>(records: I) -> BTreeMap<String, TestSeries>
where
    I: IntoIterator<Item = ReportRecord>,
{
    let mut grouped: BTreeMap<String, TestSeries> = BTreeMap::new();
    for record in records {
        match grouped.get_mut(record.test_name()) {
            Some(series) => series
                .push(record)
                .expect("record keyed by its own test name"),
            None => {
                grouped.insert(record.test_name().to_string(), TestSeries::single(record));
            }
        }
    }
    grouped
}

/// Concatenate series back into a flat record list.
pub fn flatten<I>(series: I) -> Vec<ReportRecord>
where
    I: IntoIterator<Item = TestSeries>,
{
    series.into_iter().flat_map(TestSeries::into_records).collect()
}
