use std::collections::HashMap;

use crate::model::attendance::CanonicalRecord;

/// Stamps each record with its employee's running total, in input order.
///
/// This is a left fold: the input must already be sorted by
/// [`sort_for_aggregation`](super::normalizer::sort_for_aggregation), any other
/// order yields different running totals.
pub fn annotate(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut totals: HashMap<String, u64> = HashMap::new();

    records
        .into_iter()
        .map(|mut rec| {
            let total = totals.entry(rec.employee_name.clone()).or_insert(0);
            *total += rec.worked.seconds();
            rec.cumulative = *total;
            rec
        })
        .collect()
}
