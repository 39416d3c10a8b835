//! Dataset partitioning and recombination of per-partition statistics.
//!
//! Recombination is count-weighted: a partition's mean contributes in
//! proportion to its `valid_count`. Medians cannot be recombined from
//! partition summaries and are left out of recombined output.

use crate::aggregation::{AggregationEngine, AggregationSpec, CategoryOrder, statistics};
use crate::dataset::{Record, Schema, Tabular};
use crate::error::{AggregationError, Result, Stage};
use crate::types::{GroupAggregate, GroupKey, StatValue};
use crate::utils::percent_of;
use std::collections::HashMap;
use tracing::{debug, info};

/// A contiguous borrowed run of a dataset's records.
#[derive(Debug, Clone, Copy)]
pub struct Partition<'a> {
    schema: &'a Schema,
    records: &'a [Record],
    /// Position of the first record in the source dataset.
    pub offset: usize,
}

impl Tabular for Partition<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn records(&self) -> &[Record] {
        self.records
    }
}

/// Split `data` into `k` contiguous shards covering every record once.
///
/// Sizes differ by at most one; the first `len % k` shards take the extra
/// record. More shards than records yields trailing empty shards.
pub fn partition<T: Tabular + ?Sized>(data: &T, k: usize) -> Result<Vec<Partition<'_>>> {
    if k == 0 {
        return Err(AggregationError::invalid_config(
            Stage::Partition,
            "partition count must be at least 1",
        ));
    }

    let records = data.records();
    let base = records.len() / k;
    let extra = records.len() % k;

    let mut parts = Vec::with_capacity(k);
    let mut offset = 0;
    for i in 0..k {
        let size = base + usize::from(i < extra);
        parts.push(Partition {
            schema: data.schema(),
            records: &records[offset..offset + size],
            offset,
        });
        offset += size;
    }
    debug!("Partitioned {} records into {} shards", records.len(), k);
    Ok(parts)
}

/// Merges statistics computed over disjoint partitions.
pub struct Recombiner;

impl Recombiner {
    /// Merge one group's per-partition aggregates.
    ///
    /// Counts and valid counts sum; the mean is weighted by each part's
    /// `valid_count`; the missing rate is recomputed from the summed counts.
    /// Percent and median are not carried over. Every part must carry the
    /// same key and a `valid_count` no larger than its `count`.
    pub fn recombine(parts: &[GroupAggregate]) -> Result<GroupAggregate> {
        let first = parts.first().ok_or_else(|| AggregationError::EmptyGroup {
            stage: Stage::Recombination,
            what: "partition aggregates".to_string(),
        })?;
        check_parts(first, parts)?;

        let count: usize = parts.iter().map(|p| p.count).sum();
        let valid_count: usize = parts.iter().map(|p| p.valid_count).sum();

        let mut merged = GroupAggregate::counted(first.key.clone(), count);
        merged.valid_count = valid_count;

        if parts.iter().any(|p| p.mean.is_some()) {
            let weighted = statistics::weighted_mean(
                parts
                    .iter()
                    .map(|p| (p.mean.and_then(|m| m.value()), p.valid_count)),
            );
            merged.mean = Some(StatValue::from_option(weighted));
        }
        if parts.iter().any(|p| p.missing_rate.is_some()) {
            merged.missing_rate = Some(StatValue::from_option(percent_of(
                count - valid_count,
                count,
            )));
        }
        Ok(merged)
    }

    /// Merge complete per-partition aggregate sets group by group.
    ///
    /// Groups keep first-occurrence order across partitions unless
    /// `ordering` is given. Percent is recomputed against the grand total
    /// when any partition reported it.
    pub fn recombine_all(
        per_partition: &[Vec<GroupAggregate>],
        group_by: &[String],
        ordering: Option<&CategoryOrder>,
    ) -> Result<Vec<GroupAggregate>> {
        let mut index: HashMap<&GroupKey, usize> = HashMap::new();
        let mut buckets: Vec<Vec<GroupAggregate>> = Vec::new();
        for agg in per_partition.iter().flatten() {
            let slot = *index.entry(&agg.key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(agg.clone());
        }

        let wants_percent = per_partition.iter().flatten().any(|a| a.percent.is_some());
        let mut merged: Vec<GroupAggregate> = buckets
            .iter()
            .map(|parts| Self::recombine(parts))
            .collect::<Result<_>>()?;

        if wants_percent {
            let total: usize = merged.iter().map(|g| g.count).sum();
            for group in &mut merged {
                group.percent = Some(StatValue::from_option(percent_of(group.count, total)));
            }
        }

        if let Some(order) = ordering
            && let Some(pos) = group_by.iter().position(|f| *f == order.field)
        {
            order.apply(&mut merged, pos);
        }
        Ok(merged)
    }
}

fn check_parts(first: &GroupAggregate, parts: &[GroupAggregate]) -> Result<()> {
    if let Some(other) = parts.iter().find(|p| p.key != first.key) {
        return Err(AggregationError::invalid_config(
            Stage::Recombination,
            format!("cannot merge group {} into group {}", other.key, first.key),
        ));
    }
    if let Some(bad) = parts.iter().find(|p| p.valid_count > p.count) {
        return Err(AggregationError::invalid_config(
            Stage::Recombination,
            format!(
                "group {} has valid_count {} above its count {}",
                bad.key, bad.valid_count, bad.count
            ),
        ));
    }
    Ok(())
}

/// Result of a partitioned aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedResult {
    /// Aggregates of each partition, in partition order.
    pub per_partition: Vec<Vec<GroupAggregate>>,
    /// The recombined aggregates over the whole dataset.
    pub combined: Vec<GroupAggregate>,
}

/// Aggregates each partition on its own worker and recombines the results.
pub struct PartitionedAggregation;

impl PartitionedAggregation {
    /// Split `data` into `k` shards, aggregate each on a scoped thread, and
    /// recombine once every worker has finished.
    ///
    /// A panicking worker surfaces as [`AggregationError::Internal`] only
    /// when built with `panic = "unwind"`, as the test harness is. The
    /// workspace dev and release profiles abort instead.
    pub fn run<T: Tabular + Sync + ?Sized>(
        data: &T,
        spec: &AggregationSpec,
        k: usize,
    ) -> Result<PartitionedResult> {
        let parts = partition(data, k)?;
        info!("Aggregating {} records across {} partitions...", data.len(), k);

        let outcomes: Vec<std::thread::Result<Result<Vec<GroupAggregate>>>> =
            std::thread::scope(|scope| {
                let handles: Vec<_> = parts
                    .iter()
                    .map(|part| scope.spawn(move || AggregationEngine::aggregate(part, spec)))
                    .collect();
                handles.into_iter().map(|h| h.join()).collect()
            });

        let mut per_partition = Vec::with_capacity(k);
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let aggregates = outcome.map_err(|_| {
                AggregationError::Internal(format!("partition worker {} panicked", i))
            })??;
            per_partition.push(aggregates);
        }

        let combined =
            Recombiner::recombine_all(&per_partition, &spec.group_by, spec.ordering.as_ref())?;
        Ok(PartitionedResult {
            per_partition,
            combined,
        })
    }
}
