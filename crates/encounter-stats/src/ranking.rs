//! Top-N extraction over group aggregates.

use crate::aggregation::Stat;
use crate::error::{AggregationError, Result, Stage};
use crate::types::{GroupAggregate, RankedEntry, StatValue};
use crate::utils::percent_of;
use std::cmp::Ordering;
use tracing::debug;

/// Ranks group aggregates by one statistic.
pub struct TopNRanker;

impl TopNRanker {
    /// The `n` highest groups by `by`, descending.
    ///
    /// Ties are broken by group key ascending and `NoData` values rank after
    /// every numeric one, so the output does not depend on input order.
    /// `percent_of_total` is each group's count over the counts of all input
    /// aggregates, not just the returned ones.
    pub fn top_n(aggregates: &[GroupAggregate], n: usize, by: Stat) -> Result<Vec<RankedEntry>> {
        let mut scored: Vec<(StatValue, &GroupAggregate)> = aggregates
            .iter()
            .map(|agg| score(agg, by).map(|s| (s, agg)))
            .collect::<Result<_>>()?;

        scored.sort_by(|(a, ga), (b, gb)| compare_scores(a, b).then_with(|| ga.key.cmp(&gb.key)));

        let total: usize = aggregates.iter().map(|a| a.count).sum();
        let ranked: Vec<RankedEntry> = scored
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, (_, agg))| RankedEntry {
                rank: i + 1,
                percent_of_total: StatValue::from_option(percent_of(agg.count, total)),
                aggregate: agg.clone(),
            })
            .collect();

        debug!("Ranked {} of {} groups by {:?}", ranked.len(), aggregates.len(), by);
        Ok(ranked)
    }
}

fn score(agg: &GroupAggregate, by: Stat) -> Result<StatValue> {
    let stat = match by {
        Stat::Count => return Ok(StatValue::Value(agg.count as f64)),
        Stat::Percent => agg.percent,
        Stat::Mean => agg.mean,
        Stat::Median => agg.median,
        Stat::MissingRate => agg.missing_rate,
    };
    stat.ok_or_else(|| {
        AggregationError::invalid_config(
            Stage::Ranking,
            format!("cannot rank by {:?}: it was not computed", by),
        )
    })
}

/// Descending by value, `NoData` last.
fn compare_scores(a: &StatValue, b: &StatValue) -> Ordering {
    match (a, b) {
        (StatValue::Value(x), StatValue::Value(y)) => y.total_cmp(x),
        (StatValue::Value(_), StatValue::NoData) => Ordering::Less,
        (StatValue::NoData, StatValue::Value(_)) => Ordering::Greater,
        (StatValue::NoData, StatValue::NoData) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;
    use crate::types::GroupKey;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn diagnosis(code: &str, version: f64, count: usize) -> GroupAggregate {
        GroupAggregate::counted(
            GroupKey::new(vec![Value::text(code), Value::number(version)]),
            count,
        )
    }

    fn sample() -> Vec<GroupAggregate> {
        vec![
            diagnosis("4280", 9.0, 5),
            diagnosis("4019", 9.0, 8),
            diagnosis("I10", 10.0, 5),
            diagnosis("E785", 10.0, 2),
        ]
    }

    fn keys(entries: &[RankedEntry]) -> Vec<String> {
        entries.iter().map(|e| e.aggregate.key.to_string()).collect()
    }

    #[test]
    fn test_top_n_orders_by_count_with_key_tie_break() {
        let ranked = TopNRanker::top_n(&sample(), 3, Stat::Count).unwrap();
        assert_eq!(keys(&ranked), vec!["(4019, 9)", "(4280, 9)", "(I10, 10)"]);
        assert_eq!(
            ranked.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_percent_uses_total_of_all_groups() {
        let ranked = TopNRanker::top_n(&sample(), 1, Stat::Count).unwrap();
        // 8 of 20 diagnoses
        assert_eq!(ranked[0].percent_of_total, StatValue::Value(40.0));
    }

    #[test]
    fn test_n_larger_than_groups() {
        let ranked = TopNRanker::top_n(&sample(), 10, Stat::Count).unwrap();
        assert_eq!(ranked.len(), 4);
        assert!(TopNRanker::top_n(&[], 10, Stat::Count).unwrap().is_empty());
    }

    #[test]
    fn test_no_data_ranks_last() {
        let mut aggs = sample();
        aggs[0].mean = Some(StatValue::NoData);
        aggs[1].mean = Some(StatValue::Value(1.0));
        aggs[2].mean = Some(StatValue::Value(7.5));
        aggs[3].mean = Some(StatValue::NoData);

        let ranked = TopNRanker::top_n(&aggs, 4, Stat::Mean).unwrap();
        assert_eq!(
            keys(&ranked),
            vec!["(I10, 10)", "(4019, 9)", "(4280, 9)", "(E785, 10)"]
        );
    }

    #[test]
    fn test_rank_by_uncomputed_stat_is_config_error() {
        let err = TopNRanker::top_n(&sample(), 3, Stat::Median).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_shuffled_input_gives_same_ranking() {
        let expected = TopNRanker::top_n(&sample(), 4, Stat::Count).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut shuffled = sample();
            shuffled.shuffle(&mut rng);
            let ranked = TopNRanker::top_n(&shuffled, 4, Stat::Count).unwrap();
            assert_eq!(ranked, expected);
        }
    }
}
