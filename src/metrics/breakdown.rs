use serde::Serialize;
use std::collections::BTreeMap;

use super::{DataQualityWarning, Measured};
use crate::models::Record;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry<K, T> {
    pub key: K,
    pub orders: usize,
    pub value: T,
    /// Rows of this group left out of `value`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DataQualityWarning>,
}

/// Group key → KPI value, ordered by descending order count, then key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Breakdown<K, T> {
    pub entries: Vec<GroupEntry<K, T>>,
}

impl<K: PartialEq, T> Breakdown<K, T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.iter().find(|e| &e.key == key).map(|e| &e.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|e| &e.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupEntry<K, T>> {
        self.entries.iter()
    }
}

/// Apply `kpi` to each subset of `records` sharing the same `key_of` value.
pub fn breakdown<'a, K, T>(
    records: impl IntoIterator<Item = &'a Record>,
    key_of: impl Fn(&'a Record) -> K,
    kpi: impl Fn(&[&'a Record]) -> T,
) -> Breakdown<K, T>
where
    K: Ord,
{
    measured_breakdown(records, key_of, |group| Measured::new(kpi(group)))
}

/// Like [`breakdown`], keeping each group's data quality warnings on its entry.
pub fn measured_breakdown<'a, K, T>(
    records: impl IntoIterator<Item = &'a Record>,
    key_of: impl Fn(&'a Record) -> K,
    kpi: impl Fn(&[&'a Record]) -> Measured<T>,
) -> Breakdown<K, T>
where
    K: Ord,
{
    let mut groups: BTreeMap<K, Vec<&'a Record>> = BTreeMap::new();
    for record in records {
        groups.entry(key_of(record)).or_default().push(record);
    }

    // groups iterate in key order, and the stable sort keeps it for equal counts
    let mut entries: Vec<GroupEntry<K, T>> = groups
        .into_iter()
        .map(|(key, members)| {
            let (value, warnings) = kpi(&members).into_parts();
            GroupEntry {
                orders: members.len(),
                value,
                warnings,
                key,
            }
        })
        .collect();
    entries.sort_by(|a, b| b.orders.cmp(&a.orders));

    Breakdown { entries }
}

pub fn by_city<'a, T>(
    records: impl IntoIterator<Item = &'a Record>,
    kpi: impl Fn(&[&'a Record]) -> T,
) -> Breakdown<String, T> {
    breakdown(records, |r| r.city().to_string(), kpi)
}

pub fn by_hub<'a, T>(
    records: impl IntoIterator<Item = &'a Record>,
    kpi: impl Fn(&[&'a Record]) -> T,
) -> Breakdown<String, T> {
    breakdown(records, |r| r.hub().to_string(), kpi)
}

pub fn by_city_hub<'a, T>(
    records: impl IntoIterator<Item = &'a Record>,
    kpi: impl Fn(&[&'a Record]) -> T,
) -> Breakdown<(String, String), T> {
    breakdown(records, |r| (r.city().to_string(), r.hub().to_string()), kpi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::drivers::driver_performance;
    use crate::metrics::fixtures::{delivered, order};
    use crate::metrics::kpi;
    use crate::models::{DeliveryOutcome, OrderStatus};

    fn sample() -> Vec<Record> {
        vec![
            order("1", "SÃO PAULO", "AVENIDA", OrderStatus::Delivered, Some(10.0)),
            order("2", "SÃO PAULO", "AVENIDA", OrderStatus::Cancelled, Some(10.0)),
            order("3", "SÃO PAULO", "FUNK", OrderStatus::Delivered, Some(10.0)),
            order("4", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(10.0)),
            order("5", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(10.0)),
            order("6", "RIO DE JANEIRO", "COPA", OrderStatus::Placed, Some(10.0)),
            order("7", "PORTO ALEGRE", "BLACK", OrderStatus::Delivered, None),
        ]
    }

    #[test]
    fn test_groups_sorted_by_count_then_key() {
        let records = sample();
        let cities = by_city(&records, |g| kpi::total_orders(g.iter().copied()));
        let keys: Vec<&str> = cities.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["SÃO PAULO", "CURITIBA", "PORTO ALEGRE", "RIO DE JANEIRO"]);
        assert_eq!(cities.get(&"SÃO PAULO".to_string()), Some(&3));
    }

    #[test]
    fn test_city_totals_sum_to_overall() {
        let records = sample();
        let cities = by_city(&records, |g| kpi::total_orders(g.iter().copied()));
        let sum: usize = cities.iter().map(|e| e.value).sum();
        assert_eq!(sum, kpi::total_orders(&records));
    }

    #[test]
    fn test_hub_breakdown_of_rates() {
        let records = sample();
        let hubs = by_hub(&records, |g| kpi::cancellation_rate(g.iter().copied()));
        assert_eq!(hubs.get(&"AVENIDA".to_string()), Some(&0.5));
        assert_eq!(hubs.get(&"GOLDEN".to_string()), Some(&0.0));
        assert!(hubs.iter().all(|e| (0.0..=1.0).contains(&e.value)));
    }

    #[test]
    fn test_city_hub_keys() {
        let records = sample();
        let pairs = by_city_hub(&records, |g| g.len());
        assert_eq!(pairs.len(), 5);
        assert_eq!(
            pairs.entries[0].key,
            ("SÃO PAULO".to_string(), "AVENIDA".to_string())
        );
    }

    #[test]
    fn test_breakdown_of_driver_tables() {
        let records = vec![
            delivered(
                order("1", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(1.0)),
                Some("d1"),
                Some(100.0),
                Some(10.0),
                DeliveryOutcome::Success,
            ),
            delivered(
                order("2", "RIO DE JANEIRO", "COPA", OrderStatus::Failed, Some(1.0)),
                Some("d2"),
                Some(100.0),
                Some(10.0),
                DeliveryOutcome::Failure,
            ),
        ];
        let per_city = by_city(&records, |g| driver_performance(g.iter().copied()).value);
        let rio = per_city.get(&"RIO DE JANEIRO".to_string()).unwrap();
        assert_eq!(rio.len(), 1);
        assert_eq!(rio[0].failure_rate, 1.0);
    }

    #[test]
    fn test_empty_records_give_empty_breakdown() {
        let records: Vec<Record> = Vec::new();
        let cities = by_city(&records, |g| kpi::total_orders(g.iter().copied()));
        assert!(cities.is_empty());
    }
}
