use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use super::kpi;
use crate::models::Record;

/// Orders and revenue for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub orders: usize,
    pub cancelled_orders: usize,
    pub revenue: f64,
}

/// Time-indexed order/revenue series, ascending by date. Days without orders
/// are not emitted.
pub fn daily_series<'a>(records: impl IntoIterator<Item = &'a Record>) -> Vec<DailyPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<&'a Record>> = BTreeMap::new();
    for record in records {
        days.entry(record.order.placed_on()).or_default().push(record);
    }

    days.into_iter()
        .map(|(date, group)| DailyPoint {
            date,
            orders: group.len(),
            cancelled_orders: kpi::cancelled_orders(group.iter().copied()),
            revenue: kpi::total_revenue(group.iter().copied()).value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::by_hub;
    use crate::metrics::fixtures::order_on;
    use crate::models::OrderStatus;

    #[test]
    fn test_series_is_ascending_and_sparse() {
        let records = vec![
            order_on("3", "C", "H", OrderStatus::Delivered, Some(30.0), 9),
            order_on("1", "C", "H", OrderStatus::Delivered, Some(10.0), 2),
            order_on("2", "C", "H", OrderStatus::Cancelled, Some(99.0), 2),
        ];
        let series = daily_series(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2021, 1, 2).unwrap());
        assert_eq!(series[0].orders, 2);
        assert_eq!(series[0].cancelled_orders, 1);
        assert_eq!(series[0].revenue, 10.0);
        assert_eq!(series[1].revenue, 30.0);
    }

    #[test]
    fn test_series_per_hub() {
        let records = vec![
            order_on("1", "C", "NORTH", OrderStatus::Delivered, Some(10.0), 2),
            order_on("2", "C", "SOUTH", OrderStatus::Delivered, Some(20.0), 3),
            order_on("3", "C", "SOUTH", OrderStatus::Delivered, Some(20.0), 4),
        ];
        let per_hub = by_hub(&records, |g| daily_series(g.iter().copied()));
        assert_eq!(per_hub.get(&"SOUTH".to_string()).map(Vec::len), Some(2));
        assert_eq!(per_hub.get(&"NORTH".to_string()).map(Vec::len), Some(1));
    }
}
