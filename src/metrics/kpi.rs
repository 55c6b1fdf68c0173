use serde::Serialize;

use super::{mean, ratio, Field, Kpi, Measured};
use crate::models::{OrderStatus, Record};

pub fn total_orders<'a>(records: impl IntoIterator<Item = &'a Record>) -> usize {
    records.into_iter().count()
}

pub fn cancelled_orders<'a>(records: impl IntoIterator<Item = &'a Record>) -> usize {
    records.into_iter().filter(|r| r.order.is_cancelled()).count()
}

/// Cancelled orders over all orders, `0.0` for an empty set.
pub fn cancellation_rate<'a>(records: impl IntoIterator<Item = &'a Record>) -> f64 {
    let (total, cancelled) = records.into_iter().fold((0, 0), |(total, cancelled), r| {
        (total + 1, cancelled + usize::from(r.order.is_cancelled()))
    });
    ratio(cancelled, total)
}

struct RevenueTally {
    total: f64,
    contributing: usize,
    missing_amount: usize,
}

// Sums in ascending order-id order so the result does not depend on fetch order.
fn tally_revenue<'a>(records: impl IntoIterator<Item = &'a Record>) -> RevenueTally {
    let mut amounts: Vec<(&str, f64)> = Vec::new();
    let mut missing_amount = 0;

    for record in records {
        if record.order.is_cancelled() {
            continue;
        }
        match record.order.amount {
            Some(amount) => amounts.push((record.order.order_id.as_str(), amount)),
            None => missing_amount += 1,
        }
    }

    amounts.sort_by(|a, b| a.0.cmp(b.0).then(a.1.total_cmp(&b.1)));

    RevenueTally {
        total: amounts.iter().map(|(_, amount)| amount).sum(),
        contributing: amounts.len(),
        missing_amount,
    }
}

/// Sum of amounts over non-cancelled orders.
pub fn total_revenue<'a>(records: impl IntoIterator<Item = &'a Record>) -> Measured<f64> {
    let tally = tally_revenue(records);
    Measured::new(tally.total).warn_if(Kpi::TotalRevenue, Field::Amount, tally.missing_amount)
}

/// Total revenue over the non-cancelled orders that carried an amount.
pub fn average_order_value<'a>(records: impl IntoIterator<Item = &'a Record>) -> Measured<f64> {
    let tally = tally_revenue(records);
    let value = if tally.contributing == 0 {
        0.0
    } else {
        tally.total / tally.contributing as f64
    };
    Measured::new(value).warn_if(Kpi::AverageOrderValue, Field::Amount, tally.missing_amount)
}

/// Mean duration in minutes over successful deliveries; `None` means no data.
pub fn average_delivery_time<'a>(
    records: impl IntoIterator<Item = &'a Record>,
) -> Measured<Option<f64>> {
    let mut durations = Vec::new();
    let mut missing = 0;

    for delivery in records.into_iter().filter_map(|r| r.delivery.as_ref()) {
        if !delivery.is_success() {
            continue;
        }
        match delivery.duration_minutes {
            Some(minutes) => durations.push(minutes),
            None => missing += 1,
        }
    }

    Measured::new(mean(&durations)).warn_if(Kpi::AverageDeliveryTime, Field::Duration, missing)
}

/// Failed deliveries over all deliveries, regardless of driver.
pub fn driver_failure_rate<'a>(records: impl IntoIterator<Item = &'a Record>) -> f64 {
    let (total, failed) = records
        .into_iter()
        .filter_map(|r| r.delivery.as_ref())
        .fold((0, 0), |(total, failed), d| (total + 1, failed + usize::from(!d.is_success())));
    ratio(failed, total)
}

/// Scalar KPIs for one set of records (the whole set or a single group).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total_orders: usize,
    pub cancelled_orders: usize,
    pub cancellation_rate: f64,
    pub delivered_orders: usize,
    pub total_revenue: f64,
    /// Non-cancelled orders with an amount: the denominator of `average_order_value`.
    pub revenue_orders: usize,
    pub average_order_value: f64,
    pub deliveries: usize,
    pub failed_deliveries: usize,
    pub driver_failure_rate: f64,
    pub average_delivery_minutes: Option<f64>,
}

impl KpiSummary {
    pub fn compute<'a>(records: impl IntoIterator<Item = &'a Record>) -> Measured<Self> {
        let records: Vec<&Record> = records.into_iter().collect();
        let all = || records.iter().copied();

        let (total_revenue, mut warnings) = total_revenue(all()).into_parts();
        let (average_order_value, aov_warnings) = average_order_value(all()).into_parts();
        let (average_delivery_minutes, time_warnings) = average_delivery_time(all()).into_parts();
        warnings.extend(aov_warnings);
        warnings.extend(time_warnings);

        let deliveries = all().filter(|r| r.delivery.is_some()).count();
        let failed_deliveries = all()
            .filter_map(|r| r.delivery.as_ref())
            .filter(|d| !d.is_success())
            .count();

        Measured {
            value: KpiSummary {
                total_orders: total_orders(all()),
                cancelled_orders: cancelled_orders(all()),
                cancellation_rate: cancellation_rate(all()),
                delivered_orders: all()
                    .filter(|r| r.order.status == OrderStatus::Delivered)
                    .count(),
                total_revenue,
                revenue_orders: tally_revenue(all()).contributing,
                average_order_value,
                deliveries,
                failed_deliveries,
                driver_failure_rate: ratio(failed_deliveries, deliveries),
                average_delivery_minutes,
            },
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::{delivered, order};
    use crate::models::DeliveryOutcome;

    fn three_orders() -> Vec<Record> {
        vec![
            order("1", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(100.0)),
            order("2", "CURITIBA", "GOLDEN", OrderStatus::Delivered, Some(200.0)),
            order("3", "CURITIBA", "GOLDEN", OrderStatus::Cancelled, Some(0.0)),
        ]
    }

    #[test]
    fn test_three_order_scenario() {
        let records = three_orders();
        assert_eq!(total_orders(&records), 3);
        assert!((cancellation_rate(&records) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(total_revenue(&records).value, 300.0);
        assert_eq!(average_order_value(&records).value, 150.0);
    }

    #[test]
    fn test_summary_revenue_orders_exclude_cancelled() {
        let summary = KpiSummary::compute(&three_orders()).value;
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.revenue_orders, 2);
        assert_eq!(summary.total_revenue, summary.average_order_value * summary.revenue_orders as f64);
    }

    #[test]
    fn test_empty_input_defaults() {
        let records: Vec<Record> = Vec::new();
        assert_eq!(total_orders(&records), 0);
        assert_eq!(cancellation_rate(&records), 0.0);
        assert_eq!(driver_failure_rate(&records), 0.0);
        assert_eq!(total_revenue(&records).value, 0.0);
        assert_eq!(average_order_value(&records).value, 0.0);
        assert_eq!(average_delivery_time(&records).value, None);

        let summary = KpiSummary::compute(&records);
        assert!(summary.warnings.is_empty());
        assert!(!summary.value.cancellation_rate.is_nan());
    }

    #[test]
    fn test_cancelled_amount_never_counts() {
        let records = vec![
            order("1", "C", "H", OrderStatus::Cancelled, Some(999.0)),
            order("2", "C", "H", OrderStatus::Cancelled, None),
        ];
        assert_eq!(total_revenue(&records).value, 0.0);
        assert_eq!(average_order_value(&records).value, 0.0);
        // a cancelled order with no amount is not a warning: it never contributes
        assert!(total_revenue(&records).warnings.is_empty());
    }

    #[test]
    fn test_missing_amount_is_excluded_and_reported() {
        let records = vec![
            order("1", "C", "H", OrderStatus::Delivered, Some(40.0)),
            order("2", "C", "H", OrderStatus::Delivered, None),
            order("3", "C", "H", OrderStatus::Placed, Some(20.0)),
        ];
        let revenue = total_revenue(&records);
        assert_eq!(revenue.value, 60.0);
        assert_eq!(revenue.warning(Kpi::TotalRevenue).map(|w| w.count), Some(1));

        let aov = average_order_value(&records);
        assert_eq!(aov.value, 30.0);
        assert_eq!(aov.warning(Kpi::AverageOrderValue).map(|w| w.field), Some(Field::Amount));
    }

    #[test]
    fn test_null_duration_warning() {
        let records = vec![
            delivered(
                order("1", "C", "H", OrderStatus::Delivered, Some(10.0)),
                Some("a"),
                Some(900.0),
                Some(30.0),
                DeliveryOutcome::Success,
            ),
            delivered(
                order("2", "C", "H", OrderStatus::Delivered, Some(10.0)),
                Some("a"),
                Some(900.0),
                None,
                DeliveryOutcome::Success,
            ),
            delivered(
                order("3", "C", "H", OrderStatus::Failed, Some(10.0)),
                Some("a"),
                Some(900.0),
                Some(500.0),
                DeliveryOutcome::Failure,
            ),
        ];
        let time = average_delivery_time(&records);
        assert_eq!(time.value, Some(30.0));
        let warning = time.warning(Kpi::AverageDeliveryTime).unwrap();
        assert_eq!(warning.count, 1);
        assert_eq!(warning.field, Field::Duration);
    }

    #[test]
    fn test_no_successful_delivery_is_no_data() {
        let records = vec![delivered(
            order("1", "C", "H", OrderStatus::Failed, Some(10.0)),
            Some("a"),
            Some(900.0),
            Some(25.0),
            DeliveryOutcome::Failure,
        )];
        assert_eq!(average_delivery_time(&records).value, None);
        assert_eq!(driver_failure_rate(&records), 1.0);
    }

    #[test]
    fn test_revenue_equals_aov_times_contributing_orders() {
        let records: Vec<Record> = (0..37)
            .map(|i| {
                let status = if i % 5 == 0 { OrderStatus::Cancelled } else { OrderStatus::Delivered };
                order(&format!("{:04}", i), "C", "H", status, Some(0.1 * i as f64 + 7.33))
            })
            .collect();
        let revenue = total_revenue(&records).value;
        let aov = average_order_value(&records).value;
        let non_cancelled = records.len() - cancelled_orders(&records);
        assert!((revenue - aov * non_cancelled as f64).abs() < 1e-9);
    }

    #[test]
    fn test_revenue_is_bit_reproducible_across_input_order() {
        let mut records: Vec<Record> = (0..50)
            .map(|i| order(&format!("{:03}", i), "C", "H", OrderStatus::Delivered, Some(0.1 + i as f64 * 1.01)))
            .collect();
        let first = total_revenue(&records).value;
        let again = total_revenue(&records).value;
        records.reverse();
        let reversed = total_revenue(&records).value;
        assert_eq!(first.to_bits(), again.to_bits());
        assert_eq!(first.to_bits(), reversed.to_bits());
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            delivered(
                order("1", "C", "H", OrderStatus::Delivered, Some(50.0)),
                Some("a"),
                Some(1000.0),
                Some(20.0),
                DeliveryOutcome::Success,
            ),
            delivered(
                order("2", "C", "H", OrderStatus::Failed, Some(30.0)),
                Some("b"),
                Some(4000.0),
                None,
                DeliveryOutcome::Failure,
            ),
            order("3", "C", "H", OrderStatus::Cancelled, Some(12.0)),
        ];
        let summary = KpiSummary::compute(&records).value;
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.cancelled_orders, 1);
        assert_eq!(summary.delivered_orders, 1);
        assert_eq!(summary.deliveries, 2);
        assert_eq!(summary.failed_deliveries, 1);
        assert_eq!(summary.driver_failure_rate, 0.5);
        assert_eq!(summary.total_revenue, 80.0);
        assert_eq!(summary.average_order_value, 40.0);
        assert_eq!(summary.average_delivery_minutes, Some(20.0));
    }
}
