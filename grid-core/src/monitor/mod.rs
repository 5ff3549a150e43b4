//! Poll-driven reconciliation of open orders.
//!
//! The original's `StartOrderTransaction`/`UpdateOrderTransactions`/
//! `ProcessOrderTransactions` bodies are commented out in
//! `RestConnectionBase.cpp`; this module restores the intended behaviour
//! described by those comments as first-class, tested code.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::adapter::ExchangeAdapter;
use crate::core::types::{Currency, ExecutionReport, OrderStatus, OrderTransaction};

pub struct OrderTransactionMonitor {
    transactions: Mutex<BTreeMap<u64, OrderTransaction>>,
    next_sequence: AtomicU64,
    order_monitoring_interval_ms: u64,
}

impl OrderTransactionMonitor {
    pub fn new(order_monitoring_interval_ms: u64) -> Self {
        Self {
            transactions: Mutex::new(BTreeMap::new()),
            next_sequence: AtomicU64::new(1),
            order_monitoring_interval_ms,
        }
    }

    /// Insert a freshly placed order into the monitoring map under a fresh
    /// sequence key, but only when its latest report is `New` or
    /// `PartiallyFilled` and monitoring is enabled (non-zero interval).
    pub fn start_order_transaction(
        &self,
        sender_comp_id: impl Into<String>,
        currency: Currency,
        reports: &[ExecutionReport],
    ) {
        if self.order_monitoring_interval_ms == 0 {
            warn!("order monitoring interval is zero, not tracking order transaction");
            return;
        }
        let Some(latest) = reports.last() else {
            return;
        };
        if !matches!(latest.status, OrderStatus::New | OrderStatus::PartiallyFilled) {
            return;
        }

        let seq = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let transaction = OrderTransaction {
            sender_comp_id: sender_comp_id.into(),
            currency,
            last_execution_report: latest.clone(),
        };
        self.transactions.lock().insert(seq, transaction);
    }

    /// Insert any ground-truth order id from the engine not already
    /// tracked. Used when the strategy's `activeOrders` and the monitor's
    /// map have drifted (e.g. after a restart).
    pub fn update_order_transactions(&self, open_positions: &[(Currency, ExecutionReport)]) {
        let mut transactions = self.transactions.lock();
        let already_tracked: std::collections::HashSet<String> = transactions
            .values()
            .map(|t| t.last_execution_report.order_id.clone())
            .collect();

        for (currency, report) in open_positions {
            if already_tracked.contains(&report.order_id) {
                continue;
            }
            let seq = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            transactions.insert(
                seq,
                OrderTransaction {
                    sender_comp_id: String::new(),
                    currency: currency.clone(),
                    last_execution_report: report.clone(),
                },
            );
        }
    }

    /// Poll every tracked order via `adapter.query_order`, diff against the
    /// stored report, and return updated reports for the caller to forward
    /// to the strategy. Network I/O happens outside the lock: the keys are
    /// snapshotted first, then queried, then the diff is applied under a
    /// second, short lock acquisition.
    pub async fn process_order_transactions(
        &self,
        adapter: &dyn ExchangeAdapter,
        pair: &crate::core::types::CurrencyPair,
    ) -> Vec<ExecutionReport> {
        let snapshot: Vec<(u64, String, Option<String>)> = {
            let transactions = self.transactions.lock();
            transactions
                .iter()
                .map(|(seq, t)| {
                    (
                        *seq,
                        t.last_execution_report.order_id.clone(),
                        t.last_execution_report.client_order_id.clone(),
                    )
                })
                .collect()
        };

        let mut updated_reports = Vec::new();
        let mut terminal_seqs = Vec::new();
        let mut diffs: Vec<(u64, OrderStatus, rust_decimal::Decimal)> = Vec::new();

        for (seq, order_id, client_id) in snapshot {
            let order = match adapter.query_order(pair, &order_id, client_id.as_deref()).await {
                Ok(order) => order,
                Err(_) => continue, // soft: NotFound / transport error, retry next tick
            };
            diffs.push((seq, order.status, order.filled));
        }

        {
            let mut transactions = self.transactions.lock();
            for (seq, status, filled) in diffs {
                let Some(transaction) = transactions.get_mut(&seq) else {
                    continue;
                };
                let last = &transaction.last_execution_report;
                if last.status == status && last.cum_qty == filled {
                    continue;
                }
                let mut report = last.clone();
                report.status = status;
                report.last_fill_qty = filled - last.cum_qty;
                report.cum_qty = filled;
                report.leaves_qty = report.order_qty - filled;
                transaction.last_execution_report = report.clone();
                updated_reports.push(report);

                if status.is_terminal() {
                    terminal_seqs.push(seq);
                }
            }
            for seq in terminal_seqs {
                transactions.remove(&seq);
            }
        }

        updated_reports
    }

    pub fn tracked_count(&self) -> usize {
        self.transactions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CurrencyPair, Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn pair() -> CurrencyPair {
        CurrencyPair::parse("BTC/USDT").unwrap()
    }

    fn report(order_id: &str, status: OrderStatus, cum_qty: rust_decimal::Decimal) -> ExecutionReport {
        let mut r = ExecutionReport::empty("mock", pair());
        r.order_id = order_id.to_string();
        r.side = Side::Buy;
        r.status = status;
        r.order_qty = dec!(1);
        r.cum_qty = cum_qty;
        r.tif = TimeInForce::GoodTilCancel;
        r
    }

    #[test]
    fn start_order_transaction_skips_terminal_reports() {
        let monitor = OrderTransactionMonitor::new(1000);
        monitor.start_order_transaction("sender", Currency::new("USDT"), &[report("o1", OrderStatus::Filled, dec!(1))]);
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[test]
    fn start_order_transaction_tracks_new_orders() {
        let monitor = OrderTransactionMonitor::new(1000);
        monitor.start_order_transaction("sender", Currency::new("USDT"), &[report("o1", OrderStatus::New, dec!(0))]);
        assert_eq!(monitor.tracked_count(), 1);
    }

    #[test]
    fn zero_interval_disables_tracking() {
        let monitor = OrderTransactionMonitor::new(0);
        monitor.start_order_transaction("sender", Currency::new("USDT"), &[report("o1", OrderStatus::New, dec!(0))]);
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[tokio::test]
    async fn process_order_transactions_diffs_and_retires_on_fill() {
        let mock = crate::mock::MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        mock.set_balances(dec!(100000), dec!(0));
        let order = mock.place_limit_order(&pair(), Side::Buy, dec!(29850), dec!(1));

        let monitor = OrderTransactionMonitor::new(1000);
        monitor.start_order_transaction(
            "sender",
            Currency::new("USDT"),
            &[report(&order.order_id, OrderStatus::New, dec!(0))],
        );
        assert_eq!(monitor.tracked_count(), 1);

        mock.simulate_price_move(dec!(29850));

        let updates = monitor.process_order_transactions(&mock, &pair()).await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, OrderStatus::Filled);
        assert_eq!(monitor.tracked_count(), 0);
    }

    #[tokio::test]
    async fn process_order_transactions_is_noop_with_no_change() {
        let mock = crate::mock::MockExchange::new(dec!(30000), dec!(0), dec!(1), dec!(1), dec!(0), 1);
        let order = mock.place_limit_order(&pair(), Side::Buy, dec!(29000), dec!(1));

        let monitor = OrderTransactionMonitor::new(1000);
        monitor.start_order_transaction(
            "sender",
            Currency::new("USDT"),
            &[report(&order.order_id, OrderStatus::New, dec!(0))],
        );

        let updates = monitor.process_order_transactions(&mock, &pair()).await;
        assert!(updates.is_empty());
        assert_eq!(monitor.tracked_count(), 1);
    }
}
