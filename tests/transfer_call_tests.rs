//! Transfer-call protocol tests
//!
//! Drive the two-phase transfer-and-notify protocol through the public
//! `TokenLedger` API and through the ledger service with custom receiver
//! hooks.

use async_trait::async_trait;
use ft_ledger::core::{LedgerService, ReceiverDirectory};
use ft_ledger::types::{HookFailure, TransferState, EVENT_JSON_PREFIX};
use ft_ledger::{
    AccountId, HookOutcome, LedgerCall, LedgerConfig, LedgerError, TokenEvent, TokenLedger,
    TransferReceiver, U128,
};
use rstest::{fixture, rstest};
use std::sync::Arc;

fn id(value: &str) -> AccountId {
    AccountId::from(value)
}

fn plain_logs(ledger: &TokenLedger) -> Vec<&str> {
    ledger
        .logs()
        .iter()
        .map(String::as_str)
        .filter(|line| !line.starts_with(EVENT_JSON_PREFIX))
        .collect()
}

#[fixture]
fn ledger() -> TokenLedger {
    let mut ledger = TokenLedger::new(LedgerConfig { storage_deposit: 1 });
    ledger.initialize(&id("owner"), U128(1000)).unwrap();
    ledger.storage_register(&id("defi"), U128(1)).unwrap();
    ledger.storage_register(&id("alice"), U128(1)).unwrap();
    ledger
}

/// Keeps the first `keep` tokens of every transfer and returns the rest
struct KeepingReceiver {
    keep: u128,
}

#[async_trait]
impl TransferReceiver for KeepingReceiver {
    async fn on_transfer(
        &self,
        _sender: &AccountId,
        amount: U128,
        _payload: &str,
    ) -> Result<String, HookFailure> {
        Ok(format!("\"{}\"", amount.0.saturating_sub(self.keep)))
    }
}

struct RejectingReceiver;

#[async_trait]
impl TransferReceiver for RejectingReceiver {
    async fn on_transfer(
        &self,
        _sender: &AccountId,
        _amount: U128,
        payload: &str,
    ) -> Result<String, HookFailure> {
        Err(HookFailure::new(format!("rejected '{}'", payload)))
    }
}

#[rstest]
#[case::partial_refund("\"10\"", 90, 10)]
#[case::bare_integer("25", 75, 25)]
#[case::keeps_everything("\"0\"", 100, 0)]
#[case::refund_capped_at_amount("\"500\"", 0, 100)]
#[case::negative_floors_to_zero("\"-3\"", 100, 0)]
#[case::malformed_refunds_all("{\"unused\": 1}", 0, 100)]
fn test_settlement_splits_amount(
    mut ledger: TokenLedger,
    #[case] returned: &str,
    #[case] used: u128,
    #[case] refunded: u128,
) {
    let request = ledger
        .transfer_and_notify(&id("owner"), &id("defi"), U128(100), None, "")
        .unwrap();
    assert_eq!(ledger.balance_of(&id("owner")), U128(900));
    assert_eq!(ledger.in_flight_total(), U128(100));

    let settlement = ledger
        .settle(request.transfer_id, HookOutcome::Returned(returned.to_string()))
        .unwrap();

    assert_eq!(settlement.used, used);
    assert_eq!(settlement.refunded, refunded);
    assert_eq!(settlement.burned, 0);
    assert_eq!(settlement.state, TransferState::Settled);
    assert_eq!(ledger.balance_of(&id("defi")), U128(used));
    assert_eq!(ledger.balance_of(&id("owner")), U128(900 + refunded));
    assert_eq!(ledger.in_flight_total(), U128(0));
    ledger.check_conservation().unwrap();
}

#[rstest]
fn test_receiver_closed_before_settlement_burns_used_part(mut ledger: TokenLedger) {
    let request = ledger
        .transfer_and_notify(&id("owner"), &id("defi"), U128(100), None, "")
        .unwrap();
    assert!(ledger.storage_unregister(&id("defi"), false).unwrap());

    let settlement = ledger
        .settle(request.transfer_id, HookOutcome::Returned("\"10\"".into()))
        .unwrap();

    assert_eq!(settlement.used, 0);
    assert_eq!(settlement.refunded, 10);
    assert_eq!(settlement.burned, 90);
    assert_eq!(ledger.total_supply(), U128(910));
    assert_eq!(ledger.balance_of(&id("owner")), U128(910));
    assert_eq!(
        plain_logs(&ledger),
        ["Closed @defi with 0", "Account @defi burned 90"]
    );
    assert_eq!(
        ledger.logs()[ledger.logs().len() - 2..],
        [
            TokenEvent::burn(&id("defi"), 90, None).to_string(),
            TokenEvent::transfer(&id("defi"), &id("owner"), 10, Some("refund")).to_string(),
        ]
    );
    ledger.check_conservation().unwrap();
}

#[rstest]
fn test_sender_force_closed_mid_flight_counts_burned_refund_as_used() {
    let mut ledger = TokenLedger::new(LedgerConfig { storage_deposit: 1 });
    ledger.initialize(&id("owner"), U128(10000)).unwrap();
    ledger.storage_register(&id("defi"), U128(1)).unwrap();

    let request = ledger
        .transfer_and_notify(&id("owner"), &id("defi"), U128(100), None, "")
        .unwrap();
    assert!(ledger.storage_unregister(&id("owner"), true).unwrap());

    let used = ledger
        .resolve_transfer(request.transfer_id, HookOutcome::Returned("\"10\"".into()))
        .unwrap();

    assert_eq!(used, U128(100));
    assert_eq!(ledger.total_supply(), U128(90));
    assert_eq!(ledger.balance_of(&id("defi")), U128(90));
    assert_eq!(
        ledger.logs(),
        [
            TokenEvent::mint(&id("owner"), 10000, Some("new tokens are minted")).to_string(),
            TokenEvent::transfer(&id("owner"), &id("defi"), 100, None).to_string(),
            "Closed @owner with 9900".to_string(),
            TokenEvent::burn(&id("owner"), 9900, None).to_string(),
            "The account of the sender was deleted".to_string(),
            "Account @owner burned 10".to_string(),
            TokenEvent::burn(&id("defi"), 10, Some("refund")).to_string(),
        ]
    );
    ledger.check_conservation().unwrap();
}

#[rstest]
fn test_applied_calls_carry_memo_into_events(mut ledger: TokenLedger) {
    ledger.drain_logs();
    ledger
        .apply(LedgerCall::Transfer {
            caller: id("owner"),
            receiver: id("alice"),
            amount: 50,
            memo: Some("salary".to_string()),
        })
        .unwrap();
    ledger
        .apply(LedgerCall::TransferAndNotify {
            caller: id("alice"),
            receiver: id("defi"),
            amount: 20,
            memo: Some("deposit".to_string()),
            payload: String::new(),
        })
        .unwrap();

    assert_eq!(
        ledger.drain_logs(),
        vec![
            TokenEvent::transfer(&id("owner"), &id("alice"), 50, Some("salary")).to_string(),
            TokenEvent::transfer(&id("alice"), &id("defi"), 20, Some("deposit")).to_string(),
        ]
    );
    assert_eq!(ledger.in_flight_total(), U128(20));
}

#[rstest]
fn test_escrow_transfer_call_refunds_owner(mut ledger: TokenLedger) {
    ledger
        .transfer(&id("owner"), &id("alice"), U128(200), None)
        .unwrap();
    ledger
        .set_allowance(&id("alice"), &id("owner"), U128(150))
        .unwrap();

    let request = ledger
        .transfer_from_and_notify(&id("owner"), &id("alice"), &id("defi"), U128(100), None, "40")
        .unwrap();
    assert_eq!(request.sender, id("alice"));
    assert_eq!(ledger.allowance_of(&id("alice"), &id("owner")), U128(50));

    let used = ledger
        .resolve_transfer(request.transfer_id, HookOutcome::Returned("\"40\"".into()))
        .unwrap();

    assert_eq!(used, U128(60));
    assert_eq!(ledger.balance_of(&id("alice")), U128(140));
    assert_eq!(ledger.balance_of(&id("defi")), U128(60));
    assert_eq!(ledger.balance_of(&id("owner")), U128(800));
}

#[rstest]
fn test_transfer_settles_only_once(mut ledger: TokenLedger) {
    let request = ledger
        .transfer_and_notify(&id("owner"), &id("defi"), U128(100), None, "")
        .unwrap();
    assert_eq!(
        ledger.transfer_status(request.transfer_id).map(|p| p.state),
        Some(TransferState::AwaitingReceiverAck)
    );

    ledger
        .settle(request.transfer_id, HookOutcome::Failed("trap".into()))
        .unwrap();

    assert!(ledger.transfer_status(request.transfer_id).is_none());
    assert_eq!(
        ledger.settle(request.transfer_id, HookOutcome::Returned("\"0\"".into())),
        Err(LedgerError::UnknownTransfer {
            transfer_id: request.transfer_id
        })
    );
    assert_eq!(ledger.balance_of(&id("owner")), U128(1000));
}

#[tokio::test]
async fn test_service_runs_custom_receivers() {
    let directory = ReceiverDirectory::new();
    directory.register(id("defi"), Arc::new(KeepingReceiver { keep: 30 }));
    directory.register(id("alice"), Arc::new(RejectingReceiver));

    let mut ledger = TokenLedger::new(LedgerConfig { storage_deposit: 1 });
    ledger.initialize(&id("owner"), U128(1000)).unwrap();
    ledger.storage_register(&id("defi"), U128(1)).unwrap();
    ledger.storage_register(&id("alice"), U128(1)).unwrap();

    let (handle, task) = LedgerService::spawn(ledger, Arc::new(directory), 2);

    let mut pending = Vec::new();
    for receiver in ["defi", "alice"] {
        let reply = handle
            .submit(LedgerCall::TransferAndNotify {
                caller: id("owner"),
                receiver: id(receiver),
                amount: 100,
                memo: None,
                payload: "hello".to_string(),
            })
            .await
            .unwrap();
        pending.push(reply.settlement.expect("transfer call must be pending"));
    }

    let to_defi = pending.remove(0).settled().await.unwrap();
    let to_alice = pending.remove(0).settled().await.unwrap();
    assert_eq!((to_defi.used, to_defi.refunded), (30, 70));
    assert_eq!((to_alice.used, to_alice.refunded), (0, 100));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(
        snapshot.accounts,
        vec![
            (id("alice"), U128(0)),
            (id("defi"), U128(30)),
            (id("owner"), U128(970)),
        ]
    );
    assert_eq!(snapshot.in_flight, U128(0));

    drop(handle);
    let ledger = task.await.unwrap();
    ledger.check_conservation().unwrap();
}

#[tokio::test]
async fn test_service_rejects_invalid_calls() {
    let (handle, task) = LedgerService::spawn(
        TokenLedger::default(),
        Arc::new(ReceiverDirectory::new()),
        1,
    );

    let result = handle
        .submit(LedgerCall::Transfer {
            caller: id("owner"),
            receiver: id("alice"),
            amount: 1,
            memo: None,
        })
        .await;

    assert_eq!(result.err(), Some(LedgerError::NotInitialized));
    drop(handle);
    assert!(!task.await.unwrap().is_initialized());
}
