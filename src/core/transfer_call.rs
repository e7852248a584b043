//! Transfer-call coordinator
//!
//! Drives a transfer-and-notify call through its two halves:
//!
//! 1. [`TransferCallCoordinator::initiate`] validates the call, debits the
//!    sender (and the spender's allowance for the escrow variant) and parks
//!    a [`PendingTransfer`] under a fresh [`TransferId`]. The returned
//!    [`HookRequest`] is what the receiver's hook must be invoked with.
//! 2. [`TransferCallCoordinator::settle`] consumes the hook outcome, credits
//!    the receiver with the used part and returns the unused part to the
//!    sender. Whatever cannot be credited because its destination was
//!    unregistered in the meantime is burned.
//!
//! Between the two halves the debited amount is "in flight": it is part of
//! the total supply but of no balance.

use crate::core::allowance_registry::AllowanceRegistry;
use crate::core::balance_ledger::BalanceLedger;
use crate::core::storage_registry::StorageRegistry;
use crate::types::{
    AccountId, Balance, HookOutcome, HookRequest, LedgerError, PendingTransfer, Settlement,
    TokenEvent, TransferId, TransferState,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Memo of the events that return or burn a refund
pub const REFUND_MEMO: &str = "refund";

/// Parameters of a transfer-and-notify call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCallRequest {
    /// Account whose balance is debited
    pub sender: AccountId,
    /// Set for the escrow variant; the allowance `sender` granted it is spent
    pub spender: Option<AccountId>,
    pub receiver: AccountId,
    pub amount: Balance,
    pub payload: String,
}

/// Owns every transfer-and-notify call between initiation and settlement
#[derive(Debug, Default)]
pub struct TransferCallCoordinator {
    pending: HashMap<TransferId, PendingTransfer>,
    next_id: TransferId,
}

impl TransferCallCoordinator {
    pub fn new() -> Self {
        TransferCallCoordinator {
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    /// Validate and debit a transfer-and-notify call
    ///
    /// Checks run in this order, and the first failure rejects the call
    /// without touching any state:
    ///
    /// 1. `amount > 0`
    /// 2. sender and receiver differ
    /// 3. sender registered (`UnknownAccount` for an escrow owner,
    ///    `NotRegistered` otherwise)
    /// 4. receiver registered
    /// 5. allowance, for the escrow variant
    /// 6. sender balance
    ///
    /// # Returns
    ///
    /// The hook request to deliver to the receiver.
    pub fn initiate(
        &mut self,
        balances: &mut BalanceLedger,
        allowances: &mut AllowanceRegistry,
        registry: &StorageRegistry,
        request: TransferCallRequest,
    ) -> Result<HookRequest, LedgerError> {
        let transfer_id = self.next_id;
        let mut pending = PendingTransfer {
            transfer_id,
            sender: request.sender,
            receiver: request.receiver,
            amount: request.amount,
            state: TransferState::Initiated,
        };

        if let Err(error) = validate_transfer(
            balances,
            allowances,
            registry,
            &pending.sender,
            request.spender.as_ref(),
            &pending.receiver,
            pending.amount,
            "transfer_call",
        ) {
            pending.state = TransferState::Rejected;
            debug!(transfer_id, state = ?pending.state, %error, "transfer call rejected");
            return Err(error);
        }

        balances.debit(&pending.sender, pending.amount)?;
        if let Some(spender) = request.spender.as_ref() {
            allowances.consume(&pending.sender, spender, pending.amount)?;
        }

        pending.state = TransferState::AwaitingReceiverAck;
        debug!(
            transfer_id,
            sender = %pending.sender,
            receiver = %pending.receiver,
            amount = pending.amount,
            state = ?pending.state,
            "transfer call initiated"
        );

        let hook = HookRequest {
            transfer_id,
            sender: pending.sender.clone(),
            receiver: pending.receiver.clone(),
            amount: pending.amount,
            payload: request.payload,
        };
        self.pending.insert(transfer_id, pending);
        self.next_id += 1;

        Ok(hook)
    }

    /// Settle a pending transfer with the receiver hook's outcome
    ///
    /// # Arguments
    ///
    /// * `balances` - Balance ledger to credit or burn against
    /// * `registry` - Registration state at settlement time
    /// * `transfer_id` - The transfer to settle
    /// * `outcome` - What the receiver hook returned
    /// * `logs` - Receives the side-effect log lines of the settlement
    ///
    /// # Errors
    ///
    /// Returns `UnknownTransfer` if the id is not awaiting settlement. A
    /// transfer settles exactly once; hook failures and malformed results are
    /// never errors here, they become refunds.
    pub fn settle(
        &mut self,
        balances: &mut BalanceLedger,
        registry: &StorageRegistry,
        transfer_id: TransferId,
        outcome: HookOutcome,
        logs: &mut Vec<String>,
    ) -> Result<Settlement, LedgerError> {
        let pending = self
            .pending
            .remove(&transfer_id)
            .ok_or(LedgerError::UnknownTransfer { transfer_id })?;
        let amount = pending.amount;

        let unused = match outcome {
            HookOutcome::Returned(raw) => parse_unused(&raw, amount).unwrap_or_else(|error| {
                warn!(transfer_id, %error, "refunding transfer call");
                amount
            }),
            HookOutcome::Failed(reason) => {
                let error = LedgerError::hook_failed(&pending.receiver, reason);
                warn!(transfer_id, %error, "refunding transfer call");
                amount
            }
        };
        let used = amount - unused;

        let mut burned = 0;
        let mut credited = 0;
        if used > 0 {
            match balances.credit(registry, &pending.receiver, used) {
                Ok(()) => credited = used,
                Err(error) => {
                    debug!(transfer_id, %error, "receiver cannot be credited");
                    burn(balances, &pending.receiver, &pending.receiver, used, None, logs)?;
                    burned += used;
                }
            }
        }

        let mut refunded = 0;
        if unused > 0 {
            if !registry.is_registered(&pending.sender) {
                logs.push("The account of the sender was deleted".to_string());
                info!(transfer_id, sender = %pending.sender, "the account of the sender was deleted");
                burn(balances, &pending.sender, &pending.receiver, unused, Some(REFUND_MEMO), logs)?;
                burned += unused;
            } else if let Err(error) = balances.credit(registry, &pending.sender, unused) {
                debug!(transfer_id, %error, "sender cannot be refunded");
                burn(balances, &pending.sender, &pending.receiver, unused, Some(REFUND_MEMO), logs)?;
                burned += unused;
            } else {
                logs.push(
                    TokenEvent::transfer(&pending.receiver, &pending.sender, unused, Some(REFUND_MEMO))
                        .to_string(),
                );
                refunded = unused;
            }
        }

        let settlement = Settlement {
            transfer_id,
            sender: pending.sender,
            receiver: pending.receiver,
            amount,
            used: credited,
            refunded,
            burned,
            state: TransferState::Settled,
        };
        debug!(
            transfer_id,
            used = settlement.used,
            refunded,
            burned,
            state = ?settlement.state,
            "transfer call settled"
        );

        Ok(settlement)
    }

    /// The pending record of a transfer awaiting settlement
    pub fn status(&self, transfer_id: TransferId) -> Option<&PendingTransfer> {
        self.pending.get(&transfer_id)
    }

    /// Total amount debited by transfers that are not settled yet
    pub fn in_flight_total(&self) -> Balance {
        self.pending.values().map(|pending| pending.amount).sum()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Preconditions shared by every transfer variant
///
/// Purely a check; nothing is mutated.
#[allow(clippy::too_many_arguments)]
pub(crate) fn validate_transfer(
    balances: &BalanceLedger,
    allowances: &AllowanceRegistry,
    registry: &StorageRegistry,
    sender: &AccountId,
    spender: Option<&AccountId>,
    receiver: &AccountId,
    amount: Balance,
    operation: &str,
) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::invalid_amount(operation));
    }
    if sender == receiver {
        return Err(LedgerError::self_transfer(sender));
    }
    if !registry.is_registered(sender) {
        return Err(match spender {
            Some(_) => LedgerError::unknown_account(sender),
            None => LedgerError::not_registered(sender),
        });
    }
    if !registry.is_registered(receiver) {
        return Err(LedgerError::not_registered(receiver));
    }
    if let Some(spender) = spender {
        allowances.check(sender, spender, amount)?;
    }

    let balance = balances.balance_of(sender);
    if balance < amount {
        return Err(LedgerError::insufficient_balance(sender, balance, amount));
    }

    Ok(())
}

/// Burn an undeliverable amount
///
/// `account` is the destination that could not be credited. The burn event
/// names `holder`, the account the transfer event last moved the tokens to.
fn burn(
    balances: &mut BalanceLedger,
    account: &AccountId,
    holder: &AccountId,
    amount: Balance,
    memo: Option<&str>,
    logs: &mut Vec<String>,
) -> Result<(), LedgerError> {
    balances.burn(account, amount)?;
    logs.push(format!("Account @{} burned {}", account, amount));
    logs.push(TokenEvent::burn(holder, amount, memo).to_string());
    info!(account = %account, amount, "burned undeliverable amount");
    Ok(())
}

/// Parse the unused amount a receiver hook returned
///
/// Accepts a bare integer (`10`, which is also the JSON number form) or a
/// JSON string holding one (`"10"`). The receiver is untrusted, so negative
/// values floor to zero and values above `amount` cap at `amount`, even when
/// they do not fit in 128 bits.
///
/// # Errors
///
/// Returns `MalformedPayload` for anything that is not an integer.
pub fn parse_unused(raw: &str, amount: Balance) -> Result<Balance, LedgerError> {
    let trimmed = raw.trim();
    if let Some(unused) = clamp_integer(trimmed, amount) {
        return Ok(unused);
    }

    match serde_json::from_str::<String>(trimmed) {
        Ok(text) => clamp_integer(text.trim(), amount).ok_or_else(|| {
            LedgerError::malformed_payload(format!("'{}' is not an integer", text))
        }),
        Err(_) => Err(LedgerError::malformed_payload(format!(
            "'{}' is not an amount",
            trimmed
        ))),
    }
}

fn clamp_integer(text: &str, amount: Balance) -> Option<Balance> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if negative {
        return Some(0);
    }

    // Only overflow can fail past the digit check
    Some(digits.parse::<Balance>().map_or(amount, |value| value.min(amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageBalanceBounds;
    use rstest::rstest;

    const SUPPLY: Balance = 1_000;

    struct Fixture {
        balances: BalanceLedger,
        allowances: AllowanceRegistry,
        registry: StorageRegistry,
        coordinator: TransferCallCoordinator,
        logs: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = StorageRegistry::new(StorageBalanceBounds::fixed(10));
            let mut balances = BalanceLedger::new();
            for account in ["owner", "defi", "carol"] {
                registry.register(&account.into(), 10).unwrap();
            }
            balances.mint(&registry, &"owner".into(), SUPPLY).unwrap();

            Fixture {
                balances,
                allowances: AllowanceRegistry::new(),
                registry,
                coordinator: TransferCallCoordinator::new(),
                logs: Vec::new(),
            }
        }

        fn initiate(&mut self, amount: Balance) -> Result<HookRequest, LedgerError> {
            self.coordinator.initiate(
                &mut self.balances,
                &mut self.allowances,
                &self.registry,
                TransferCallRequest {
                    sender: "owner".into(),
                    spender: None,
                    receiver: "defi".into(),
                    amount,
                    payload: "10".to_string(),
                },
            )
        }

        fn settle(&mut self, id: TransferId, outcome: HookOutcome) -> Settlement {
            self.coordinator
                .settle(
                    &mut self.balances,
                    &self.registry,
                    id,
                    outcome,
                    &mut self.logs,
                )
                .unwrap()
        }

        fn conserved(&self) -> bool {
            self.balances.sum_of_balances().unwrap() + self.coordinator.in_flight_total()
                == self.balances.total_supply()
        }

        fn balance(&self, account: &str) -> Balance {
            self.balances.balance_of(&account.into())
        }
    }

    #[rstest]
    #[case::json_string("\"10\"", 100, 10)]
    #[case::json_number("10", 100, 10)]
    #[case::padded("  \" 7 \"  ", 100, 7)]
    #[case::negative("-5", 100, 0)]
    #[case::negative_string("\"-5\"", 100, 0)]
    #[case::above_amount("\"500\"", 100, 100)]
    #[case::overflow("999999999999999999999999999999999999999999", 100, 100)]
    #[case::zero("0", 100, 0)]
    fn test_parse_unused(#[case] raw: &str, #[case] amount: Balance, #[case] expected: Balance) {
        assert_eq!(parse_unused(raw, amount).unwrap(), expected);
    }

    #[rstest]
    #[case::text("take-my-money")]
    #[case::empty("")]
    #[case::float("1.5")]
    #[case::string_float("\"1.5\"")]
    #[case::object("{\"unused\": 1}")]
    fn test_parse_unused_malformed(#[case] raw: &str) {
        assert!(matches!(
            parse_unused(raw, 100).unwrap_err(),
            LedgerError::MalformedPayload { .. }
        ));
    }

    #[test]
    fn test_initiate_debits_sender_and_parks_transfer() {
        let mut fx = Fixture::new();

        let hook = fx.initiate(100).unwrap();

        assert_eq!(hook.amount, 100);
        assert_eq!(hook.payload, "10");
        assert_eq!(fx.balance("owner"), 900);
        assert_eq!(fx.balance("defi"), 0);
        assert_eq!(fx.coordinator.in_flight_total(), 100);
        assert_eq!(
            fx.coordinator.status(hook.transfer_id).unwrap().state,
            TransferState::AwaitingReceiverAck
        );
        assert!(fx.conserved());
    }

    #[test]
    fn test_initiate_assigns_distinct_ids() {
        let mut fx = Fixture::new();
        let first = fx.initiate(1).unwrap();
        let second = fx.initiate(1).unwrap();
        assert_ne!(first.transfer_id, second.transfer_id);
        assert_eq!(fx.coordinator.pending_count(), 2);
    }

    #[rstest]
    #[case::zero_amount(0)]
    #[case::insufficient_balance(SUPPLY + 1)]
    fn test_rejected_initiation_changes_nothing(#[case] amount: Balance) {
        let mut fx = Fixture::new();

        assert!(fx.initiate(amount).is_err());

        assert_eq!(fx.balance("owner"), SUPPLY);
        assert_eq!(fx.coordinator.pending_count(), 0);
    }

    #[test]
    fn test_initiate_to_unregistered_receiver() {
        let mut fx = Fixture::new();
        let result = fx.coordinator.initiate(
            &mut fx.balances,
            &mut fx.allowances,
            &fx.registry,
            TransferCallRequest {
                sender: "owner".into(),
                spender: None,
                receiver: "stranger".into(),
                amount: 10,
                payload: String::new(),
            },
        );

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::NotRegistered { .. }
        ));
        assert_eq!(fx.balance("owner"), SUPPLY);
    }

    #[test]
    fn test_escrow_initiation_consumes_allowance() {
        let mut fx = Fixture::new();
        fx.allowances
            .set_allowance(&"owner".into(), &"carol".into(), 50)
            .unwrap();

        fx.coordinator
            .initiate(
                &mut fx.balances,
                &mut fx.allowances,
                &fx.registry,
                TransferCallRequest {
                    sender: "owner".into(),
                    spender: Some("carol".into()),
                    receiver: "defi".into(),
                    amount: 30,
                    payload: String::new(),
                },
            )
            .unwrap();

        assert_eq!(fx.allowances.allowance_of(&"owner".into(), &"carol".into()), 20);
        assert_eq!(fx.balance("owner"), 970);
    }

    #[test]
    fn test_partial_refund() {
        let mut fx = Fixture::new();
        let hook = fx.initiate(100).unwrap();

        let settlement = fx.settle(hook.transfer_id, HookOutcome::Returned("\"10\"".into()));

        assert_eq!(settlement.used, 90);
        assert_eq!(settlement.refunded, 10);
        assert_eq!(settlement.burned, 0);
        assert_eq!(fx.balance("owner"), 910);
        assert_eq!(fx.balance("defi"), 90);
        assert_eq!(
            fx.logs,
            vec![TokenEvent::transfer(&"defi".into(), &"owner".into(), 10, Some(REFUND_MEMO)).to_string()]
        );
        assert!(fx.conserved());
    }

    #[rstest]
    #[case::failed(HookOutcome::Failed("ParseIntError".into()))]
    #[case::malformed(HookOutcome::Returned("not a number".into()))]
    fn test_failure_refunds_everything(#[case] outcome: HookOutcome) {
        let mut fx = Fixture::new();
        let hook = fx.initiate(100).unwrap();

        let settlement = fx.settle(hook.transfer_id, outcome);

        assert_eq!(settlement.used, 0);
        assert_eq!(settlement.refunded, 100);
        assert_eq!(fx.balance("owner"), SUPPLY);
        assert_eq!(fx.balance("defi"), 0);
        assert!(fx.conserved());
    }

    #[test]
    fn test_settle_twice_is_rejected() {
        let mut fx = Fixture::new();
        let hook = fx.initiate(100).unwrap();
        fx.settle(hook.transfer_id, HookOutcome::Returned("0".into()));

        let again = fx.coordinator.settle(
            &mut fx.balances,
            &fx.registry,
            hook.transfer_id,
            HookOutcome::Returned("0".into()),
            &mut fx.logs,
        );

        assert_eq!(
            again.unwrap_err(),
            LedgerError::UnknownTransfer {
                transfer_id: hook.transfer_id
            }
        );
        assert_eq!(fx.balance("defi"), 100);
    }

    #[test]
    fn test_unused_is_burned_when_sender_was_closed() {
        let mut fx = Fixture::new();
        fx.balances
            .transfer(&fx.registry, &"owner".into(), &"carol".into(), 100)
            .unwrap();
        let hook = fx
            .coordinator
            .initiate(
                &mut fx.balances,
                &mut fx.allowances,
                &fx.registry,
                TransferCallRequest {
                    sender: "carol".into(),
                    spender: None,
                    receiver: "defi".into(),
                    amount: 100,
                    payload: String::new(),
                },
            )
            .unwrap();
        fx.registry
            .unregister(&mut fx.balances, &"carol".into(), false)
            .unwrap();

        let settlement = fx.settle(hook.transfer_id, HookOutcome::Returned("10".into()));

        assert_eq!(settlement.used, 90);
        assert_eq!(settlement.burned, 10);
        assert_eq!(settlement.consumed(), 100);
        assert_eq!(fx.balance("defi"), 90);
        assert_eq!(fx.balances.total_supply(), 990);
        assert_eq!(
            fx.logs,
            vec![
                "The account of the sender was deleted".to_string(),
                "Account @carol burned 10".to_string(),
                TokenEvent::burn(&"defi".into(), 10, Some(REFUND_MEMO)).to_string(),
            ]
        );
        assert!(fx.conserved());
    }

    #[test]
    fn test_used_is_burned_when_receiver_was_closed() {
        let mut fx = Fixture::new();
        let hook = fx.initiate(100).unwrap();
        fx.registry
            .unregister(&mut fx.balances, &"defi".into(), false)
            .unwrap();

        let settlement = fx.settle(hook.transfer_id, HookOutcome::Returned("\"0\"".into()));

        assert_eq!(settlement.used, 0);
        assert_eq!(settlement.burned, 100);
        assert_eq!(fx.balances.total_supply(), 900);
        assert_eq!(
            fx.logs,
            vec![
                "Account @defi burned 100".to_string(),
                TokenEvent::burn(&"defi".into(), 100, None).to_string(),
            ]
        );
        assert!(fx.conserved());
    }
}
