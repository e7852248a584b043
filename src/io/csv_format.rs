//! CSV format handling for call scripts and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to ledger calls
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input format
//!
//! Columns: `call,caller,account,counterparty,amount,msg,force,memo`. Which
//! columns a row needs depends on the call. The trailing `memo` column may be
//! left out of the header entirely; when present it is attached to the token
//! event of the four transfer calls.
//!
//! | call | fields |
//! |---|---|
//! | `initialize` | account (owner), amount (total supply) |
//! | `register` | caller, account (defaults to caller), amount (deposit, optional) |
//! | `unregister` | caller, force (optional) |
//! | `withdraw_storage` | caller, amount (optional) |
//! | `set_allowance` | caller, account (spender), amount |
//! | `transfer` | caller, account (receiver), amount, memo (optional) |
//! | `transfer_from` | caller (spender), counterparty (owner), account (receiver), amount, memo (optional) |
//! | `transfer_call` | caller, account (receiver), amount, msg, memo (optional) |
//! | `transfer_from_call` | caller (spender), counterparty (owner), account (receiver), amount, msg, memo (optional) |

use crate::types::{AccountId, Balance, LedgerCall, LedgerError, U128};
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Every column except `call` is optional; [`convert_csv_record`] decides
/// which ones the call actually requires.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    pub call: String,
    pub caller: Option<String>,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub msg: Option<String>,
    pub force: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Convert a CsvRecord to a LedgerCall
///
/// # Arguments
///
/// * `csv_record` - The deserialized CSV record
///
/// # Returns
///
/// Result containing either:
/// - Ok(LedgerCall) - Successfully converted call
/// - Err(LedgerError) - `InvalidCall`, `MissingField`, `InvalidAccountId`
///   or `ParseError` describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<LedgerCall, LedgerError> {
    let name = csv_record.call.trim().to_lowercase();
    let call = name.as_str();

    let record = match call {
        "initialize" => LedgerCall::Initialize {
            owner: required_account(call, "account", csv_record.account)?,
            total_supply: required_amount(call, csv_record.amount)?,
        },
        "register" => LedgerCall::StorageRegister {
            caller: required_account(call, "caller", csv_record.caller)?,
            account: optional_account(csv_record.account)?,
            deposit: optional_amount(csv_record.amount)?,
        },
        "unregister" => LedgerCall::StorageUnregister {
            caller: required_account(call, "caller", csv_record.caller)?,
            force: parse_force(csv_record.force)?,
        },
        "withdraw_storage" => LedgerCall::StorageWithdraw {
            caller: required_account(call, "caller", csv_record.caller)?,
            amount: optional_amount(csv_record.amount)?,
        },
        "set_allowance" => LedgerCall::SetAllowance {
            caller: required_account(call, "caller", csv_record.caller)?,
            spender: required_account(call, "account", csv_record.account)?,
            amount: required_amount(call, csv_record.amount)?,
        },
        "transfer" => LedgerCall::Transfer {
            caller: required_account(call, "caller", csv_record.caller)?,
            receiver: required_account(call, "account", csv_record.account)?,
            amount: required_amount(call, csv_record.amount)?,
            memo: present(csv_record.memo),
        },
        "transfer_from" => LedgerCall::TransferFrom {
            caller: required_account(call, "caller", csv_record.caller)?,
            owner: required_account(call, "counterparty", csv_record.counterparty)?,
            receiver: required_account(call, "account", csv_record.account)?,
            amount: required_amount(call, csv_record.amount)?,
            memo: present(csv_record.memo),
        },
        "transfer_call" => LedgerCall::TransferAndNotify {
            caller: required_account(call, "caller", csv_record.caller)?,
            receiver: required_account(call, "account", csv_record.account)?,
            amount: required_amount(call, csv_record.amount)?,
            memo: present(csv_record.memo),
            payload: csv_record.msg.unwrap_or_default(),
        },
        "transfer_from_call" => LedgerCall::TransferFromAndNotify {
            caller: required_account(call, "caller", csv_record.caller)?,
            owner: required_account(call, "counterparty", csv_record.counterparty)?,
            receiver: required_account(call, "account", csv_record.account)?,
            amount: required_amount(call, csv_record.amount)?,
            memo: present(csv_record.memo),
            payload: csv_record.msg.unwrap_or_default(),
        },
        _ => return Err(LedgerError::invalid_call(&csv_record.call)),
    };

    Ok(record)
}

/// A field counts as absent when it is missing or blank
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required_account(
    call: &str,
    field: &str,
    value: Option<String>,
) -> Result<AccountId, LedgerError> {
    present(value)
        .ok_or_else(|| LedgerError::missing_field(call, field))?
        .parse()
}

fn optional_account(value: Option<String>) -> Result<Option<AccountId>, LedgerError> {
    present(value).map(|v| v.parse()).transpose()
}

fn required_amount(call: &str, value: Option<String>) -> Result<Balance, LedgerError> {
    let raw = present(value).ok_or_else(|| LedgerError::missing_field(call, "amount"))?;
    Ok(raw.parse::<U128>()?.0)
}

fn optional_amount(value: Option<String>) -> Result<Option<Balance>, LedgerError> {
    present(value)
        .map(|v| v.parse::<U128>().map(Balance::from))
        .transpose()
}

fn parse_force(value: Option<String>) -> Result<bool, LedgerError> {
    match present(value) {
        None => Ok(false),
        Some(v) => match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(LedgerError::parse_error(
                None,
                format!("'{}' is not a valid force flag", v),
            )),
        },
    }
}

/// Write account balances to CSV format
///
/// Writes accounts in CSV format with columns: account, balance.
/// Accounts are sorted by account id for deterministic output and balances
/// are written as base-10 integers.
///
/// # Arguments
///
/// * `accounts` - Slice of (account, balance) pairs to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(
    accounts: &[(AccountId, U128)],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.0.cmp(&b.0));

    for (account, balance) in sorted_accounts {
        writer
            .write_record([account.as_str(), balance.to_string().as_str()])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(call: &str, caller: &str, account: &str, amount: &str) -> CsvRecord {
        CsvRecord {
            call: call.to_string(),
            caller: Some(caller.to_string()),
            account: Some(account.to_string()),
            amount: Some(amount.to_string()),
            ..CsvRecord::default()
        }
    }

    #[test]
    fn test_convert_initialize() {
        let call = convert_csv_record(CsvRecord {
            call: "initialize".to_string(),
            account: Some("owner".to_string()),
            amount: Some("1000000000000000".to_string()),
            ..CsvRecord::default()
        })
        .unwrap();

        assert_eq!(
            call,
            LedgerCall::Initialize {
                owner: "owner".into(),
                total_supply: 1_000_000_000_000_000,
            }
        );
    }

    #[rstest]
    #[case("transfer")]
    #[case("TRANSFER")]
    #[case("  Transfer ")]
    fn test_convert_transfer_case_insensitive(#[case] name: &str) {
        let call = convert_csv_record(record(name, "alice", "bob", "19")).unwrap();
        assert_eq!(
            call,
            LedgerCall::Transfer {
                caller: "alice".into(),
                receiver: "bob".into(),
                amount: 19,
                memo: None,
            }
        );
    }

    #[test]
    fn test_convert_transfer_from_call() {
        let call = convert_csv_record(CsvRecord {
            call: "transfer_from_call".to_string(),
            caller: Some("bob".to_string()),
            account: Some("defi".to_string()),
            counterparty: Some("alice".to_string()),
            amount: Some("50".to_string()),
            msg: Some("take-my-money".to_string()),
            force: None,
            memo: Some("order 42".to_string()),
        })
        .unwrap();

        assert_eq!(
            call,
            LedgerCall::TransferFromAndNotify {
                caller: "bob".into(),
                owner: "alice".into(),
                receiver: "defi".into(),
                amount: 50,
                memo: Some("order 42".to_string()),
                payload: "take-my-money".to_string(),
            }
        );
    }

    #[rstest]
    #[case::text(Some("rent"), Some("rent"))]
    #[case::blank(Some("  "), None)]
    #[case::missing(None, None)]
    fn test_convert_transfer_memo(#[case] memo: Option<&str>, #[case] expected: Option<&str>) {
        let call = convert_csv_record(CsvRecord {
            memo: memo.map(str::to_string),
            ..record("transfer", "alice", "bob", "7")
        })
        .unwrap();

        assert_eq!(
            call,
            LedgerCall::Transfer {
                caller: "alice".into(),
                receiver: "bob".into(),
                amount: 7,
                memo: expected.map(str::to_string),
            }
        );
    }

    #[test]
    fn test_convert_register_defaults() {
        let call = convert_csv_record(CsvRecord {
            call: "register".to_string(),
            caller: Some("alice".to_string()),
            account: Some(String::new()),
            ..CsvRecord::default()
        })
        .unwrap();

        assert_eq!(
            call,
            LedgerCall::StorageRegister {
                caller: "alice".into(),
                account: None,
                deposit: None,
            }
        );
    }

    #[rstest]
    #[case::missing(None, false)]
    #[case::explicit_true(Some("true"), true)]
    #[case::numeric(Some("1"), true)]
    #[case::explicit_false(Some("FALSE"), false)]
    fn test_convert_unregister_force(#[case] force: Option<&str>, #[case] expected: bool) {
        let call = convert_csv_record(CsvRecord {
            call: "unregister".to_string(),
            caller: Some("alice".to_string()),
            force: force.map(str::to_string),
            ..CsvRecord::default()
        })
        .unwrap();

        assert_eq!(
            call,
            LedgerCall::StorageUnregister {
                caller: "alice".into(),
                force: expected,
            }
        );
    }

    #[rstest]
    #[case::invalid_call(record("mint", "alice", "bob", "1"), "Invalid call 'mint'")]
    #[case::missing_amount(record("transfer", "alice", "bob", ""), "transfer requires the 'amount' field")]
    #[case::missing_receiver(record("transfer", "alice", " ", "1"), "transfer requires the 'account' field")]
    #[case::negative_amount(record("transfer", "alice", "bob", "-5"), "not a base-10 amount")]
    #[case::decimal_amount(record("transfer", "alice", "bob", "1.5"), "not a base-10 amount")]
    #[case::missing_owner(record("transfer_from", "alice", "bob", "1"), "transfer_from requires the 'counterparty' field")]
    fn test_convert_csv_record_errors(#[case] input: CsvRecord, #[case] expected_error: &str) {
        let result = convert_csv_record(input);
        assert!(result.unwrap_err().to_string().contains(expected_error));
    }

    #[test]
    fn test_write_balances_csv_sorted() {
        let accounts = vec![
            (AccountId::from("owner"), U128(999_999_999_999_981)),
            (AccountId::from("alice"), U128(19)),
        ];
        let mut output = Vec::new();

        write_balances_csv(&accounts, &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(
            output_str,
            "account,balance\nalice,19\nowner,999999999999981\n"
        );
    }

    #[test]
    fn test_write_balances_csv_empty() {
        let mut output = Vec::new();
        write_balances_csv(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "account,balance\n");
    }
}
