//! CSV format handling for spend requests and ledger exports
//!
//! This module centralizes all CSV format concerns, providing:
//! - SpendRow structure for deserializing batched spend requests
//! - Account and transfer export serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{Account, TransferRecord};
use serde::Deserialize;
use std::io::Write;

/// One spend request, columns: renter, provider
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SpendRow {
    pub renter: String,
    pub provider: String,
}

impl SpendRow {
    /// Reject rows with blank fields
    pub fn validate(self) -> Result<SpendRow, String> {
        if self.renter.trim().is_empty() {
            return Err(format!("Spend for provider '{}' has no renter", self.provider));
        }
        if self.provider.trim().is_empty() {
            return Err(format!("Spend by '{}' has no provider", self.renter));
        }
        Ok(self)
    }
}

/// Write account states to CSV format
///
/// Columns: wallet, balance, banned. Balances are decimal integers in the
/// smallest unit. Accounts are sorted by wallet for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["wallet", "balance", "banned"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.wallet.cmp(&b.wallet));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.wallet.to_string(),
                account.balance.to_string(),
                account.banned.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write transfer records to CSV format, in the order given
///
/// Columns: id, from, to, provider, gross, fee, timestamp (RFC 3339).
pub fn write_transfers_csv(
    transfers: &[TransferRecord],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["id", "from", "to", "provider", "gross", "fee", "timestamp"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for transfer in transfers {
        writer
            .write_record(&[
                transfer.id.to_string(),
                transfer.from_wallet.to_string(),
                transfer.to_wallet.to_string(),
                transfer.provider_id.clone(),
                transfer.gross_amount.to_string(),
                transfer.fee_amount.to_string(),
                transfer.timestamp.to_rfc3339(),
            ])
            .map_err(|e| format!("Failed to write transfer record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Wallet;
    use chrono::{TimeZone, Utc};
    use primitive_types::U256;
    use rstest::rstest;

    fn account(wallet: &str, balance: u64, banned: bool) -> Account {
        Account {
            wallet: Wallet::parse(wallet).unwrap(),
            balance: U256::from(balance),
            banned,
        }
    }

    #[rstest]
    #[case::valid("0xabc", "NODE_ALPHA", true)]
    #[case::blank_renter("  ", "NODE_ALPHA", false)]
    #[case::blank_provider("0xabc", "", false)]
    fn test_spend_row_validate(
        #[case] renter: &str,
        #[case] provider: &str,
        #[case] valid: bool,
    ) {
        let row = SpendRow {
            renter: renter.to_string(),
            provider: provider.to_string(),
        };

        assert_eq!(row.validate().is_ok(), valid);
    }

    #[rstest]
    #[case::single_account(
        vec![account("0xaa", 100, false)],
        "wallet,balance,banned\n0xaa,100,false\n"
    )]
    #[case::sorted_by_wallet(
        vec![account("0xcc", 3, false), account("0xaa", 1, false), account("0xbb", 2, true)],
        "wallet,balance,banned\n0xaa,1,false\n0xbb,2,true\n0xcc,3,false\n"
    )]
    #[case::empty_accounts(vec![], "wallet,balance,banned\n")]
    fn test_write_accounts_csv(#[case] accounts: Vec<Account>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        let result = write_accounts_csv(&accounts, &mut output);
        assert!(result.is_ok());

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str, expected_output);
    }

    #[test]
    fn test_write_accounts_csv_prints_full_precision() {
        let mut whale = account("0xaa", 0, false);
        whale.balance = U256::MAX;

        let mut output = Vec::new();
        write_accounts_csv(&[whale], &mut output).unwrap();

        let output_str = String::from_utf8(output).unwrap();
        assert!(output_str.contains(
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        ));
    }

    #[test]
    fn test_write_transfers_csv_keeps_order() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let transfers = vec![
            TransferRecord {
                id: 2,
                from_wallet: Wallet::parse("0xrenter").unwrap(),
                to_wallet: Wallet::parse("0xnode").unwrap(),
                provider_id: "NODE_BRAVO".to_string(),
                fee_amount: U256::from(50),
                gross_amount: U256::from(5000),
                timestamp: at,
            },
            TransferRecord {
                id: 1,
                from_wallet: Wallet::parse("0xrenter").unwrap(),
                to_wallet: Wallet::parse("0xnode").unwrap(),
                provider_id: "NODE_ALPHA".to_string(),
                fee_amount: U256::from(1),
                gross_amount: U256::from(100),
                timestamp: at,
            },
        ];

        let mut output = Vec::new();
        write_transfers_csv(&transfers, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,from,to,provider,gross,fee,timestamp\n\
             2,0xrenter,0xnode,NODE_BRAVO,5000,50,2024-05-01T12:00:00+00:00\n\
             1,0xrenter,0xnode,NODE_ALPHA,100,1,2024-05-01T12:00:00+00:00\n"
        );
    }
}
