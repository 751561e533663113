//! [`LedgerClient`] backed by an Ethereum JSON-RPC node.
//!
//! Transactions are sent with `eth_sendTransaction` from an account the node
//! manages (a dev node such as Anvil or Hardhat, or a signer proxy).

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash, U64};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::{LedgerClient, PendingTx, Receipt};
use crate::{
    abi::{self, AbiValue},
    rpc::{self, RpcError},
};

/// How receipts are polled while waiting for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    /// Delay between `eth_getTransactionReceipt` polls.
    pub poll_interval_ms: u64,
    /// Give up after this many polls. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_polls: Option<usize>,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_polls: None,
        }
    }
}

/// Raw receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    block_number: Option<U64>,
    contract_address: Option<Address>,
    status: Option<U64>,
}

impl RpcReceipt {
    fn into_receipt(self) -> anyhow::Result<Receipt> {
        if self.status == Some(U64::ZERO) {
            return Err(Reverted(self.transaction_hash).into());
        }

        Ok(Receipt {
            tx_hash: self.transaction_hash,
            block_number: self.block_number.map(|n| n.to::<u64>()),
            contract_address: self.contract_address,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("transaction {0} is not yet included")]
struct NotYetIncluded(TxHash);

/// The receipt reports a failed execution.
#[derive(Debug, thiserror::Error)]
#[error("transaction {0} reverted")]
struct Reverted(TxHash);

/// JSON-RPC ledger client.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: Url,
    confirmation: ConfirmationPolicy,
}

impl JsonRpcLedger {
    pub fn new(url: Url, confirmation: ConfirmationPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            url,
            confirmation,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> anyhow::Result<T> {
        rpc::json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// Chain ID reported by the node.
    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(id.to::<u64>())
    }

    /// First account managed by the node, used when no deployer is configured.
    pub async fn default_account(&self) -> anyhow::Result<Address> {
        let accounts: Vec<Address> = self.request("eth_accounts", vec![]).await?;
        accounts
            .first()
            .copied()
            .context("Node manages no accounts; configure a deployer address")
    }

    async fn send_transaction(
        &self,
        sender: Address,
        to: Option<Address>,
        data: Bytes,
    ) -> anyhow::Result<PendingTx> {
        let mut tx = json!({
            "from": sender,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = json!(to);
        }

        let hash: TxHash = self.request("eth_sendTransaction", vec![tx]).await?;
        tracing::debug!(tx_hash = %hash, "Transaction submitted");

        Ok(PendingTx { hash })
    }

    async fn fetch_receipt(&self, hash: TxHash) -> anyhow::Result<Receipt> {
        let receipt: Option<RpcReceipt> = self
            .request("eth_getTransactionReceipt", vec![json!(hash)])
            .await?;

        match receipt {
            Some(receipt) => receipt.into_receipt(),
            None => Err(NotYetIncluded(hash).into()),
        }
    }
}

impl LedgerClient for JsonRpcLedger {
    async fn submit_creation(
        &self,
        bytecode: &Bytes,
        args: &[AbiValue],
        sender: Address,
    ) -> anyhow::Result<PendingTx> {
        let data = abi::encode_creation(bytecode, args);
        self.send_transaction(sender, None, data)
            .await
            .context("Failed to submit creation transaction")
    }

    async fn call(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
        sender: Address,
    ) -> anyhow::Result<PendingTx> {
        let data = abi::encode_call(method, args);
        self.send_transaction(sender, Some(to), data)
            .await
            .with_context(|| format!("Failed to submit {}", abi::signature(method, args)))
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> anyhow::Result<Receipt> {
        let backoff = ConstantBuilder::default()
            .with_delay(Duration::from_millis(self.confirmation.poll_interval_ms))
            .with_max_times(self.confirmation.max_polls.unwrap_or(usize::MAX));

        let hash = tx.hash;
        (|| async { self.fetch_receipt(hash).await })
            .retry(backoff)
            // Reverts are final; keep polling through pending and transport errors.
            .when(|err| !is_revert(err))
            .notify(|err, delay| {
                tracing::trace!(tx_hash = %hash, error = %err, ?delay, "Waiting for confirmation");
            })
            .await
            .with_context(|| format!("Failed to confirm transaction {}", hash))
    }

    async fn view(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
    ) -> anyhow::Result<Option<Bytes>> {
        let data = abi::encode_call(method, args);
        let result: anyhow::Result<Bytes> = self
            .request(
                "eth_call",
                vec![json!({"to": to, "data": data}), json!("latest")],
            )
            .await;

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.downcast_ref::<RpcError>().is_some_and(RpcError::is_revert) => {
                Ok(None)
            }
            Err(err) => Err(err.context(format!("Failed to read {}", abi::signature(method, args)))),
        }
    }
}

fn is_revert(err: &anyhow::Error) -> bool {
    err.is::<Reverted>()
        || err
            .downcast_ref::<RpcError>()
            .is_some_and(RpcError::is_revert)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_with_contract_address() {
        let raw: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "blockNumber": "0x1b4",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1"
        }))
        .unwrap();

        let receipt = raw.into_receipt().unwrap();
        assert_eq!(receipt.block_number, Some(436));
        assert_eq!(
            receipt.contract_address,
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap())
        );
    }

    #[test]
    fn test_reverted_receipt_is_an_error() {
        let raw: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000bb",
            "blockNumber": "0x2",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();

        let err = raw.into_receipt().unwrap_err();
        assert!(is_revert(&err));
        assert_eq!(
            err.downcast_ref::<Reverted>().map(|reverted| reverted.0),
            Some(TxHash::with_last_byte(0xbb))
        );
    }

    #[test]
    fn test_revert_word_in_other_errors_keeps_polling() {
        let err = anyhow::anyhow!("upstream proxy reverted to http/1.1");
        assert!(!is_revert(&err));
    }

    #[test]
    fn test_pending_is_not_a_revert() {
        let err: anyhow::Error = NotYetIncluded(TxHash::ZERO).into();
        assert!(!is_revert(&err));
    }

    #[test]
    fn test_default_policy_waits_indefinitely() {
        let policy = ConfirmationPolicy::default();
        assert_eq!(policy.max_polls, None);
        assert_eq!(policy.poll_interval_ms, 1_000);
    }
}
