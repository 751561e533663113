//! Ledger client abstraction.
//!
//! The pipeline only talks to the chain through [`LedgerClient`]: submit a
//! creation or a call, wait for it to be included, and read state.

mod json_rpc;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes, TxHash};

use crate::abi::AbiValue;

pub use json_rpc::{ConfirmationPolicy, JsonRpcLedger};

/// A submitted, not yet confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: TxHash,
}

/// Confirmation of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
}

/// Capability to submit transactions to, and read from, a ledger.
///
/// Implementations must not report a transaction as confirmed unless it was
/// included and executed successfully; a reverted transaction is an error
/// from [`LedgerClient::wait_for_confirmation`].
pub trait LedgerClient: Send + Sync + 'static {
    /// Submit a contract creation with encoded constructor arguments.
    fn submit_creation(
        &self,
        bytecode: &Bytes,
        args: &[AbiValue],
        sender: Address,
    ) -> impl Future<Output = anyhow::Result<PendingTx>> + Send;

    /// Submit a mutating call to `method` on the contract at `to`.
    fn call(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
        sender: Address,
    ) -> impl Future<Output = anyhow::Result<PendingTx>> + Send;

    /// Suspend until `tx` is included, returning its receipt.
    fn wait_for_confirmation(
        &self,
        tx: &PendingTx,
    ) -> impl Future<Output = anyhow::Result<Receipt>> + Send;

    /// Read-only call. Returns `None` when the read reverts.
    fn view(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
    ) -> impl Future<Output = anyhow::Result<Option<Bytes>>> + Send;
}
