//! In-memory ledger used by the integration tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy_core::primitives::{Address, B256, Bytes, TxHash, U256};
use keystone_deploy::{
    AbiValue, LedgerClient, PendingTx, Receipt,
    abi::{self, encode_call},
};

/// Role gating `mint` in the token used by the ordering tests.
pub const MINTER_ROLE: u64 = 0x4d;

/// A transaction seen by the mock ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Creation {
        bytecode: Bytes,
        args: Vec<AbiValue>,
        sender: Address,
    },
    Call {
        to: Address,
        method: String,
        args: Vec<AbiValue>,
        sender: Address,
    },
}

#[derive(Default)]
struct State {
    submissions: Vec<Submission>,
    pending: HashMap<TxHash, Submission>,
    storage: HashMap<(Address, Bytes), Bytes>,
    recipients: HashMap<Address, u64>,
    deployed: u64,
}

/// Ledger that confirms everything instantly and simulates the handful of
/// setters the setup sequences use.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<State>,
    failing_bytecode: HashSet<Bytes>,
    ignored_methods: HashSet<String>,
}

fn word(value: impl Into<AbiValue>) -> Bytes {
    Bytes::from(value.into().word().to_vec())
}

fn key(to: Address, method: &str, args: &[AbiValue]) -> (Address, Bytes) {
    (to, encode_call(method, args))
}

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Deterministic address of the `n`-th created contract.
pub fn contract_address(n: u64) -> Address {
    Address::from_word(B256::from(U256::from(0xc0_0000 + n)))
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject creation transactions carrying `bytecode`.
    pub fn fail_creation(mut self, bytecode: &[u8]) -> Self {
        self.failing_bytecode.insert(Bytes::copy_from_slice(bytecode));
        self
    }

    /// Confirm calls to `method` without applying their effect.
    pub fn ignore_method(mut self, method: &str) -> Self {
        self.ignored_methods.insert(method.to_string());
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn creation_count(&self) -> usize {
        self.submissions()
            .iter()
            .filter(|submission| matches!(submission, Submission::Creation { .. }))
            .count()
    }

    /// Number of mutating calls to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.called_methods()
            .iter()
            .filter(|called| called.as_str() == method)
            .count()
    }

    /// Names of the mutating calls, in submission order.
    pub fn called_methods(&self) -> Vec<String> {
        self.submissions()
            .into_iter()
            .filter_map(|submission| match submission {
                Submission::Call { method, .. } => Some(method),
                Submission::Creation { .. } => None,
            })
            .collect()
    }

    /// Bytecodes of the creations, in submission order.
    pub fn created_bytecodes(&self) -> Vec<Bytes> {
        self.submissions()
            .into_iter()
            .filter_map(|submission| match submission {
                Submission::Creation { bytecode, .. } => Some(bytecode),
                Submission::Call { .. } => None,
            })
            .collect()
    }

    fn submit(&self, submission: Submission) -> PendingTx {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(submission.clone());
        let hash = B256::from(U256::from(state.submissions.len()));
        state.pending.insert(hash, submission);
        PendingTx { hash }
    }

    fn apply_call(
        &self,
        state: &mut State,
        to: Address,
        method: &str,
        args: &[AbiValue],
    ) -> anyhow::Result<()> {
        if self.ignored_methods.contains(method) {
            return Ok(());
        }

        let arg = |i: usize| {
            args.get(i)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("{method}: missing argument {i}"))
        };

        match method {
            "pushVault" => {
                state.storage.insert(key(to, "vault", &[]), word(arg(0)?));
            }
            "enable" => {
                state
                    .storage
                    .insert(key(to, "permissions", &[arg(0)?, arg(1)?]), word(true));
            }
            "setDistributor" => {
                state.storage.insert(key(to, "distributor", &[]), word(arg(0)?));
            }
            // sToc's initializer may set the index once, before `initialize`.
            "setIndex" => {
                if state.storage.contains_key(&key(to, "index", &[]))
                    || state.storage.contains_key(&key(to, "stakingContract", &[]))
                {
                    anyhow::bail!("Transaction reverted: index already set");
                }
                state.storage.insert(key(to, "index", &[]), word(arg(0)?));
            }
            "setgTOC" => {
                state.storage.insert(key(to, "gTOC", &[]), word(arg(0)?));
            }
            "initialize" => {
                if state.storage.contains_key(&key(to, "stakingContract", &[])) {
                    anyhow::bail!("Transaction reverted: already initialized");
                }
                state
                    .storage
                    .insert(key(to, "stakingContract", &[]), word(arg(0)?));
            }
            "setBounty" => {
                state.storage.insert(key(to, "bounty", &[]), word(arg(0)?));
            }
            "addRecipient" => {
                let slot = state.recipients.entry(to).or_default();
                let index = *slot;
                *slot += 1;

                let mut info = arg(1)?.word().to_vec();
                info.extend_from_slice(arg(0)?.word().as_slice());
                state
                    .storage
                    .insert(key(to, "info", &[index.into()]), Bytes::from(info));
            }
            "grantRole" => {
                state
                    .storage
                    .insert(key(to, "hasRole", &[arg(0)?, arg(1)?]), word(true));
            }
            "mint" => {
                let account = arg(0)?;
                let role = key(to, "hasRole", &[MINTER_ROLE.into(), account]);
                if !state.storage.contains_key(&role) {
                    anyhow::bail!("Transaction reverted: account is not a minter");
                }
                state
                    .storage
                    .insert(key(to, "balanceOf", &[account]), word(arg(1)?));
            }
            other => anyhow::bail!("Transaction reverted: unknown method {other}"),
        }
        Ok(())
    }
}

impl LedgerClient for MockLedger {
    async fn submit_creation(
        &self,
        bytecode: &Bytes,
        args: &[AbiValue],
        sender: Address,
    ) -> anyhow::Result<PendingTx> {
        if self.failing_bytecode.contains(bytecode) {
            anyhow::bail!("insufficient funds for gas");
        }
        Ok(self.submit(Submission::Creation {
            bytecode: bytecode.clone(),
            args: args.to_vec(),
            sender,
        }))
    }

    async fn call(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
        sender: Address,
    ) -> anyhow::Result<PendingTx> {
        Ok(self.submit(Submission::Call {
            to,
            method: method.to_string(),
            args: args.to_vec(),
            sender,
        }))
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> anyhow::Result<Receipt> {
        let mut state = self.state.lock().unwrap();
        let submission = state
            .pending
            .remove(&tx.hash)
            .ok_or_else(|| anyhow::anyhow!("unknown transaction {}", tx.hash))?;

        let contract_address = match submission {
            Submission::Creation { .. } => {
                state.deployed += 1;
                Some(contract_address(state.deployed))
            }
            Submission::Call {
                to, method, args, ..
            } => {
                self.apply_call(&mut state, to, &method, &args)?;
                None
            }
        };

        Ok(Receipt {
            tx_hash: tx.hash,
            block_number: Some(state.submissions.len() as u64),
            contract_address,
        })
    }

    async fn view(
        &self,
        to: Address,
        method: &str,
        args: &[AbiValue],
    ) -> anyhow::Result<Option<Bytes>> {
        let state = self.state.lock().unwrap();
        if let Some(data) = state.storage.get(&key(to, method, args)) {
            return Ok(Some(data.clone()));
        }

        // Array getters revert past the end; everything else reads as zero.
        Ok(match method {
            "info" => None,
            _ => Some(word(U256::ZERO)),
        })
    }
}

/// Decode a single return word as an address.
pub fn as_address(data: &Bytes) -> Address {
    abi::decode_address(data, 0).unwrap()
}
