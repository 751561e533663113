//! Typed capability handles to deployed units.
//!
//! A [`Handle`] binds a registry record to a ledger and a sender. The typed
//! wrappers below expose only the entry points the setup sequence needs,
//! so steps never juggle raw addresses and calldata.

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::Context;

use crate::{
    abi::{self, AbiValue},
    error::DeployError,
    ledger::{LedgerClient, PendingTx},
    registry::Registry,
    unit::UnitName,
};

/// Untyped handle to a deployed unit.
pub struct Handle<'a, L> {
    name: UnitName,
    address: Address,
    ledger: &'a L,
    sender: Address,
}

/// Look up `name` in the registry and bind it to `ledger`.
pub fn resolve_unit<'a, L: LedgerClient>(
    registry: &Registry,
    ledger: &'a L,
    sender: Address,
    name: &str,
) -> Result<Handle<'a, L>, DeployError> {
    let record = registry.get(name).ok_or_else(|| {
        DeployError::InvalidConfig(format!("unit {name} is not deployed on {}", registry.network()))
    })?;

    Ok(Handle {
        name: record.name.clone(),
        address: record.address,
        ledger,
        sender,
    })
}

impl<L: LedgerClient> Handle<'_, L> {
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Read-only call; `None` if it reverted.
    pub async fn try_read(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<Option<Bytes>> {
        self.ledger.view(self.address, method, args).await
    }

    /// Read-only call that must succeed.
    pub async fn read(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<Bytes> {
        self.try_read(method, args).await?.with_context(|| {
            format!(
                "{}.{} reverted",
                self.name,
                abi::signature(method, args)
            )
        })
    }

    pub async fn read_address(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<Address> {
        abi::decode_address(&self.read(method, args).await?, 0)
    }

    pub async fn read_uint(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<U256> {
        abi::decode_uint(&self.read(method, args).await?, 0)
    }

    pub async fn read_bool(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<bool> {
        abi::decode_bool(&self.read(method, args).await?, 0)
    }

    /// Submit a mutating call from the handle's sender.
    pub async fn send(&self, method: &str, args: &[AbiValue]) -> anyhow::Result<PendingTx> {
        tracing::debug!(
            unit = %self.name,
            call = %abi::signature(method, args),
            "Submitting call"
        );
        self.ledger.call(self.address, method, args, self.sender).await
    }
}

/// A typed view over a [`Handle`].
pub trait TypedHandle<'a, L>: Sized {
    fn bind(handle: Handle<'a, L>) -> Self;
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<'a, L>(Handle<'a, L>);

        impl<'a, L> TypedHandle<'a, L> for $name<'a, L> {
            fn bind(handle: Handle<'a, L>) -> Self {
                Self(handle)
            }
        }

        impl<L> $name<'_, L> {
            pub fn address(&self) -> Address {
                self.0.address
            }
        }
    };
}

typed_handle!(
    /// Access-control authority (governor, guardian, policy, vault).
    Authority
);
typed_handle!(
    /// Reserve treasury with per-status permissions.
    Treasury
);
typed_handle!(
    /// Staking contract.
    Staking
);
typed_handle!(
    /// Rebasing staked token.
    StakedToken
);
typed_handle!(
    /// Reward distributor.
    Distributor
);

/// Treasury permission statuses, in contract enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum TreasuryStatus {
    ReserveDepositor = 0,
    ReserveSpender = 1,
    ReserveToken = 2,
    ReserveManager = 3,
    LiquidityDepositor = 4,
    LiquidityToken = 5,
    LiquidityManager = 6,
    ReserveDebtor = 7,
    RewardManager = 8,
    StakedToken = 9,
    TokenDebtor = 10,
}

impl From<TreasuryStatus> for AbiValue {
    fn from(status: TreasuryStatus) -> Self {
        AbiValue::Enum(status as u8)
    }
}

impl<L: LedgerClient> Authority<'_, L> {
    pub async fn vault(&self) -> anyhow::Result<Address> {
        self.0.read_address("vault", &[]).await
    }

    pub async fn push_vault(
        &self,
        vault: Address,
        effective_immediately: bool,
    ) -> anyhow::Result<PendingTx> {
        self.0
            .send("pushVault", &[vault.into(), effective_immediately.into()])
            .await
    }
}

impl<L: LedgerClient> Treasury<'_, L> {
    pub async fn permissions(
        &self,
        status: TreasuryStatus,
        account: Address,
    ) -> anyhow::Result<bool> {
        self.0
            .read_bool("permissions", &[status.into(), account.into()])
            .await
    }

    /// Grant `status` to `account`. `calculator` only matters for liquidity
    /// tokens and is zero otherwise.
    pub async fn enable(
        &self,
        status: TreasuryStatus,
        account: Address,
        calculator: Address,
    ) -> anyhow::Result<PendingTx> {
        self.0
            .send("enable", &[status.into(), account.into(), calculator.into()])
            .await
    }
}

impl<L: LedgerClient> Staking<'_, L> {
    pub async fn distributor(&self) -> anyhow::Result<Address> {
        self.0.read_address("distributor", &[]).await
    }

    pub async fn set_distributor(&self, distributor: Address) -> anyhow::Result<PendingTx> {
        self.0.send("setDistributor", &[distributor.into()]).await
    }
}

impl<L: LedgerClient> StakedToken<'_, L> {
    pub async fn index(&self) -> anyhow::Result<U256> {
        self.0.read_uint("index", &[]).await
    }

    pub async fn governance_token(&self) -> anyhow::Result<Address> {
        self.0.read_address("gTOC", &[]).await
    }

    pub async fn staking_contract(&self) -> anyhow::Result<Address> {
        self.0.read_address("stakingContract", &[]).await
    }

    pub async fn set_index(&self, index: U256) -> anyhow::Result<PendingTx> {
        self.0.send("setIndex", &[index.into()]).await
    }

    pub async fn set_governance_token(&self, token: Address) -> anyhow::Result<PendingTx> {
        self.0.send("setgTOC", &[token.into()]).await
    }

    pub async fn initialize(
        &self,
        staking: Address,
        treasury: Address,
    ) -> anyhow::Result<PendingTx> {
        self.0
            .send("initialize", &[staking.into(), treasury.into()])
            .await
    }
}

impl<L: LedgerClient> Distributor<'_, L> {
    pub async fn bounty(&self) -> anyhow::Result<U256> {
        self.0.read_uint("bounty", &[]).await
    }

    /// Recipient at `index` in the distribution list, if the slot exists.
    ///
    /// `info(uint256)` returns `(rate, recipient)` and reverts past the end.
    pub async fn recipient(&self, index: u64) -> anyhow::Result<Option<(U256, Address)>> {
        let Some(data) = self.0.try_read("info", &[index.into()]).await? else {
            return Ok(None);
        };
        Ok(Some((abi::decode_uint(&data, 0)?, abi::decode_address(&data, 1)?)))
    }

    pub async fn set_bounty(&self, bounty: U256) -> anyhow::Result<PendingTx> {
        self.0.send("setBounty", &[bounty.into()]).await
    }

    pub async fn add_recipient(
        &self,
        recipient: Address,
        reward_rate: U256,
    ) -> anyhow::Result<PendingTx> {
        self.0
            .send("addRecipient", &[recipient.into(), reward_rate.into()])
            .await
    }
}
