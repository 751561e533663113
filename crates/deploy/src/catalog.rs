//! The Triumph protocol: its deployable units and its setup sequence.

use alloy_core::primitives::{Address, U256};
use futures::future::BoxFuture;

use crate::{
    config::ProtocolParams,
    handles::{Authority, Distributor, Staking, StakedToken, Treasury, TreasuryStatus},
    ledger::{LedgerClient, PendingTx},
    setup::{ConfigurationStep, SetupPlan, StepContext},
    unit::{UnitDescriptor, UnitName},
};

pub const AUTHORITY: &str = "authority";
pub const TOC: &str = "toc";
pub const STAKED_TOC: &str = "sToc";
pub const GOVERNANCE_TOC: &str = "gToc";
pub const TREASURY: &str = "treasury";
pub const BONDING_CALCULATOR: &str = "bondingCalculator";
pub const STAKING: &str = "staking";
pub const DISTRIBUTOR: &str = "distributor";
pub const BOND_TOC: &str = "bToc";
pub const GOVERNOR: &str = "governor";

/// Every deployable unit, in declaration order.
pub fn units(params: &ProtocolParams) -> Vec<UnitDescriptor> {
    let timelock = params.treasury_timelock;
    let epoch_length = params.epoch_length_in_blocks;
    let first_epoch_number = params.first_epoch_number;
    let first_epoch_time = params.first_epoch_time;

    vec![
        UnitDescriptor::new(AUTHORITY, "TriumphAuthority")
            // governor, guardian, policy, vault
            .args(|ctx| Ok(vec![ctx.deployer.into(); 4]))
            .tags(["authority"]),
        UnitDescriptor::new(TOC, "TriumphERC20Token")
            .depends_on([AUTHORITY])
            .args(|ctx| Ok(vec![ctx.address(AUTHORITY)?.into()]))
            .tags(["toc", "token"]),
        UnitDescriptor::new(STAKED_TOC, "sTriumph").tags(["sToc", "token"]),
        UnitDescriptor::new(GOVERNANCE_TOC, "gTOC")
            .depends_on([STAKED_TOC])
            // migrator, sToc
            .args(|ctx| Ok(vec![ctx.deployer.into(), ctx.address(STAKED_TOC)?.into()]))
            .tags(["gToc", "token"]),
        UnitDescriptor::new(TREASURY, "TriumphTreasury")
            .depends_on([TOC, AUTHORITY])
            .args(move |ctx| {
                Ok(vec![
                    ctx.address(TOC)?.into(),
                    timelock.into(),
                    ctx.address(AUTHORITY)?.into(),
                ])
            })
            .tags(["treasury"]),
        UnitDescriptor::new(BONDING_CALCULATOR, "TriumphBondingCalculator")
            .depends_on([TOC])
            .args(|ctx| Ok(vec![ctx.address(TOC)?.into()]))
            .tags(["staking", "bonding"]),
        UnitDescriptor::new(STAKING, "TriumphStaking")
            .depends_on([TOC, STAKED_TOC, AUTHORITY])
            .args(move |ctx| {
                Ok(vec![
                    ctx.address(TOC)?.into(),
                    ctx.address(STAKED_TOC)?.into(),
                    epoch_length.into(),
                    first_epoch_number.into(),
                    first_epoch_time.into(),
                    ctx.address(AUTHORITY)?.into(),
                ])
            })
            .idempotent(false)
            .tags(["staking"]),
        UnitDescriptor::new(DISTRIBUTOR, "Distributor")
            .depends_on([TREASURY, TOC, STAKING, AUTHORITY, BONDING_CALCULATOR])
            .args(|ctx| {
                Ok(vec![
                    ctx.address(TREASURY)?.into(),
                    ctx.address(TOC)?.into(),
                    ctx.address(STAKING)?.into(),
                    ctx.address(AUTHORITY)?.into(),
                ])
            })
            .idempotent(false)
            .tags(["staking"]),
        UnitDescriptor::new(BOND_TOC, "bTOC")
            .depends_on([AUTHORITY])
            .args(|ctx| Ok(vec![ctx.address(AUTHORITY)?.into()]))
            .tags(["governance"]),
        UnitDescriptor::new(GOVERNOR, "TriumphGovernor")
            .depends_on([BOND_TOC])
            // voting token, vetoer
            .args(|ctx| Ok(vec![ctx.address(BOND_TOC)?.into(), ctx.deployer.into()]))
            .tags(["governance"]),
    ]
}

/// One wiring call of the Triumph setup sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriumphStep {
    /// Make the treasury the authority's vault.
    PushVault,
    /// Let the distributor mint rewards from the treasury.
    EnableRewardManager,
    SetDistributor,
    SetIndex(U256),
    SetGovernanceToken,
    InitializeStakedToken,
    SetBounty(U256),
    /// Register staking as a reward recipient.
    AddStakingRecipient(U256),
}

/// The setup sequence, in execution order.
pub fn setup_plan<L: LedgerClient>(params: &ProtocolParams) -> SetupPlan<L> {
    SetupPlan::new()
        .then(TriumphStep::PushVault)
        .then(TriumphStep::EnableRewardManager)
        .then(TriumphStep::SetDistributor)
        .then(TriumphStep::SetIndex(U256::from(params.initial_index)))
        .then(TriumphStep::SetGovernanceToken)
        .then(TriumphStep::InitializeStakedToken)
        .then(TriumphStep::SetBounty(U256::from(params.bounty_amount)))
        .then(TriumphStep::AddStakingRecipient(U256::from(
            params.initial_reward_rate,
        )))
}

impl TriumphStep {
    fn inputs(&self) -> &'static [&'static str] {
        match self {
            Self::PushVault => &[AUTHORITY, TREASURY],
            Self::EnableRewardManager => &[TREASURY, DISTRIBUTOR],
            Self::SetDistributor => &[STAKING, DISTRIBUTOR],
            Self::SetIndex(_) => &[STAKED_TOC],
            Self::SetGovernanceToken => &[STAKED_TOC, GOVERNANCE_TOC],
            Self::InitializeStakedToken => &[STAKED_TOC, STAKING, TREASURY],
            Self::SetBounty(_) => &[DISTRIBUTOR],
            Self::AddStakingRecipient(_) => &[DISTRIBUTOR, STAKING],
        }
    }

    async fn check<L: LedgerClient>(&self, ctx: StepContext<'_, L>) -> anyhow::Result<bool> {
        Ok(match self {
            Self::PushVault => {
                let authority: Authority<'_, L> = ctx.resolve(AUTHORITY)?;
                authority.vault().await? == ctx.address(TREASURY)?
            }
            Self::EnableRewardManager => {
                let treasury: Treasury<'_, L> = ctx.resolve(TREASURY)?;
                treasury
                    .permissions(TreasuryStatus::RewardManager, ctx.address(DISTRIBUTOR)?)
                    .await?
            }
            Self::SetDistributor => {
                let staking: Staking<'_, L> = ctx.resolve(STAKING)?;
                staking.distributor().await? == ctx.address(DISTRIBUTOR)?
            }
            Self::SetIndex(_) => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                !stoc.index().await?.is_zero()
            }
            Self::SetGovernanceToken => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                stoc.governance_token().await? == ctx.address(GOVERNANCE_TOC)?
            }
            // `initialize` only succeeds once, whatever staking address it got.
            Self::InitializeStakedToken => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                stoc.staking_contract().await? != Address::ZERO
            }
            Self::SetBounty(amount) => {
                let distributor: Distributor<'_, L> = ctx.resolve(DISTRIBUTOR)?;
                distributor.bounty().await? == *amount
            }
            Self::AddStakingRecipient(_) => {
                let distributor: Distributor<'_, L> = ctx.resolve(DISTRIBUTOR)?;
                let staking = ctx.address(STAKING)?;
                let mut index = 0;
                loop {
                    match distributor.recipient(index).await? {
                        Some((_, recipient)) if recipient == staking => break true,
                        Some(_) => index += 1,
                        None => break false,
                    }
                }
            }
        })
    }

    async fn submit<L: LedgerClient>(&self, ctx: StepContext<'_, L>) -> anyhow::Result<PendingTx> {
        match self {
            Self::PushVault => {
                let authority: Authority<'_, L> = ctx.resolve(AUTHORITY)?;
                authority.push_vault(ctx.address(TREASURY)?, true).await
            }
            Self::EnableRewardManager => {
                let treasury: Treasury<'_, L> = ctx.resolve(TREASURY)?;
                treasury
                    .enable(
                        TreasuryStatus::RewardManager,
                        ctx.address(DISTRIBUTOR)?,
                        Address::ZERO,
                    )
                    .await
            }
            Self::SetDistributor => {
                let staking: Staking<'_, L> = ctx.resolve(STAKING)?;
                staking.set_distributor(ctx.address(DISTRIBUTOR)?).await
            }
            Self::SetIndex(index) => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                stoc.set_index(*index).await
            }
            Self::SetGovernanceToken => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                stoc.set_governance_token(ctx.address(GOVERNANCE_TOC)?).await
            }
            Self::InitializeStakedToken => {
                let stoc: StakedToken<'_, L> = ctx.resolve(STAKED_TOC)?;
                stoc.initialize(ctx.address(STAKING)?, ctx.address(TREASURY)?)
                    .await
            }
            Self::SetBounty(amount) => {
                let distributor: Distributor<'_, L> = ctx.resolve(DISTRIBUTOR)?;
                distributor.set_bounty(*amount).await
            }
            Self::AddStakingRecipient(rate) => {
                let distributor: Distributor<'_, L> = ctx.resolve(DISTRIBUTOR)?;
                distributor
                    .add_recipient(ctx.address(STAKING)?, *rate)
                    .await
            }
        }
    }
}

impl<L: LedgerClient> ConfigurationStep<L> for TriumphStep {
    fn description(&self) -> String {
        match self {
            Self::PushVault => "authority.pushVault(treasury, true)".to_string(),
            Self::EnableRewardManager => {
                "treasury.enable(REWARDMANAGER, distributor, 0x0)".to_string()
            }
            Self::SetDistributor => "staking.setDistributor(distributor)".to_string(),
            Self::SetIndex(index) => format!("sToc.setIndex({index})"),
            Self::SetGovernanceToken => "sToc.setgTOC(gToc)".to_string(),
            Self::InitializeStakedToken => "sToc.initialize(staking, treasury)".to_string(),
            Self::SetBounty(amount) => format!("distributor.setBounty({amount})"),
            Self::AddStakingRecipient(rate) => {
                format!("distributor.addRecipient(staking, {rate})")
            }
        }
    }

    fn requires(&self) -> Vec<UnitName> {
        self.inputs().iter().copied().map(UnitName::from).collect()
    }

    fn is_applied<'a>(&'a self, ctx: StepContext<'a, L>) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(self.check(ctx))
    }

    fn apply<'a>(&'a self, ctx: StepContext<'a, L>) -> BoxFuture<'a, anyhow::Result<PendingTx>> {
        Box::pin(self.submit(ctx))
    }
}
