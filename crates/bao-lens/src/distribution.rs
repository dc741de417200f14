//! Locked BAO distribution of an account.

use anyhow::Context;
use bao_calc::scale_down;
use bao_chain::{ContractCall, ReadRequest, ReadResult};
use bao_types::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::context::LensContext;

pub const DISTRIBUTION: &str = "distribution";

const BAO_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionInfo {
    /// `None` until the account starts its distribution.
    pub date_started: Option<DateTime<Utc>>,
    pub date_ended: Option<DateTime<Utc>>,
    pub last_claim: Option<DateTime<Utc>>,
    /// Whole BAO owed over the full distribution.
    pub amount_owed_total: Decimal,
}

impl DistributionInfo {
    pub const fn has_started(&self) -> bool {
        self.date_started.is_some()
    }

    pub const fn has_ended(&self) -> bool {
        self.date_ended.is_some()
    }
}

/// Unix seconds, zero meaning unset.
fn timestamp(seconds: u64) -> anyhow::Result<Option<DateTime<Utc>>> {
    if seconds == 0 {
        return Ok(None);
    }
    let parsed = i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .with_context(|| format!("timestamp {seconds} out of range"))?;
    Ok(Some(parsed))
}

pub async fn fetch_distribution(
    ctx: LensContext,
    account: Address,
) -> anyhow::Result<DistributionInfo> {
    let contract = ctx
        .network
        .distribution
        .context("no distribution configured for this network")?;

    let request = ReadRequest::new(contract, ContractCall::Distribution { account });
    let raw = ctx
        .read(vec![((), request)])
        .await
        .take(&())
        .and_then(ReadResult::into_distribution)
        .context("reading distribution")?;

    Ok(DistributionInfo {
        date_started: timestamp(raw.date_started)?,
        date_ended: timestamp(raw.date_ended)?,
        last_claim: timestamp(raw.last_claim)?,
        amount_owed_total: scale_down(raw.amount_owed_total, BAO_DECIMALS)?,
    })
}
