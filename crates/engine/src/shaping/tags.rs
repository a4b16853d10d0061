//! The closed set of operation-type tags.
//!
//! Grounded in `sbds.storages.db.enums.operation_types_enum`: adding a new
//! tag means adding a variant here, a table in the schema registry, and a
//! shaper arm in [`super::shape_operation`] together.

use std::fmt;
use std::str::FromStr;

use crate::error::ShapingError;

/// One of the closed set of operation tags the upstream emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum OperationType {
    AccountCreate,
    AccountCreateWithDelegation,
    AccountUpdate,
    AccountWitnessProxy,
    AccountWitnessVote,
    AuthorReward,
    CancelTransferFromSavings,
    ChallengeAuthority,
    ChangeRecoveryAccount,
    ClaimRewardBalance,
    Comment,
    CommentBenefactorReward,
    CommentOptions,
    CommentPayoutUpdate,
    CommentReward,
    Convert,
    CurationReward,
    Custom,
    CustomBinary,
    CustomJson,
    DeclineVotingRights,
    DelegateVestingShares,
    DeleteComment,
    EscrowApprove,
    EscrowDispute,
    EscrowRelease,
    EscrowTransfer,
    FeedPublish,
    FillConvertRequest,
    FillOrder,
    FillTransferFromSavings,
    FillVestingWithdraw,
    Hardfork,
    Interest,
    LimitOrderCancel,
    LimitOrderCreate,
    LimitOrderCreate2,
    LiquidityReward,
    Pow,
    Pow2,
    ProducerReward,
    ProveAuthority,
    RecoverAccount,
    ReportOverProduction,
    RequestAccountRecovery,
    ResetAccount,
    ReturnVestingDelegation,
    SetResetAccount,
    SetWithdrawVestingRoute,
    ShutdownWitness,
    Transfer,
    TransferFromSavings,
    TransferToSavings,
    TransferToVesting,
    Vote,
    WithdrawVesting,
    WitnessUpdate,
}

impl OperationType {
    /// All tags, in the order the upstream enum declares them.
    pub const ALL: &'static [Self] = &[
        Self::AccountCreate,
        Self::AccountCreateWithDelegation,
        Self::AccountUpdate,
        Self::AccountWitnessProxy,
        Self::AccountWitnessVote,
        Self::AuthorReward,
        Self::CancelTransferFromSavings,
        Self::ChallengeAuthority,
        Self::ChangeRecoveryAccount,
        Self::ClaimRewardBalance,
        Self::Comment,
        Self::CommentBenefactorReward,
        Self::CommentOptions,
        Self::CommentPayoutUpdate,
        Self::CommentReward,
        Self::Convert,
        Self::CurationReward,
        Self::Custom,
        Self::CustomBinary,
        Self::CustomJson,
        Self::DeclineVotingRights,
        Self::DelegateVestingShares,
        Self::DeleteComment,
        Self::EscrowApprove,
        Self::EscrowDispute,
        Self::EscrowRelease,
        Self::EscrowTransfer,
        Self::FeedPublish,
        Self::FillConvertRequest,
        Self::FillOrder,
        Self::FillTransferFromSavings,
        Self::FillVestingWithdraw,
        Self::Hardfork,
        Self::Interest,
        Self::LimitOrderCancel,
        Self::LimitOrderCreate,
        Self::LimitOrderCreate2,
        Self::LiquidityReward,
        Self::Pow,
        Self::Pow2,
        Self::ProducerReward,
        Self::ProveAuthority,
        Self::RecoverAccount,
        Self::ReportOverProduction,
        Self::RequestAccountRecovery,
        Self::ResetAccount,
        Self::ReturnVestingDelegation,
        Self::SetResetAccount,
        Self::SetWithdrawVestingRoute,
        Self::ShutdownWitness,
        Self::Transfer,
        Self::TransferFromSavings,
        Self::TransferToSavings,
        Self::TransferToVesting,
        Self::Vote,
        Self::WithdrawVesting,
        Self::WitnessUpdate,
    ];

    /// The tag's wire form, e.g. `"account_witness_proxy"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountCreate => "account_create",
            Self::AccountCreateWithDelegation => "account_create_with_delegation",
            Self::AccountUpdate => "account_update",
            Self::AccountWitnessProxy => "account_witness_proxy",
            Self::AccountWitnessVote => "account_witness_vote",
            Self::AuthorReward => "author_reward",
            Self::CancelTransferFromSavings => "cancel_transfer_from_savings",
            Self::ChallengeAuthority => "challenge_authority",
            Self::ChangeRecoveryAccount => "change_recovery_account",
            Self::ClaimRewardBalance => "claim_reward_balance",
            Self::Comment => "comment",
            Self::CommentBenefactorReward => "comment_benefactor_reward",
            Self::CommentOptions => "comment_options",
            Self::CommentPayoutUpdate => "comment_payout_update",
            Self::CommentReward => "comment_reward",
            Self::Convert => "convert",
            Self::CurationReward => "curation_reward",
            Self::Custom => "custom",
            Self::CustomBinary => "custom_binary",
            Self::CustomJson => "custom_json",
            Self::DeclineVotingRights => "decline_voting_rights",
            Self::DelegateVestingShares => "delegate_vesting_shares",
            Self::DeleteComment => "delete_comment",
            Self::EscrowApprove => "escrow_approve",
            Self::EscrowDispute => "escrow_dispute",
            Self::EscrowRelease => "escrow_release",
            Self::EscrowTransfer => "escrow_transfer",
            Self::FeedPublish => "feed_publish",
            Self::FillConvertRequest => "fill_convert_request",
            Self::FillOrder => "fill_order",
            Self::FillTransferFromSavings => "fill_transfer_from_savings",
            Self::FillVestingWithdraw => "fill_vesting_withdraw",
            Self::Hardfork => "hardfork",
            Self::Interest => "interest",
            Self::LimitOrderCancel => "limit_order_cancel",
            Self::LimitOrderCreate => "limit_order_create",
            Self::LimitOrderCreate2 => "limit_order_create2",
            Self::LiquidityReward => "liquidity_reward",
            Self::Pow => "pow",
            Self::Pow2 => "pow2",
            Self::ProducerReward => "producer_reward",
            Self::ProveAuthority => "prove_authority",
            Self::RecoverAccount => "recover_account",
            Self::ReportOverProduction => "report_over_production",
            Self::RequestAccountRecovery => "request_account_recovery",
            Self::ResetAccount => "reset_account",
            Self::ReturnVestingDelegation => "return_vesting_delegation",
            Self::SetResetAccount => "set_reset_account",
            Self::SetWithdrawVestingRoute => "set_withdraw_vesting_route",
            Self::ShutdownWitness => "shutdown_witness",
            Self::Transfer => "transfer",
            Self::TransferFromSavings => "transfer_from_savings",
            Self::TransferToSavings => "transfer_to_savings",
            Self::TransferToVesting => "transfer_to_vesting",
            Self::Vote => "vote",
            Self::WithdrawVesting => "withdraw_vesting",
            Self::WitnessUpdate => "witness_update",
        }
    }

    /// Whether this tag is ledger-emitted (no `trx_id`) rather than signed by
    /// a user transaction.
    pub const fn is_virtual(self) -> bool {
        matches!(
            self,
            Self::AuthorReward
                | Self::CommentBenefactorReward
                | Self::CommentReward
                | Self::CurationReward
                | Self::FillConvertRequest
                | Self::FillOrder
                | Self::FillTransferFromSavings
                | Self::FillVestingWithdraw
                | Self::Hardfork
                | Self::Interest
                | Self::LiquidityReward
                | Self::ProducerReward
                | Self::ReturnVestingDelegation
                | Self::ShutdownWitness
        )
    }

    /// Destination table for rows of this operation type.
    pub fn table_name(self) -> String {
        format!("op_{}", self.as_str())
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ShapingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| ShapingError::UnknownOperationType(s.to_owned()))
    }
}
