//! Transaction status state machine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

/// Lifecycle status of a transaction/order.
///
/// State transitions:
/// ```text
///            ┌──► APPROVED  (final)
///            ├──► DECLINED  (final)
/// PENDING ───┼──► VOIDED    (final)
///            └──► ERROR ────┬──► APPROVED / DECLINED / VOIDED
///                           └──► (retry stays in ERROR)
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Approved,
    Declined,
    Error,
    Voided,
}

impl TransactionStatus {
    /// Whether `self -> target` is a legal transition.
    ///
    /// From PENDING every target is legal, PENDING included. From ERROR every
    /// target except PENDING is legal, so a failed gateway attempt can still
    /// be settled by a later call. Final statuses accept nothing, not even
    /// themselves; repeating the current status is handled as a no-op by
    /// `Transaction::update_status` before this gate is consulted.
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        match self {
            TransactionStatus::Pending => true,
            TransactionStatus::Error => target != TransactionStatus::Pending,
            TransactionStatus::Approved
            | TransactionStatus::Declined
            | TransactionStatus::Voided => false,
        }
    }

    /// APPROVED, DECLINED and VOIDED are final. ERROR is not.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Approved | TransactionStatus::Declined | TransactionStatus::Voided
        )
    }

    /// PENDING or ERROR: the record may still reach a final status.
    pub fn is_settleable(&self) -> bool {
        !self.is_final()
    }

    pub fn is_pending(&self) -> bool {
        *self == TransactionStatus::Pending
    }

    pub fn is_approved(&self) -> bool {
        *self == TransactionStatus::Approved
    }

    pub fn is_declined(&self) -> bool {
        *self == TransactionStatus::Declined
    }

    pub fn is_error(&self) -> bool {
        *self == TransactionStatus::Error
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::Error => "ERROR",
            TransactionStatus::Voided => "VOIDED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "APPROVED" => Ok(TransactionStatus::Approved),
            "DECLINED" => Ok(TransactionStatus::Declined),
            "ERROR" => Ok(TransactionStatus::Error),
            "VOIDED" => Ok(TransactionStatus::Voided),
            other => Err(DomainError::InvalidEnumValue {
                kind: "transaction status",
                value: other.to_string(),
            }),
        }
    }
}
