use serde::{Deserialize, Serialize};

/// Terminal lifecycle state of a [`Payment`](super::Payment) or
/// [`Refund`](super::Refund). `Succeeded` and `Cancelled` are sticky: once
/// reached, no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lifecycle_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    Succeeded,
    Cancelled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Cancelled)
    }
}

impl std::fmt::Display for Status {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Status::Created => write!(f, "created"),
            Status::Succeeded => write!(f, "succeeded"),
            Status::Cancelled => write!(f, "cancelled"),
        }
    }
}
