use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    /// Illegal lifecycle transition, e.g. placing an order twice.
    #[error("cannot {action} order in status {status}")]
    InvalidState {
        action: &'static str,
        status: OrderStatus,
    },

    #[error("customer email must not be blank")]
    BlankEmail,

    #[error("customer email is not a valid address: {0}")]
    InvalidEmail(String),

    #[error("order total must be >= 0, got {0}")]
    NegativeTotal(rust_decimal::Decimal),
}
