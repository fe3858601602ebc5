use rust_decimal::Decimal;

use super::errors::OrderError;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Validated request to place a new order.
///
/// Construction is the only validation gate: once a `PlaceOrderCommand`
/// exists its email is non-blank and well formed and its total is >= 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrderCommand {
    customer_email: String,
    total: Decimal,
}

impl PlaceOrderCommand {
    pub fn new(customer_email: impl Into<String>, total: Decimal) -> Result<Self, OrderError> {
        let customer_email = customer_email.into();

        if customer_email.trim().is_empty() {
            return Err(OrderError::BlankEmail);
        }
        if !is_valid_email(&customer_email) {
            return Err(OrderError::InvalidEmail(customer_email));
        }
        if total < Decimal::ZERO {
            return Err(OrderError::NegativeTotal(total));
        }

        Ok(Self {
            customer_email,
            total,
        })
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn total(&self) -> Decimal {
        self.total
    }
}

/// `local@label(.label)*.tld`. Local part starts and ends alphanumeric and
/// has no consecutive dots; domain labels never start or end with `-`; the
/// TLD is at least two letters.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    let local_ok = !local.is_empty()
        && local.chars().all(|c| c.is_ascii_alphanumeric() || "+._-".contains(c))
        && local.starts_with(|c: char| c.is_ascii_alphanumeric())
        && local.ends_with(|c: char| c.is_ascii_alphanumeric())
        && !local.contains("..");
    if !local_ok {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let Some((tld, hosts)) = labels.split_last() else {
        return false;
    };

    let hosts_ok = hosts.iter().all(|label| {
        !label.is_empty()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    });

    hosts_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}
