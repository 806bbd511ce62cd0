use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Lifecycle of an order, from checkout to fulfilment.
///
/// The database stores the display form (`Pending`, `Mail Sent`, ...) so that
/// existing admin tooling keeps working; handlers only ever move an order
/// through [`OrderStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum OrderStatus {
    Pending,
    Paid,
    SendingEmail,
    MailSent,
    PaymentFailed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::SendingEmail => "Sending Email",
            OrderStatus::MailSent => "Mail Sent",
            OrderStatus::PaymentFailed => "Payment Failed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// The enforced transition table. Anything not listed here is illegal,
    /// including for admins.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Paid)
                | (Pending, PaymentFailed)
                | (Pending, Cancelled)
                | (PaymentFailed, Pending)
                | (PaymentFailed, Cancelled)
                | (Paid, SendingEmail)
                | (Paid, MailSent)
                | (Paid, Cancelled)
                | (SendingEmail, MailSent)
                | (SendingEmail, Paid)
        )
    }

    /// Validates `self -> next`, returning the typed error a handler can map
    /// to a 409.
    pub fn transition_to(&self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::IllegalTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Paid" => Ok(OrderStatus::Paid),
            "Sending Email" => Ok(OrderStatus::SendingEmail),
            "Mail Sent" => Ok(OrderStatus::MailSent),
            "Payment Failed" => Ok(OrderStatus::PaymentFailed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::InvalidInput(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

/// Gateway-side state of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    /// A payment in one of these states has money attached; creating a second
    /// gateway order for the same local order would double-charge.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Captured | PaymentStatus::Authorized)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(PaymentStatus::Created),
            "authorized" => Ok(PaymentStatus::Authorized),
            "captured" => Ok(PaymentStatus::Captured),
            "refunded" => Ok(PaymentStatus::Refunded),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::InvalidInput(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

/// Outcome of the confirmation-email pipeline for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum EmailStatus {
    Pending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EmailStatus::Pending),
            "sent" => Ok(EmailStatus::Sent),
            "failed" => Ok(EmailStatus::Failed),
            other => Err(DomainError::InvalidInput(format!(
                "unknown email status '{other}'"
            ))),
        }
    }
}

/// The enumerated set of (status, email status) pairs for which a manual
/// email retry is allowed. Everything else is "retry not needed".
pub fn retry_allowed(status: OrderStatus, email_status: EmailStatus, email_sent: bool) -> bool {
    match (status, email_status) {
        (OrderStatus::Paid, EmailStatus::Failed) => true,
        (OrderStatus::Paid, EmailStatus::Pending) => !email_sent,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_paid_failed_or_cancelled() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::MailSent));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::SendingEmail));
    }

    #[test]
    fn mail_sent_and_cancelled_are_terminal() {
        for next in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::SendingEmail,
            OrderStatus::MailSent,
            OrderStatus::PaymentFailed,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::MailSent.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn cancelled_order_cannot_be_reopened() {
        let err = OrderStatus::Cancelled
            .transition_to(OrderStatus::Pending)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::IllegalTransition {
                from: "Cancelled",
                to: "Pending"
            }
        ));
    }

    #[test]
    fn sending_email_resolves_to_mail_sent_or_back_to_paid() {
        assert!(OrderStatus::SendingEmail.can_transition_to(OrderStatus::MailSent));
        assert!(OrderStatus::SendingEmail.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::SendingEmail.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn failed_payment_allows_retry_via_pending() {
        assert!(OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::SendingEmail,
            OrderStatus::MailSent,
            OrderStatus::PaymentFailed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            "Mail Sent".parse::<OrderStatus>().unwrap(),
            OrderStatus::MailSent
        );
        assert!("mail sent".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn settled_payment_states() {
        assert!(PaymentStatus::Captured.is_settled());
        assert!(PaymentStatus::Authorized.is_settled());
        assert!(!PaymentStatus::Created.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
        assert!(!PaymentStatus::Refunded.is_settled());
    }

    #[test]
    fn retry_set_is_closed() {
        assert!(retry_allowed(
            OrderStatus::Paid,
            EmailStatus::Failed,
            true
        ));
        assert!(retry_allowed(
            OrderStatus::Paid,
            EmailStatus::Pending,
            false
        ));
        // Already sent.
        assert!(!retry_allowed(OrderStatus::Paid, EmailStatus::Pending, true));
        assert!(!retry_allowed(OrderStatus::Paid, EmailStatus::Sent, true));
        // Not paid yet or already fulfilled.
        assert!(!retry_allowed(
            OrderStatus::Pending,
            EmailStatus::Failed,
            false
        ));
        assert!(!retry_allowed(
            OrderStatus::MailSent,
            EmailStatus::Sent,
            true
        ));
        assert!(!retry_allowed(
            OrderStatus::Cancelled,
            EmailStatus::Pending,
            false
        ));
    }
}
