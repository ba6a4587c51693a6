//! Post-commit transfer notifications
//!
//! Delivery is best-effort and never blocks the transfer path. The engine
//! logs and drops any dispatcher error.

use crate::core::directory::ContactChannel;
use crate::core::traits::NotificationDispatcher;
use crate::types::{Money, OwnerRef};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Event delivered to a transfer party
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEventKind {
    TransferSent,
    TransferReceived,
}

impl TransferEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEventKind::TransferSent => "transfer_sent",
            TransferEventKind::TransferReceived => "transfer_received",
        }
    }
}

/// Notification payload handed to a dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNotification {
    pub kind: TransferEventKind,
    pub recipient: OwnerRef,
    pub channel: ContactChannel,
    pub transaction_ref: String,
    pub amount: Money,
    /// Display name of the other party
    pub counterparty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    ChannelClosed,
}

/// Dispatcher that only writes a log line per notification
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationDispatcher for TracingNotifier {
    fn notify(&self, notification: TransferNotification) -> Result<(), NotifyError> {
        info!(
            event = notification.kind.as_str(),
            recipient = %notification.recipient,
            transaction_ref = %notification.transaction_ref,
            amount = %notification.amount,
            "transfer notification"
        );
        Ok(())
    }
}

/// Dispatcher that forwards notifications to a delivery task
///
/// Uses an unbounded channel so `notify` never waits on the consumer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<TransferNotification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end for the delivery task
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationDispatcher for ChannelNotifier {
    fn notify(&self, notification: TransferNotification) -> Result<(), NotifyError> {
        self.sender
            .send(notification)
            .map_err(|_| NotifyError::ChannelClosed)
    }
}
