use clinic_core::types::{Mailbox, Notification, UserId};
use clinic_core::{ClinicContext, ClinicError, ClinicResult};
use tracing;

use crate::event::NotificationEvent;

/// Outcome of a best-effort delivery to several mailboxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub failed: usize,
}

impl FanOut {
    /// A warning for the caller when not every mailbox was reached.
    pub fn warning(&self, audience: &str) -> Option<String> {
        match (self.delivered, self.failed) {
            (0, 0) => Some(format!("No {} available to notify", audience)),
            (_, 0) => None,
            (delivered, failed) => Some(format!(
                "Notified {} of {} {}",
                delivered,
                delivered + failed,
                audience
            )),
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    ctx: ClinicContext,
}

impl NotificationService {
    pub fn new(ctx: ClinicContext) -> Self {
        Self { ctx }
    }

    pub async fn append(&self, user_id: UserId, notification: &Notification) -> ClinicResult<()> {
        self.ctx.store.append_notification(user_id, notification).await?;
        tracing::debug!("Appended {} notification for user {}", notification.kind, user_id);
        Ok(())
    }

    pub async fn notify(&self, user_id: UserId, event: NotificationEvent<'_>) -> ClinicResult<()> {
        self.append(user_id, &event.to_notification()).await
    }

    /// Like [`notify`](Self::notify) but never fails the caller: a delivery
    /// error becomes a warning string.
    pub async fn notify_or_warn(&self, user_id: UserId, event: NotificationEvent<'_>) -> Option<String> {
        match self.notify(user_id, event).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Failed to deliver {} notification to user {}: {}", event.kind(), user_id, e);
                Some("Notification could not be delivered".to_string())
            }
        }
    }

    /// Appends to every mailbox independently; one failure does not stop the
    /// rest.
    pub async fn fan_out(&self, user_ids: &[UserId], notification: &Notification) -> FanOut {
        let mut outcome = FanOut::default();
        for &user_id in user_ids {
            match self.append(user_id, notification).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    tracing::warn!("Failed to notify user {}: {}", user_id, e);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    pub async fn notify_admins(&self, event: NotificationEvent<'_>) -> ClinicResult<FanOut> {
        let admins = self.ctx.store.admin_ids().await?;
        if admins.is_empty() {
            tracing::warn!("No admin accounts to receive {} notification", event.kind());
        }
        Ok(self.fan_out(&admins, &event.to_notification()).await)
    }

    pub async fn mailbox(&self, user_id: UserId) -> ClinicResult<Mailbox> {
        self.ctx
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;

        let limit = self.ctx.config.booking.mailbox_limit;
        let unread = self.ctx.store.notifications(user_id, false, limit).await?;
        let read = self.ctx.store.notifications(user_id, true, limit).await?;
        let unread_total = self.ctx.store.count_notifications(user_id, false).await?;
        let read_total = self.ctx.store.count_notifications(user_id, true).await?;
        if unread_total > limit || read_total > limit {
            tracing::debug!(
                "Mailbox for user {} truncated to {} of {} unread and {} read",
                user_id,
                limit,
                unread_total,
                read_total
            );
        }
        Ok(Mailbox {
            unread,
            read,
            unread_total,
            read_total,
        })
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> ClinicResult<Mailbox> {
        let moved = self.ctx.store.mark_notifications_seen(user_id).await?;
        tracing::debug!("Marked {} notifications read for user {}", moved, user_id);
        self.mailbox(user_id).await
    }

    /// Only the read partition is touched.
    pub async fn delete_all_read(&self, user_id: UserId) -> ClinicResult<Mailbox> {
        let removed = self.ctx.store.delete_seen_notifications(user_id).await?;
        tracing::debug!("Deleted {} read notifications for user {}", removed, user_id);
        self.mailbox(user_id).await
    }
}
