use axum::extract::Extension;
use clinic_core::types::Mailbox;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::response::{self, Reply};
use crate::state::Services;

pub async fn mailbox(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<Mailbox>> {
    let mailbox = services.notifications.mailbox(user.id).await?;
    Ok(response::ok("Notifications fetched successfully", mailbox))
}

pub async fn mark_read(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<Mailbox>> {
    let mailbox = services.notifications.mark_all_read(user.id).await?;
    Ok(response::ok("All notifications marked as read", mailbox))
}

pub async fn delete_read(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<Mailbox>> {
    let mailbox = services.notifications.delete_all_read(user.id).await?;
    Ok(response::ok("All read notifications deleted successfully", mailbox))
}
