use serde::{Deserialize, Serialize};
use tracing;

use clinic_core::auth::{generate_token, hash_password, verify_password, verify_token};
use clinic_core::types::{NewUser, Outcome, Page, PageRequest, Role, User, UserId};
use clinic_core::{AuthFailure, ClinicContext, ClinicError, ClinicResult, StoreError};
use clinic_notify::{NotificationEvent, NotificationService};

pub const MIN_PASSWORD_LEN: usize = 6;

const BLOCKED_MESSAGE: &str = "Your account has been blocked. Please contact the administrator.";

/// Claims asserted by the external identity provider. Trusted as verified.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub external_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    /// True when this login created the account.
    pub created: bool,
}

/// Argon2 is CPU-bound; both helpers run it on the blocking pool.
async fn hash_off_thread(password: &str) -> ClinicResult<String> {
    let raw = password.to_string();
    let hash = tokio::task::spawn_blocking(move || hash_password(&raw))
        .await
        .map_err(|e| anyhow::anyhow!("password hashing task failed: {}", e))?
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash)
}

async fn verify_off_thread(password: &str, hash: &str) -> ClinicResult<bool> {
    let (raw, hash) = (password.to_string(), hash.to_string());
    let matches = tokio::task::spawn_blocking(move || verify_password(&raw, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))?;
    Ok(matches)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_email(email: &str) -> ClinicResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ClinicError::validation("A valid email address is required"))
    }
}

#[derive(Clone)]
pub struct IdentityService {
    ctx: ClinicContext,
    notifications: NotificationService,
}

impl IdentityService {
    pub fn new(ctx: ClinicContext) -> Self {
        let notifications = NotificationService::new(ctx.clone());
        Self { ctx, notifications }
    }

    fn issue(&self, user: User, created: bool) -> ClinicResult<Session> {
        let token = generate_token(&self.ctx.tokens, user.id, self.ctx.token_ttl())?;
        Ok(Session { token, user, created })
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClinicResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClinicError::validation("Name is required"));
        }
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClinicError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let hash = hash_off_thread(password).await?;
        let user = self
            .ctx
            .store
            .insert_user(NewUser::local(name, email, hash))
            .await
            .map_err(|e| match e {
                StoreError::Conflict => ClinicError::conflict("User already exists"),
                other => other.into(),
            })?;

        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Blocked accounts are refused before the password is looked at.
    pub async fn authenticate(&self, email: &str, password: &str) -> ClinicResult<Session> {
        let email = normalize_email(email);
        let user = self
            .ctx
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;

        if user.is_blocked {
            tracing::warn!("Blocked user {} attempted to log in", user.id);
            return Err(ClinicError::forbidden(BLOCKED_MESSAGE));
        }
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AuthFailure::ExternalAuthRequired.into());
        };
        if !verify_off_thread(password, hash).await? {
            tracing::debug!("Password mismatch for user {}", user.id);
            return Err(AuthFailure::BadCredentials.into());
        }

        self.issue(user, false)
    }

    /// Reuses the account registered under the same email, or creates a
    /// pre-verified one without a local password.
    pub async fn authenticate_external(&self, identity: ExternalIdentity) -> ClinicResult<Session> {
        let email = normalize_email(&identity.email);
        validate_email(&email)?;
        if identity.external_id.trim().is_empty() {
            return Err(ClinicError::validation("External identity is missing its subject"));
        }

        if let Some(user) = self.ctx.store.find_user_by_email(&email).await? {
            return self.reuse_external(user);
        }

        let name = identity
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let new_user = NewUser::external(name, email.clone(), identity.external_id, identity.picture);

        match self.ctx.store.insert_user(new_user).await {
            Ok(user) => {
                tracing::info!("Created externally authenticated user {}", user.id);
                self.issue(user, true)
            }
            // Another request created the account first.
            Err(StoreError::Conflict) => {
                let user = self
                    .ctx
                    .store
                    .find_user_by_email(&email)
                    .await?
                    .ok_or_else(|| ClinicError::conflict("User already exists"))?;
                self.reuse_external(user)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn reuse_external(&self, user: User) -> ClinicResult<Session> {
        if user.is_blocked {
            tracing::warn!("Blocked user {} attempted external login", user.id);
            return Err(ClinicError::forbidden(BLOCKED_MESSAGE));
        }
        self.issue(user, false)
    }

    /// Turns a bearer token into the current user record.
    pub async fn resolve(&self, token: &str) -> ClinicResult<User> {
        let claims = verify_token(&self.ctx.tokens, token)?;
        let user = self
            .ctx
            .store
            .find_user(claims.user_id)
            .await?
            .ok_or(ClinicError::Unauthenticated(AuthFailure::UnknownUser))?;
        if user.is_blocked {
            return Err(ClinicError::forbidden(BLOCKED_MESSAGE));
        }
        Ok(user)
    }

    pub fn authorize(&self, user: &User, role: Role) -> ClinicResult<()> {
        if user.has_role(role) {
            Ok(())
        } else {
            tracing::debug!("User {} lacks role {:?}", user.id, role);
            Err(ClinicError::forbidden(match role {
                Role::Admin => "Admin access required",
                Role::Doctor => "Doctor access required",
                Role::Patient => "Access denied",
            }))
        }
    }

    pub async fn profile(&self, user_id: UserId) -> ClinicResult<User> {
        self.ctx
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("User not found"))
    }

    pub async fn list_users(&self, page: PageRequest) -> ClinicResult<Page<User>> {
        let (users, total) = self.ctx.store.list_users(page).await?;
        Ok(Page::new(users, total, page))
    }

    pub async fn toggle_block(&self, admin_id: UserId, user_id: UserId) -> ClinicResult<Outcome<User>> {
        if admin_id == user_id {
            return Err(ClinicError::validation("Admin cannot block themselves"));
        }
        let target = self.profile(user_id).await?;
        if target.is_admin {
            return Err(ClinicError::validation("Cannot block another admin user"));
        }

        let user = self
            .ctx
            .store
            .toggle_user_blocked(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;
        tracing::info!(
            "Admin {} {} user {}",
            admin_id,
            if user.is_blocked { "blocked" } else { "unblocked" },
            user.id
        );

        let warning = self
            .notifications
            .notify_or_warn(user.id, NotificationEvent::UserStatusChanged { user: &user })
            .await;
        Ok(Outcome::new(user, warning))
    }

    /// Grants admin to the configured accounts that exist. Returns how many
    /// were promoted.
    pub async fn promote_admins(&self, emails: &[String]) -> ClinicResult<usize> {
        let mut promoted = 0;
        for email in emails {
            let email = normalize_email(email);
            match self.ctx.store.find_user_by_email(&email).await? {
                Some(user) if !user.is_admin => {
                    self.ctx.store.set_user_admin(user.id, true).await?;
                    tracing::info!("Promoted user {} to admin", user.id);
                    promoted += 1;
                }
                Some(_) => {}
                None => tracing::warn!("Admin bootstrap email {} has no account", email),
            }
        }
        Ok(promoted)
    }
}
