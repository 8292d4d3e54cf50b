//! Two-factor enrollment: setup codes, enable, disable.

use uuid::Uuid;

use crate::domain::repository::{OtpRepository, UserRepository};
use crate::domain::types::{OtpKind, UserUpdate};
use crate::error::IdentityError;
use crate::usecase::otp::OtpManager;

pub struct TwoFactorSetupUseCase<U, O>
where
    U: UserRepository,
    O: OtpRepository,
{
    pub users: U,
    pub otps: OtpManager<O>,
}

impl<U, O> TwoFactorSetupUseCase<U, O>
where
    U: UserRepository,
    O: OtpRepository,
{
    /// Issue a TWO_FACTOR_SETUP code proving the user can receive codes
    /// before 2FA is switched on. Returned for out-of-band delivery.
    pub async fn send_setup_code(&self, user_id: Uuid) -> Result<String, IdentityError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;
        if !user.is_active {
            return Err(IdentityError::AccountDeactivated);
        }
        self.otps
            .issue(user.id, &user.username, OtpKind::TwoFactorSetup)
            .await
    }

    /// Verify the setup code and enable 2FA for the account.
    pub async fn enable(&self, user_id: Uuid, code: &str) -> Result<(), IdentityError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        self.otps
            .verify(user.id, OtpKind::TwoFactorSetup, code)
            .await?;

        self.users
            .update(
                user.id,
                &UserUpdate {
                    is_2fa_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
    }

    /// Disable 2FA and clear any stored second-factor secret.
    pub async fn disable(&self, user_id: Uuid) -> Result<(), IdentityError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        self.users
            .update(
                user.id,
                &UserUpdate {
                    is_2fa_enabled: Some(false),
                    twofa_secret: Some(None),
                    ..Default::default()
                },
            )
            .await
    }
}
