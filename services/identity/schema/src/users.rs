use sea_orm::entity::prelude::*;

/// Account record. Usernames are stored lowercased so uniqueness is
/// case-insensitive. Accounts are deactivated, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_2fa_enabled: bool,
    pub twofa_secret: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_login: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::personal_profiles::Entity")]
    PersonalProfile,
    #[sea_orm(has_many = "super::one_time_codes::Entity")]
    OneTimeCodes,
    #[sea_orm(has_many = "super::refresh_tokens::Entity")]
    RefreshTokens,
    #[sea_orm(has_many = "super::sessions::Entity")]
    Sessions,
}

impl Related<super::personal_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PersonalProfile.def()
    }
}

impl Related<super::one_time_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OneTimeCodes.def()
    }
}

impl Related<super::refresh_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefreshTokens.def()
    }
}

impl Related<super::sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
