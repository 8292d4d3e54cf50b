use sea_orm_migration::prelude::*;

mod m20260801_000001_create_users;
mod m20260801_000002_create_personal_profiles;
mod m20260801_000003_create_one_time_codes;
mod m20260801_000004_create_refresh_tokens;
mod m20260801_000005_create_login_attempts;
mod m20260801_000006_create_sessions;
mod m20260801_000007_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_users::Migration),
            Box::new(m20260801_000002_create_personal_profiles::Migration),
            Box::new(m20260801_000003_create_one_time_codes::Migration),
            Box::new(m20260801_000004_create_refresh_tokens::Migration),
            Box::new(m20260801_000005_create_login_attempts::Migration),
            Box::new(m20260801_000006_create_sessions::Migration),
            Box::new(m20260801_000007_create_audit_logs::Migration),
        ]
    }
}

#[tokio::main]
async fn main() {
    cli::run_cli(Migrator).await;
}
