pub mod audit_logs;
pub mod login_attempts;
pub mod one_time_codes;
pub mod personal_profiles;
pub mod refresh_tokens;
pub mod sessions;
pub mod users;
