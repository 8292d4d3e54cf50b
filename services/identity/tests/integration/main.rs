mod password_reset_test;
mod session_test;
mod token_test;
mod twofactor_test;
