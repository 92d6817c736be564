mod auth_tests;
mod friendship_tests;
mod health_tests;
mod notification_tests;
mod user_tests;
