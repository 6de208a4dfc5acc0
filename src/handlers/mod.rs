mod auth;
mod health;
mod reports;

pub use auth::{get_user, login, logout, register};
pub use health::health_check;
pub use reports::{create_report, delete_report, get_report, list_reports, update_report};
