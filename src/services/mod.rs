mod auth;
mod report;

pub use auth::{AuthService, Claims, MAX_NAME_LEN, MIN_PASSWORD_LEN};
pub use report::{MAX_PAGE_SIZE, ReportService};
