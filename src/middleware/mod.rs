mod auth;
mod extract;

pub use auth::{AuthUser, SESSION_COOKIE};
pub use extract::{JsonBody, PathParam, QueryParams};
