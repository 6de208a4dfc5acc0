pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod repository;
pub mod routes;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;

use services::{AuthService, ReportService};

#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub report_service: ReportService,
}
