//! Report content pipeline: dispatch a generation request to the right prompt
//! template and backend, persist the body through a verified blob write, and
//! only then touch the relational record.

pub mod dispatch;
pub mod upsert;

pub use dispatch::{ContentDispatcher, GenerationRequest};
pub use upsert::ReportPipeline;
