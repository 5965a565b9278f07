pub mod analysis;
pub mod config;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod service;
pub mod storage;

pub use config::{LogFormat, ServiceConfig};
pub use service::{AppState, build_router, create_app};
pub use models::*;
