//! HTTP service boundary for evaluations

pub mod http_server;

pub use http_server::{router, start_server, AppState, EvaluateRequest, EvaluateResponse};
