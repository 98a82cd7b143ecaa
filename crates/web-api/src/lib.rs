//! Web API 层
//!
//! axum 路由、流式网关、管理端鉴权与错误映射。

pub mod admin_routes;
pub mod auth;
pub mod error;
pub mod frames;
pub mod routes;
pub mod state;
pub mod stream;

pub use auth::{AdminClaims, JwtService};
pub use error::ApiError;
pub use frames::StreamFrame;
pub use routes::router;
pub use state::{AppState, StreamParams};
