use std::sync::Arc;
use std::time::Duration;

use application::{ChatService, Distributor};

use crate::auth::JwtService;

/// 流式网关参数（已从配置解析）
#[derive(Clone, Copy, Debug)]
pub struct StreamParams {
    pub keepalive: Duration,
    pub lifetime: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub distributor: Arc<dyn Distributor>,
    pub jwt_service: Arc<JwtService>,
    pub stream_params: StreamParams,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        distributor: Arc<dyn Distributor>,
        jwt_service: Arc<JwtService>,
        stream_params: StreamParams,
    ) -> Self {
        Self {
            chat_service,
            distributor,
            jwt_service,
            stream_params,
        }
    }
}
