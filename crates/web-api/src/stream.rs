//! 流式网关
//!
//! 每个观众一条长连接。进入流式状态后先下发 config、history
//! （公开模式）、users 三个快照帧，再按租户模式订阅频道。
//! 无事件时按空闲阈值发送保活帧；到达存活上限后下发 reconnect
//! 并主动断开，存活上限必须低于部署路径上最短的中间层超时。

use crate::error::ApiError;
use crate::frames::StreamFrame;
use crate::state::AppState;
use application::EventStream;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::response::Response;
use domain::{ChatEvent, ChatMode, TenantId, TenantKeyspace};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub nick: String,
}

/// GET /api/v1/{tenant}/stream
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    Path(tenant): Path<String>,
    Query(query): Query<StreamQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let tenant = TenantId::new(tenant).map_err(ApiError::from)?;
    let keyspace = TenantKeyspace::new(tenant);

    Ok(ws.on_upgrade(move |socket| async move {
        match StreamingConnection::open(state, keyspace, query.nick, addr.ip().to_string()).await {
            Ok(connection) => connection.run(socket).await,
            Err(err) => {
                tracing::warn!(error = ?err, "流式连接建立失败");
            }
        }
    }))
}

type WsSender = SplitSink<WebSocket, WsMessage>;

/// 单条流式连接
///
/// 状态机：Connecting -> Streaming -> (Pinging | Forwarding)
/// -> Closing -> Closed；reconnect 终止当前实例并期待客户端
/// 重新建立一条新连接。
struct StreamingConnection {
    state: AppState,
    keyspace: TenantKeyspace,
    nick: String,
    session_token: Uuid,
    mode: ChatMode,
    events: EventStream,
}

impl StreamingConnection {
    /// Connecting：登记会话、读取模式、订阅频道
    async fn open(
        state: AppState,
        keyspace: TenantKeyspace,
        nick: String,
        addr: String,
    ) -> Result<Self, ApiError> {
        let settings = state.chat_service.effective_settings(&keyspace).await?;

        let session = state
            .chat_service
            .sessions()
            .register(&keyspace, &nick, &addr)
            .await?;

        let events = state
            .distributor
            .subscribe(&keyspace, &settings.mode.channel_kinds())
            .await
            .map_err(domain::DomainError::from)?;

        tracing::info!(
            tenant = %keyspace.tenant(),
            nick = %session.nick,
            "流式连接已建立"
        );

        Ok(Self {
            state,
            keyspace,
            nick: session.nick.clone(),
            session_token: session.token,
            mode: settings.mode,
            events,
        })
    }

    /// Streaming：快照、转发、保活、强制轮换
    async fn run(mut self, socket: WebSocket) {
        let (mut sender, mut incoming) = socket.split();
        let params = self.state.stream_params;

        if self.send_snapshots(&mut sender).await.is_err() {
            self.close().await;
            return;
        }

        // 强制轮换的绝对期限与保活的空闲期限
        let rotation_deadline = Instant::now() + params.lifetime;
        let mut idle_deadline = Instant::now() + params.keepalive;

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        if let Some(frame) = classify_event(&self.nick, event) {
                            if send_frame(&mut sender, &frame).await.is_err() {
                                break;
                            }
                            idle_deadline = Instant::now() + params.keepalive;
                        }
                    }
                    None => {
                        // 订阅任务放弃了重订阅：终止错误
                        let frame = StreamFrame::Error {
                            code: "subscription_lost".to_string(),
                        };
                        let _ = send_frame(&mut sender, &frame).await;
                        break;
                    }
                },
                // 空闲阈值内没有事件，发保活帧防止中间层掐断连接
                _ = tokio::time::sleep_until(idle_deadline) => {
                    if send_frame(&mut sender, &StreamFrame::Ping).await.is_err() {
                        break;
                    }
                    idle_deadline = Instant::now() + params.keepalive;
                }
                // 存活上限到达：通知客户端重连并主动断开
                _ = tokio::time::sleep_until(rotation_deadline) => {
                    let _ = send_frame(&mut sender, &StreamFrame::Reconnect).await;
                    tracing::debug!(
                        tenant = %self.keyspace.tenant(),
                        nick = %self.nick,
                        "连接到达存活上限，强制轮换"
                    );
                    break;
                }
                message = incoming.next() => match message {
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(WsMessage::Ping(data))) => {
                        if sender.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                        self.touch_session().await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        self.touch_session().await;
                    }
                    Some(Ok(_)) => {
                        // 客户端不经流式连接发消息，忽略
                    }
                    Some(Err(err)) => {
                        tracing::debug!(error = %err, "客户端连接读错误");
                        break;
                    }
                },
            }
        }

        self.close().await;
    }

    /// 连接快照：config、history（公开模式）、users
    async fn send_snapshots(&mut self, sender: &mut WsSender) -> Result<(), ()> {
        send_frame(sender, &StreamFrame::Config { mode: self.mode }).await?;

        if self.mode.includes_public() {
            match self
                .state
                .chat_service
                .list_history(&self.keyspace, None, None)
                .await
            {
                Ok(messages) => {
                    send_frame(sender, &StreamFrame::History { messages }).await?;
                }
                Err(err) => {
                    tracing::warn!(
                        tenant = %self.keyspace.tenant(),
                        error = %err,
                        "历史快照读取失败"
                    );
                }
            }
        }

        match self
            .state
            .chat_service
            .sessions()
            .online_users(&self.keyspace)
            .await
        {
            Ok((count, users)) => {
                send_frame(sender, &StreamFrame::Users { count, users }).await?;
            }
            Err(err) => {
                tracing::warn!(
                    tenant = %self.keyspace.tenant(),
                    error = %err,
                    "在线快照读取失败"
                );
            }
        }

        Ok(())
    }

    async fn touch_session(&self) {
        if let Err(err) = self
            .state
            .chat_service
            .sessions()
            .heartbeat(&self.keyspace, &self.nick, self.session_token)
            .await
        {
            tracing::debug!(error = %err, "会话心跳失败");
        }
    }

    /// Closing：注销会话；事件流随 self 一起丢弃即退订
    async fn close(self) {
        if let Err(err) = self
            .state
            .chat_service
            .sessions()
            .disconnect(&self.keyspace, &self.nick, self.session_token)
            .await
        {
            tracing::warn!(
                tenant = %self.keyspace.tenant(),
                nick = %self.nick,
                error = %err,
                "会话注销失败"
            );
        }
        tracing::info!(
            tenant = %self.keyspace.tenant(),
            nick = %self.nick,
            "流式连接已关闭"
        );
    }
}

async fn send_frame(sender: &mut WsSender, frame: &StreamFrame) -> Result<(), ()> {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "帧序列化失败");
            return Err(());
        }
    };
    sender
        .send(WsMessage::Text(payload.into()))
        .await
        .map_err(|_| ())
}

/// 事件分类成帧；私信按收件人过滤，与己无关的丢弃
fn classify_event(nick: &str, event: ChatEvent) -> Option<StreamFrame> {
    match event {
        ChatEvent::MessagePosted { message } => Some(StreamFrame::Message { message }),
        ChatEvent::MessageDeleted { message_id } => Some(StreamFrame::MessageDeleted { message_id }),
        ChatEvent::Cleared { at } => Some(StreamFrame::Clear { at }),
        ChatEvent::PresenceChanged { count, users } => Some(StreamFrame::Users { count, users }),
        ChatEvent::ConfigChanged { mode } => Some(StreamFrame::Config { mode }),
        ChatEvent::PrivatePosted { message } => {
            if message.recipient == nick || message.sender == nick {
                Some(StreamFrame::Private { message })
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PrivateMessage, TenantId};

    fn private(sender: &str, recipient: &str) -> ChatEvent {
        ChatEvent::PrivatePosted {
            message: PrivateMessage {
                id: Uuid::new_v4(),
                tenant: TenantId::new("radio-one").unwrap(),
                sender: sender.to_string(),
                recipient: recipient.to_string(),
                body: "psst".to_string(),
                attachment_id: None,
                created_at: chrono::Utc::now(),
            },
        }
    }

    #[test]
    fn private_events_are_recipient_filtered() {
        // 收件人与发件人都能看到，第三方看不到
        assert!(classify_event("dj", private("alice", "dj")).is_some());
        assert!(classify_event("alice", private("alice", "dj")).is_some());
        assert!(classify_event("bob", private("alice", "dj")).is_none());
    }

    #[test]
    fn cleared_maps_to_clear_frame() {
        let at = chrono::Utc::now();
        match classify_event("x", ChatEvent::Cleared { at }) {
            Some(StreamFrame::Clear { at: frame_at }) => assert_eq!(frame_at, at),
            other => panic!("expected Clear, got {:?}", other),
        }
    }
}
