use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use backstage_db::Database;
use backstage_types::api::Claims;
use backstage_types::events::{GatewayCommand, GatewayEvent};

use crate::bridge::{self, FeedSet};
use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a session needs besides its socket.
#[derive(Clone)]
pub struct GatewayContext {
    pub dispatcher: Dispatcher,
    pub db: Arc<Database>,
    pub jwt_secret: String,
}

/// Identity proven at the HTTP upgrade (via `?token=`), or `None` when the
/// client will send an Identify command instead.
pub async fn handle_connection(socket: WebSocket, ctx: GatewayContext, preauth: Option<Claims>) {
    let (mut sender, mut receiver) = socket.split();

    let claims = match preauth {
        Some(claims) => claims,
        None => match wait_for_identify(&mut receiver, &ctx.jwt_secret).await {
            Some(claims) => claims,
            None => {
                warn!("WebSocket client failed to identify, closing");
                return;
            }
        },
    };

    let user_id = claims.sub;
    info!("{} ({}) connected to gateway", claims.email, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        email: claims.email.clone(),
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    let conn_id = ctx.dispatcher.session_opened(user_id).await;
    run_connection_loop(sender, receiver, &ctx, user_id).await;
    ctx.dispatcher.session_closed(conn_id).await;

    info!("{} ({}) disconnected from gateway", claims.email, user_id);
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &GatewayEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| warn!("Failed to encode event: {}", e))?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    ctx: &GatewayContext,
    user_id: Uuid,
) {
    // Acks from the command loop and notices from the feed tasks both end
    // up on the socket through the send task.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<GatewayEvent>();
    let (notices_tx, mut notices_rx) = mpsc::unbounded_channel();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Some(notice) = notices_rx.recv() => {
                    if send_event(&mut sender, &GatewayEvent::Notification(notice)).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let dispatcher = ctx.dispatcher.clone();
    let db = ctx.db.clone();
    let mut recv_task = tokio::spawn(async move {
        // Owned here so every feed is aborted when the command loop ends.
        let mut feeds = FeedSet::default();

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Identify { .. }) => {}
                    Ok(GatewayCommand::Subscribe { feed }) => {
                        info!("{} subscribing to {:?}", user_id, feed);
                        feeds.insert(bridge::spawn_feed(
                            feed,
                            user_id,
                            &dispatcher,
                            db.clone(),
                            notices_tx.clone(),
                        ));
                        let _ = events_tx.send(GatewayEvent::Subscribed { feed });
                    }
                    Ok(GatewayCommand::Unsubscribe { feed }) => {
                        if feeds.remove(feed) {
                            info!("{} unsubscribed from {:?}", user_id, feed);
                        }
                        let _ = events_tx.send(GatewayEvent::Unsubscribed { feed });
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Decode and verify a gateway token.
pub fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Claims> {
    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return verify_token(&token, jwt_secret);
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
