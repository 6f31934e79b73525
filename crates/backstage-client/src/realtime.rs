//! Realtime consumer: owns the gateway socket in a background task and
//! hands notifications out through a queue.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use backstage_types::events::{Feed, GatewayCommand, GatewayEvent, Notification};

use crate::error::{ClientError, ClientResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct RealtimeClient {
    user_id: Uuid,
    commands: mpsc::UnboundedSender<GatewayCommand>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    task: JoinHandle<()>,
}

impl RealtimeClient {
    /// Connect to `gateway_url` (e.g. `ws://host:3000/gateway`) and wait for
    /// the server's Ready.
    pub async fn connect(gateway_url: &str, token: &str) -> ClientResult<Self> {
        let url = format!("{gateway_url}?token={token}");
        let (mut socket, _response) = connect_async(&url)
            .await
            .map_err(|e| ClientError::Connection(format!("{gateway_url}: {e}")))?;

        let user_id = wait_for_ready(&mut socket).await?;
        info!("Gateway ready for {}", user_id);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notifications) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(socket, command_rx, notice_tx));

        Ok(Self {
            user_id,
            commands,
            notifications,
            task,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn subscribe(&self, feed: Feed) -> ClientResult<()> {
        self.command(GatewayCommand::Subscribe { feed })
    }

    pub fn unsubscribe(&self, feed: Feed) -> ClientResult<()> {
        self.command(GatewayCommand::Unsubscribe { feed })
    }

    fn command(&self, command: GatewayCommand) -> ClientResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::Connection("gateway connection closed".into()))
    }

    /// Next queued notification; `None` once the connection is gone and the
    /// queue is drained.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    pub fn is_connected(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_for_ready(socket: &mut Socket) -> ClientResult<Uuid> {
    while let Some(message) = socket.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<GatewayEvent>(text.as_str()) {
                Ok(GatewayEvent::Ready { user_id, .. }) => return Ok(user_id),
                Ok(other) => debug!("Ignoring {:?} before Ready", other),
                Err(e) => return Err(ClientError::Protocol(format!("bad gateway event: {e}"))),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(ClientError::Connection(e.to_string())),
        }
    }
    Err(ClientError::Connection("gateway closed before Ready".into()))
}

async fn run(
    socket: Socket,
    mut commands: mpsc::UnboundedReceiver<GatewayCommand>,
    notices: mpsc::UnboundedSender<Notification>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    let _ = sink.close().await;
                    break;
                };
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode gateway command: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!("Gateway send failed: {}", e);
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<GatewayEvent>(text.as_str()) {
                    Ok(GatewayEvent::Notification(notification)) => {
                        if notices.send(notification).is_err() {
                            break;
                        }
                    }
                    Ok(GatewayEvent::Subscribed { feed }) => debug!("Subscribed to {:?}", feed),
                    Ok(GatewayEvent::Unsubscribed { feed }) => debug!("Unsubscribed from {:?}", feed),
                    Ok(GatewayEvent::Ready { .. }) => {}
                    Err(e) => warn!("Unreadable gateway event: {}", e),
                },
                // tungstenite answers pings itself
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Gateway read failed: {}", e);
                    break;
                }
            }
        }
    }

    info!("Gateway connection closed");
}
