use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingStatus, User};
use crate::repositories::ActivityRepository;
use crate::services::UserService;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "activity:{id}", "user:{id}"
        #[serde(default)]
        identity: Option<Identity>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { channel: String },
    #[serde(rename = "booking_created")]
    BookingCreated {
        booking_id: String,
        activity_id: String,
        user_id: String,
        date: String,
        participants: i32,
        status: String,
    },
    #[serde(rename = "booking_status_changed")]
    BookingStatusChanged {
        booking_id: String,
        activity_id: String,
        user_id: String,
        previous_status: String,
        status: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Message addressed to one channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub message: WsMessage,
}

pub fn activity_channel(activity_id: Uuid) -> String {
    format!("activity:{}", activity_id)
}

pub fn user_channel(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// Parsed subscription channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Activity(Uuid),
    User(Uuid),
}

impl Channel {
    pub fn parse(channel: &str) -> Option<Self> {
        let (kind, id) = channel.split_once(':')?;
        let id = Uuid::parse_str(id).ok()?;
        match kind {
            "activity" => Some(Channel::Activity(id)),
            "user" => Some(Channel::User(id)),
            _ => None,
        }
    }
}

pub fn is_valid_channel(channel: &str) -> bool {
    Channel::parse(channel).is_some()
}

/// A user hears their own bookings; a host hears their activity's; admins hear all
pub fn may_subscribe(caller: &User, channel: Channel, activity_host: Option<Uuid>) -> bool {
    if caller.is_admin() {
        return true;
    }
    match channel {
        Channel::User(user_id) => user_id == caller.id,
        Channel::Activity(_) => activity_host == Some(caller.id),
    }
}

/// Resolves subscribers and activity hosts for subscription checks
pub struct ChannelAuthorizer {
    users: Arc<UserService>,
    activities: Arc<ActivityRepository>,
}

impl ChannelAuthorizer {
    pub fn new(users: Arc<UserService>, activities: Arc<ActivityRepository>) -> Self {
        Self { users, activities }
    }
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// WebSocket server pushing booking notifications to subscribed clients
pub struct WebSocketServer {
    /// Broadcast sender; every connection filters by its own subscriptions
    tx: broadcast::Sender<ChannelMessage>,
    /// Client subscriptions: client_id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, HashSet<String>>>>,
    /// Without one every subscription is refused
    authorizer: Option<Arc<ChannelAuthorizer>>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000); // Buffer up to 1000 messages

        Self {
            tx,
            client_channels: Arc::new(RwLock::new(HashMap::new())),
            authorizer: None,
        }
    }

    pub fn with_authorizer(authorizer: ChannelAuthorizer) -> Self {
        Self {
            authorizer: Some(Arc::new(authorizer)),
            ..Self::new()
        }
    }

    /// Open broadcast receivers, one per live connection plus any test receivers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Check the identity may listen on `channel`
    pub async fn authorize_subscription(
        &self,
        identity: Option<&Identity>,
        channel: &str,
    ) -> AppResult<()> {
        let parsed = Channel::parse(channel)
            .ok_or_else(|| AppError::Validation(format!("Unknown channel: {}", channel)))?;
        let authorizer = self
            .authorizer
            .as_ref()
            .ok_or_else(|| AppError::Forbidden("Subscriptions are disabled".to_string()))?;

        let caller = authorizer
            .users
            .current_user(identity)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

        let activity_host = match parsed {
            Channel::Activity(activity_id) => authorizer
                .activities
                .find_by_id(activity_id)
                .await?
                .map(|a| a.host_id),
            Channel::User(_) => None,
        };

        if may_subscribe(&caller, parsed, activity_host) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Not allowed to subscribe to {}",
                channel
            )))
        }
    }

    /// Receive everything broadcast, unfiltered
    pub fn receiver(&self) -> broadcast::Receiver<ChannelMessage> {
        self.tx.subscribe()
    }

    /// Number of clients subscribed to a channel
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let client_channels = self.client_channels.read().await;
        client_channels
            .values()
            .filter(|channels| channels.contains(channel))
            .count()
    }

    /// Broadcast a message to all subscribers of a channel
    pub async fn broadcast_to_channel(&self, channel: &str, message: WsMessage) {
        let count = self.subscriber_count(channel).await;
        if count == 0 {
            return;
        }
        debug!("Broadcasting to {} subscribers on channel {}", count, channel);
        let addressed = ChannelMessage {
            channel: channel.to_string(),
            message,
        };
        if let Err(e) = self.tx.send(addressed) {
            warn!("Failed to broadcast message: {}", e);
        }
    }

    /// Subscribe a client to a channel
    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let mut client_channels = self.client_channels.write().await;
        client_channels
            .entry(client_id)
            .or_default()
            .insert(channel.clone());
        info!("Client {} subscribed to {}", client_id, channel);
    }

    /// Unsubscribe a client from a channel
    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut client_channels = self.client_channels.write().await;
        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.remove(channel);
        }
        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Drop every subscription of a client
    pub async fn disconnect(&self, client_id: Uuid) {
        self.client_channels.write().await.remove(&client_id);
    }

    /// Check if client is subscribed to a channel
    pub async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let client_channels = self.client_channels.read().await;
        client_channels
            .get(&client_id)
            .map(|channels| channels.contains(channel))
            .unwrap_or(false)
    }

    /// Accept connections until the listener fails
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New WebSocket connection from {}", addr);
                    let ws = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = ws.handle_connection(stream).await {
                            error!("WebSocket connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("WebSocket accept error: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    /// Serve one connection until the client goes away
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id.to_string(),
            "message": "Connected to Movinature WebSocket server"
        });
        if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Shared between the reader (acks) and the broadcast forwarder
        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

        let ws_server_clone = self.clone();
        let ws_sender_for_broadcast = ws_sender.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                let addressed = match rx.recv().await {
                    Ok(addressed) => addressed,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, skipped {} messages", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if !ws_server_clone
                    .is_client_subscribed(client_id, &addressed.channel)
                    .await
                {
                    continue;
                }

                let json = match serde_json::to_string(&addressed.message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = ws_sender_for_broadcast.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    debug!("Stopped forwarding to client {}: {}", client_id, e);
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let reply = self.handle_client_message(client_id, &text).await;
                    let mut sender = ws_sender.lock().await;
                    if let Err(e) = sender.send(Message::Text(reply.to_string())).await {
                        warn!("Failed to send reply: {}", e);
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed: {}", client_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        self.disconnect(client_id).await;
        forwarder.abort();
        // Wait for the abort so the receiver and sink are dropped before returning
        let _ = forwarder.await;
        debug!("Connection {} torn down", client_id);
        Ok(())
    }

    /// Reply to one client frame
    async fn handle_client_message(&self, client_id: Uuid, text: &str) -> serde_json::Value {
        match serde_json::from_str::<WsMessage>(text) {
            Ok(WsMessage::Subscribe { channel, identity }) => {
                match self.authorize_subscription(identity.as_ref(), &channel).await {
                    Ok(()) => {
                        self.subscribe(client_id, channel.clone()).await;
                        serde_json::json!({ "type": "subscribed", "channel": channel })
                    }
                    Err(e) => {
                        warn!("Client {} refused {}: {}", client_id, channel, e);
                        serde_json::json!({ "type": "error", "message": e.public_message() })
                    }
                }
            }
            Ok(WsMessage::Unsubscribe { channel }) => {
                self.unsubscribe(client_id, &channel).await;
                serde_json::json!({ "type": "unsubscribed", "channel": channel })
            }
            Ok(_) => {
                warn!("Unexpected message type from client {}", client_id);
                serde_json::json!({ "type": "error", "message": "Unexpected message type" })
            }
            Err(_) => {
                warn!("Failed to parse message from client {}: {}", client_id, text);
                serde_json::json!({ "type": "error", "message": "Invalid message format" })
            }
        }
    }

    /// Push a new booking to the activity's and the booker's channels
    pub async fn notify_booking_created(&self, booking: &Booking) {
        let message = WsMessage::BookingCreated {
            booking_id: booking.id.to_string(),
            activity_id: booking.activity_id.to_string(),
            user_id: booking.user_id.to_string(),
            date: booking.date.to_string(),
            participants: booking.participants,
            status: booking.status.clone(),
        };

        self.broadcast_to_channel(&activity_channel(booking.activity_id), message.clone())
            .await;
        self.broadcast_to_channel(&user_channel(booking.user_id), message)
            .await;
    }

    /// Push a status change to the activity's and the booker's channels
    pub async fn notify_status_changed(&self, booking: &Booking, previous: BookingStatus) {
        let message = WsMessage::BookingStatusChanged {
            booking_id: booking.id.to_string(),
            activity_id: booking.activity_id.to_string(),
            user_id: booking.user_id.to_string(),
            previous_status: previous.as_str().to_string(),
            status: booking.status.clone(),
        };

        self.broadcast_to_channel(&activity_channel(booking.activity_id), message.clone())
            .await;
        self.broadcast_to_channel(&user_channel(booking.user_id), message)
            .await;
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            client_channels: Arc::clone(&self.client_channels),
            authorizer: self.authorizer.clone(),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_message() -> WsMessage {
        WsMessage::BookingStatusChanged {
            booking_id: Uuid::nil().to_string(),
            activity_id: Uuid::nil().to_string(),
            user_id: Uuid::nil().to_string(),
            previous_status: "PENDING".into(),
            status: "CONFIRMED".into(),
        }
    }

    #[test]
    fn test_channel_validation() {
        let id = Uuid::new_v4();
        assert!(is_valid_channel(&activity_channel(id)));
        assert!(is_valid_channel(&user_channel(id)));
        assert!(!is_valid_channel("event:123"));
        assert!(!is_valid_channel("activity:not-a-uuid"));
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(status_message()).unwrap();
        assert_eq!(json["type"], "booking_status_changed");
        assert_eq!(json["status"], "CONFIRMED");

        let parsed: WsMessage =
            serde_json::from_str(r#"{"type":"subscribe","channel":"user:1"}"#).unwrap();
        assert_eq!(
            parsed,
            WsMessage::Subscribe {
                channel: "user:1".into(),
                identity: None
            }
        );
    }

    fn user(role: &str) -> User {
        let now = chrono::Utc::now().naive_utc();
        User {
            id: Uuid::new_v4(),
            external_id: format!("idp|{}", role),
            email: "someone@example.com".into(),
            name: None,
            image: None,
            bio: None,
            phone: None,
            role: role.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_subscription_rules() {
        let guest = user("GUEST");
        let host = user("HOST");
        let admin = user("ADMIN");
        let activity = Uuid::new_v4();

        assert!(may_subscribe(&guest, Channel::User(guest.id), None));
        assert!(!may_subscribe(&guest, Channel::User(host.id), None));

        assert!(may_subscribe(&host, Channel::Activity(activity), Some(host.id)));
        assert!(!may_subscribe(&guest, Channel::Activity(activity), Some(host.id)));
        assert!(!may_subscribe(&host, Channel::Activity(activity), None));

        assert!(may_subscribe(&admin, Channel::User(guest.id), None));
        assert!(may_subscribe(&admin, Channel::Activity(activity), None));
    }

    #[tokio::test]
    async fn test_subscription_refused_without_authorizer() {
        let server = WebSocketServer::new();

        let err = server
            .authorize_subscription(None, "bookings")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = server
            .authorize_subscription(None, &user_channel(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let client = Uuid::new_v4();
        let request = serde_json::json!({
            "type": "subscribe",
            "channel": user_channel(Uuid::new_v4())
        });
        let reply = server
            .handle_client_message(client, &request.to_string())
            .await;
        assert_eq!(reply["type"], "error");
        assert!(server.client_channels.read().await.get(&client).is_none());
    }

    #[tokio::test]
    async fn test_connection_teardown_releases_forwarder() {
        let server = Arc::new(WebSocketServer::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let ws = server.clone();
        let connection = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            ws.handle_connection(stream).await
        });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        let welcome = client.next().await.unwrap().unwrap();
        assert!(welcome.to_text().unwrap().contains("connected"));
        assert_eq!(server.receiver_count(), 1);

        client.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), connection)
            .await
            .expect("connection handler did not finish")
            .unwrap()
            .unwrap();

        assert_eq!(server.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_only_with_subscribers() {
        let server = WebSocketServer::new();
        let mut rx = server.receiver();
        let client = Uuid::new_v4();
        let channel = activity_channel(Uuid::new_v4());

        // Nobody listening: nothing is sent
        server.broadcast_to_channel(&channel, status_message()).await;
        assert!(rx.try_recv().is_err());

        server.subscribe(client, channel.clone()).await;
        assert!(server.is_client_subscribed(client, &channel).await);
        server.broadcast_to_channel(&channel, status_message()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, channel);
        assert_eq!(received.message, status_message());

        server.disconnect(client).await;
        assert_eq!(server.subscriber_count(&channel).await, 0);
    }
}
