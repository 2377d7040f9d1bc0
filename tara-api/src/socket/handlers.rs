use std::sync::Arc;

use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use socketioxide::extract::{Data, SocketRef};

use crate::models::NewMessage;
use crate::routes::map::upsert_location;
use crate::schema::messages;
use crate::services::activity;
use crate::AppState;

/// Interaction-log event kind recorded for every persisted chat message.
pub const CHAT_EVENT: &str = "message";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub cpin: String,
    pub sender: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TypingPayload {
    pub cpin: String,
    pub sender: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationPayload {
    pub cpin: String,
    pub phone: String,
    pub lat: f64,
    pub lon: f64,
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    tracing::info!(sid = %socket.id, "socket connected");

    // The cpin acts as the couple's chat room
    socket.on("join-room", |socket: SocketRef, Data::<String>(cpin)| async move {
        socket.join(cpin.clone()).ok();
        tracing::debug!(sid = %socket.id, cpin = %cpin, "joined couple room");
    });

    socket.on("send-message", {
        let state = state.clone();
        move |socket: SocketRef, Data::<ChatMessage>(payload)| {
            let state = state.clone();
            async move {
                on_send_message(socket, payload, &state).await;
            }
        }
    });

    socket.on("typing", |socket: SocketRef, Data::<TypingPayload>(payload)| async move {
        if payload.cpin.is_empty() || payload.sender.is_empty() {
            return;
        }
        // Only the partner should see the indicator
        let _ = socket.to(payload.cpin).emit(
            "typing",
            &serde_json::json!({ "sender": payload.sender }),
        );
    });

    socket.on("stop-typing", |socket: SocketRef, Data::<TypingPayload>(payload)| async move {
        if payload.cpin.is_empty() || payload.sender.is_empty() {
            return;
        }
        let _ = socket.to(payload.cpin).emit(
            "stop-typing",
            &serde_json::json!({ "sender": payload.sender }),
        );
    });

    socket.on("location-update", {
        let state = state.clone();
        move |socket: SocketRef, Data::<LocationPayload>(payload)| {
            let state = state.clone();
            async move {
                on_location_update(socket, payload, &state).await;
            }
        }
    });

    socket.on_disconnect(|socket: SocketRef| async move {
        tracing::info!(sid = %socket.id, "socket disconnected");
    });
}

async fn on_send_message(socket: SocketRef, payload: ChatMessage, state: &AppState) {
    if payload.cpin.is_empty() || payload.sender.is_empty() || payload.message.is_empty() {
        return;
    }

    // DB write is authoritative; the broadcast is best-effort on top
    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "failed to get db connection for chat message");
            return;
        }
    };

    if let Err(e) = diesel::insert_into(messages::table)
        .values(&NewMessage {
            cpin: payload.cpin.clone(),
            sender: payload.sender.clone(),
            message: payload.message.clone(),
        })
        .execute(&mut conn)
    {
        tracing::error!(cpin = %payload.cpin, error = %e, "failed to persist chat message");
        return;
    }

    // Chat counts as activity for streak-inactivity purposes
    if let Err(e) = activity::log_interaction(&mut conn, &payload.cpin, &payload.sender, CHAT_EVENT)
        .and_then(|_| activity::touch_last_active(&mut conn, &payload.cpin))
    {
        tracing::warn!(cpin = %payload.cpin, error = %e, "failed to record chat activity");
    }
    drop(conn);

    let _ = socket.to(payload.cpin.clone()).emit("receive-message", &payload);
    let _ = socket.to(payload.cpin.clone()).emit(
        "stop-typing",
        &serde_json::json!({ "sender": payload.sender }),
    );
}

async fn on_location_update(socket: SocketRef, payload: LocationPayload, state: &AppState) {
    if payload.cpin.is_empty() || payload.phone.is_empty() {
        return;
    }

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "failed to get db connection for location update");
            return;
        }
    };

    if let Err(e) = upsert_location(&mut conn, &payload.cpin, &payload.phone, payload.lat, payload.lon) {
        tracing::warn!(cpin = %payload.cpin, error = %e, "realtime location update failed");
        return;
    }
    drop(conn);

    let _ = socket.to(payload.cpin.clone()).emit(
        "partner-location",
        &serde_json::json!({
            "phone": payload.phone,
            "lat": payload.lat,
            "lon": payload.lon,
            "timestamp": Utc::now().timestamp_millis(),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_payload_accepts_the_client_shape() {
        let payload: ChatMessage = serde_json::from_value(serde_json::json!({
            "cpin": "abc1234",
            "sender": "111",
            "message": "hey",
            "time": "10:42",
        }))
        .unwrap();
        assert_eq!(payload.cpin, "abc1234");
        assert_eq!(payload.sender, "111");
        assert_eq!(payload.message, "hey");
        assert_eq!(payload.time.as_deref(), Some("10:42"));
    }

    #[test]
    fn chat_messages_are_logged_under_the_message_event_kind() {
        assert_eq!(CHAT_EVENT, "message");
    }
}
