use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State as AxumState,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use marcador_types::{Change, UserId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use crate::Service;

/// Which changes a connection receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum UpdatesFilter {
    All,
    User(UserId),
}

impl UpdatesFilter {
    fn accepts(&self, change: &Change) -> bool {
        match self {
            Self::All => true,
            Self::User(user_id) => change.user() == Some(*user_id),
        }
    }
}

pub(super) async fn all_updates_ws(
    AxumState(service): AxumState<Arc<Service>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_updates_ws(socket, service, UpdatesFilter::All))
}

pub(super) async fn user_updates_ws(
    AxumState(service): AxumState<Arc<Service>>,
    Path(user_id): Path<UserId>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let filter = UpdatesFilter::User(user_id);
    ws.on_upgrade(move |socket| handle_updates_ws(socket, service, filter))
}

async fn handle_updates_ws(socket: WebSocket, service: Arc<Service>, filter: UpdatesFilter) {
    tracing::info!(?filter, "updates websocket connected");
    let (mut sender, mut receiver) = socket.split();
    let mut updates = service.ledger.subscribe();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(service.config.ws_outbound_buffer);
    let send_timeout = service.config.ws_send_timeout;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            match timeout(send_timeout, sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::warn!("failed to send update, client disconnected");
                    break;
                }
                Err(_) => {
                    tracing::warn!("websocket send timed out, closing connection");
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("client closed updates websocket");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.try_send(Message::Pong(data)).is_err() {
                            tracing::warn!("failed to enqueue pong, closing connection");
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(?err, "updates websocket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(change) => {
                        if !filter.accepts(&change) {
                            continue;
                        }
                        let text = match serde_json::to_string(&change) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::error!(?err, "failed to encode change");
                                continue;
                            }
                        };
                        if out_tx.try_send(Message::Text(text)).is_err() {
                            tracing::warn!("outbound queue full, closing connection");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "updates websocket lagged behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    tracing::info!(?filter, "updates websocket handler exiting");
    drop(out_tx);
    let _ = writer_handle.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use marcador_types::{BetMode, Event, EventStatus, Wallet};

    #[test]
    fn test_user_filter_drops_other_users_and_public_changes() {
        let filter = UpdatesFilter::User(7);
        assert!(filter.accepts(&Change::Wallet(Wallet::new(7))));
        assert!(!filter.accepts(&Change::Wallet(Wallet::new(8))));

        let event = Change::Event(Event {
            id: 1,
            home: "Alianza".to_string(),
            away: "Cristal".to_string(),
            scheduled_at: 0,
            status: EventStatus::Active,
            mode: BetMode::Normal,
            suggested_score: None,
            final_score: None,
            closing: None,
        });
        assert!(!filter.accepts(&event));
        assert!(UpdatesFilter::All.accepts(&event));
    }
}
