//! services/api/src/web/subscription_task.rs
//!
//! The long-running tasks behind WebSocket subscriptions. Each task forwards full
//! snapshots to the client until its cancellation token fires, the client goes
//! away, or the underlying stream fails.

use axum::extract::ws::{Message, WebSocket};
use driverroom_core::{
    returns::ReturnsIndex, roster::Roster, DispatchBoard, Driver, MessagingDesk, ReturnIncident,
    RosterView, ServiceResult, SnapshotStream, User,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::web::{
    dto::{ChatMessageResponse, ReturnIncidentResponse, RosterEntryResponse},
    protocol::ServerMessage,
};

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serializes and sends one server message. Returns `false` once the client is gone.
pub async fn send_message(ws_sender: &WsSender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return true;
        }
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

fn roster_message(view: &RosterView) -> ServerMessage {
    ServerMessage::RosterSnapshot {
        entries: view.entries.iter().map(RosterEntryResponse::from).collect(),
        checked_in_count: view.checked_in_count,
    }
}

/// Merges roster and returns snapshots into rendered board views.
///
/// Nothing is emitted until both streams have delivered their first snapshot;
/// after that every change to either re-renders the board. Stops when `token`
/// fires, either stream ends, or the receiving side of `views` is dropped.
pub async fn merge_roster_snapshots(
    mut drivers: SnapshotStream<Driver>,
    mut incidents: SnapshotStream<ReturnIncident>,
    views: mpsc::Sender<RosterView>,
    token: CancellationToken,
) -> ServiceResult<()> {
    let mut roster = Roster::new();
    let mut returns = ReturnsIndex::new();
    let (mut have_roster, mut have_returns) = (false, false);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = drivers.next() => match item {
                Some(snapshot) => {
                    roster.replace_snapshot(snapshot?);
                    have_roster = true;
                }
                None => break,
            },
            item = incidents.next() => match item {
                Some(snapshot) => {
                    returns.rebuild(&snapshot?);
                    have_returns = true;
                }
                None => break,
            },
        }

        if have_roster
            && have_returns
            && views.send(RosterView::compose(&roster, &returns)).await.is_err()
        {
            break;
        }
    }
    Ok(())
}

/// Streams the operator's roster merged with pending returns.
pub async fn roster_feed(
    board: DispatchBoard,
    operator: User,
    ws_sender: WsSender,
    token: CancellationToken,
) -> ServiceResult<()> {
    let drivers = board.watch_roster(&operator).await?;
    let incidents = board.watch_returns(&operator).await?;

    let (views_tx, mut views_rx) = mpsc::channel(8);
    let forward = async {
        while let Some(view) = views_rx.recv().await {
            if !send_message(&ws_sender, &roster_message(&view)).await {
                break;
            }
        }
    };
    let (merged, ()) = tokio::join!(
        merge_roster_snapshots(drivers, incidents, views_tx, token),
        forward
    );
    info!("Roster feed for {} stopped", operator.user_id);
    merged
}

pub async fn returns_feed(
    board: DispatchBoard,
    operator: User,
    ws_sender: WsSender,
    token: CancellationToken,
) -> ServiceResult<()> {
    let mut incidents = board.watch_returns(&operator).await?;
    loop {
        let snapshot = tokio::select! {
            _ = token.cancelled() => break,
            item = incidents.next() => match item {
                Some(snapshot) => snapshot?,
                None => break,
            },
        };
        let message = ServerMessage::ReturnsSnapshot {
            incidents: snapshot.iter().map(ReturnIncidentResponse::from).collect(),
        };
        if !send_message(&ws_sender, &message).await {
            break;
        }
    }
    Ok(())
}

pub async fn chat_feed(
    messaging: MessagingDesk,
    user: User,
    chat_id: Uuid,
    ws_sender: WsSender,
    token: CancellationToken,
) -> ServiceResult<()> {
    let mut messages = messaging.watch_messages(&user, chat_id).await?;
    loop {
        let snapshot = tokio::select! {
            _ = token.cancelled() => break,
            item = messages.next() => match item {
                Some(snapshot) => snapshot?,
                None => break,
            },
        };
        let message = ServerMessage::ChatSnapshot {
            chat_id,
            messages: snapshot.iter().map(ChatMessageResponse::from).collect(),
        };
        if !send_message(&ws_sender, &message).await {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use driverroom_core::{DutyStatus, PortError, PortResult, Role, ServiceError};
    use futures::channel::mpsc::{unbounded, UnboundedSender};
    use std::time::Duration;
    use tokio::time::timeout;

    fn driver(name: &str, checked_in: bool) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: Role::Driver,
            company_id: Uuid::nil(),
            duty: DutyStatus {
                on_duty: true,
                on_duty_since: Some(Utc::now()),
                checked_in,
                ..DutyStatus::default()
            },
        }
    }

    fn incident(driver: &Driver) -> ReturnIncident {
        ReturnIncident {
            id: Uuid::new_v4(),
            driver_id: driver.id,
            driver_name: driver.name.clone(),
            company_id: Uuid::nil(),
            has_returns: true,
            count: 1,
            reasons: vec!["Customer unavailable".to_string()],
            notified: false,
            created_at: Utc::now(),
        }
    }

    fn feed<T: Send + 'static>() -> (UnboundedSender<PortResult<Vec<T>>>, SnapshotStream<T>) {
        let (tx, rx) = unbounded();
        (tx, Box::pin(rx))
    }

    async fn next_view(views: &mut mpsc::Receiver<RosterView>) -> Option<RosterView> {
        timeout(Duration::from_millis(200), views.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn waits_for_both_feeds_then_rerenders_on_either() {
        let (roster_tx, drivers) = feed::<Driver>();
        let (returns_tx, incidents) = feed::<ReturnIncident>();
        let (views_tx, mut views) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(merge_roster_snapshots(
            drivers,
            incidents,
            views_tx,
            token.clone(),
        ));

        let avery = driver("Avery", false);
        roster_tx.unbounded_send(Ok(vec![avery.clone()])).unwrap();
        assert!(next_view(&mut views).await.is_none());

        returns_tx.unbounded_send(Ok(vec![incident(&avery)])).unwrap();
        let view = next_view(&mut views).await.expect("first board");
        assert_eq!(view.entries.len(), 1);
        assert!(view.entries[0].pending_returns);

        returns_tx.unbounded_send(Ok(Vec::new())).unwrap();
        let view = next_view(&mut views).await.expect("returns change");
        assert!(!view.entries[0].pending_returns);

        let mut checked_in = avery.clone();
        checked_in.duty.checked_in = true;
        roster_tx
            .unbounded_send(Ok(vec![checked_in, driver("Blake", false)]))
            .unwrap();
        let view = next_view(&mut views).await.expect("roster change");
        assert_eq!(view.checked_in_count, 1);
        assert_eq!(view.entries[0].driver.name, "Avery");

        token.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn a_failed_snapshot_ends_the_merge_with_its_error() {
        let (roster_tx, drivers) = feed::<Driver>();
        let (_returns_tx, incidents) = feed::<ReturnIncident>();
        let (views_tx, _views) = mpsc::channel(8);

        roster_tx
            .unbounded_send(Err(PortError::Unexpected("connection reset".to_string())))
            .unwrap();
        let result =
            merge_roster_snapshots(drivers, incidents, views_tx, CancellationToken::new()).await;
        assert!(matches!(result, Err(ServiceError::Port(PortError::Unexpected(_)))));
    }
}
