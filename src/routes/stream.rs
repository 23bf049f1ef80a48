use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream", get(connect))
}

/// Long-lived SSE connection carrying realtime push for the authenticated
/// user. The connection manager owns the lifecycle: it writes the
/// `connected` event, replays unread notifications, and heartbeats the
/// transport; when the client goes away the failed heartbeat write reaps
/// the registration. This handler only frames events onto the wire.
async fn connect(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    state.realtime.add_client(&user.sub, tx).await?;

    let preamble = futures::stream::iter([Ok(Event::default().comment("stream open"))]);
    let events = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let frame = Event::default()
            .event(event.name())
            .json_data(&event)
            .ok()?;
        Some((Ok::<_, Infallible>(frame), rx))
    });

    Ok(Sse::new(preamble.chain(events)))
}
