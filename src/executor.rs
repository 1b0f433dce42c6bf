use std::time::Duration;

use tracing::{info, warn};

use crate::grid::to_pixels;
use crate::hands::{Session, SessionError};
use crate::types::{Action, Continuation, Viewport};

/// Longest single pause a `wait` action may request.
pub const MAX_WAIT_SECS: f64 = 60.0;

/// Run one decoded action: exactly one session capability per call, points
/// scaled from the grid onto `viewport` first.
pub async fn execute(
    session: &mut dyn Session,
    action: &Action,
    viewport: Viewport,
) -> Result<Continuation, SessionError> {
    match action {
        Action::Click(p) => session.click(to_pixels(viewport, *p)).await?,
        Action::DoubleClick(p) => session.double_click(to_pixels(viewport, *p)).await?,
        Action::RightClick(p) => session.right_click(to_pixels(viewport, *p)).await?,
        Action::Type { text } => session.type_text(text).await?,
        Action::Hotkey { keys } => session.hotkey(keys).await?,
        Action::Scroll { dx, dy } => session.scroll(*dx, *dy).await?,
        Action::Drag { from, to } => {
            session
                .drag(to_pixels(viewport, *from), to_pixels(viewport, *to))
                .await?
        }
        Action::Navigate { url } => session.navigate(url).await?,
        Action::Wait { seconds } => {
            let seconds = seconds.clamp(0.0, MAX_WAIT_SECS);
            session
                .wait(Duration::try_from_secs_f64(seconds).unwrap_or_default())
                .await?
        }
        Action::Done { result } => {
            info!("[Agent] Task complete: {}", result);
            return Ok(Continuation::Stop {
                result: result.clone(),
            });
        }
        Action::Unknown { name } => {
            warn!(
                "[Agent] Unknown action: {}",
                name.as_deref().unwrap_or("<missing>")
            );
        }
    }
    Ok(Continuation::Continue)
}
