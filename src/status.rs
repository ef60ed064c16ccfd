use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const STATUS_TTL: Duration = Duration::from_secs(10);
pub const ERROR_TTL: Duration = Duration::from_secs(5);
pub const IDLE_STATUS: &str = "Shufflebox";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Message {
    text: String,
    expires_at: Instant,
}

/// Transient status and error lines. Every message is also logged.
#[derive(Debug, Default)]
pub struct StatusBoard {
    status: Option<Message>,
    error: Option<Message>,
}

impl StatusBoard {
    pub fn set_status(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        info!("{text}");
        self.status = Some(Message {
            text,
            expires_at: now + STATUS_TTL,
        });
    }

    /// Errors show on the error line and replace the status line as well.
    pub fn set_error(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        warn!("{text}");
        self.error = Some(Message {
            text: text.clone(),
            expires_at: now + ERROR_TTL,
        });
        self.status = Some(Message {
            text,
            expires_at: now + STATUS_TTL,
        });
    }

    pub fn status(&self) -> &str {
        self.status
            .as_ref()
            .map_or(IDLE_STATUS, |message| message.text.as_str())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|message| message.text.as_str())
    }

    /// Drops messages whose display time has run out.
    pub fn expire(&mut self, now: Instant) {
        if self.status.as_ref().is_some_and(|m| m.expires_at <= now) {
            self.status = None;
        }
        if self.error.as_ref().is_some_and(|m| m.expires_at <= now) {
            self.error = None;
        }
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        [&self.status, &self.error]
            .into_iter()
            .flatten()
            .map(|message| message.expires_at)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_falls_back_to_idle_text_after_ttl() {
        let start = Instant::now();
        let mut board = StatusBoard::default();
        board.set_status("Playing: a", start);
        assert_eq!(board.status(), "Playing: a");

        board.expire(start + Duration::from_secs(9));
        assert_eq!(board.status(), "Playing: a");
        board.expire(start + STATUS_TTL);
        assert_eq!(board.status(), IDLE_STATUS);
    }

    #[test]
    fn error_clears_before_status() {
        let start = Instant::now();
        let mut board = StatusBoard::default();
        board.set_error("Music is paused, cannot skip", start);
        assert_eq!(board.error(), Some("Music is paused, cannot skip"));
        assert_eq!(board.next_expiry(), Some(start + ERROR_TTL));

        board.expire(start + ERROR_TTL);
        assert_eq!(board.error(), None);
        assert_eq!(board.status(), "Music is paused, cannot skip");
    }
}
