#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod api;
pub mod app;
pub mod capabilities;
pub mod chat;
pub mod engagement;
pub mod entity;
pub mod event;
pub mod feed;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::{App, Capabilities, Effect, Model, ViewModel};
pub use event::Event;

/// Cadence of the chat polling reconciler while a conversation is open.
pub const POLL_INTERVAL_MS: u64 = 1_000;
pub const MAX_COMPOSE_BYTES: usize = 2_000;
pub const PREVIEW_LENGTH: usize = 80;
pub const PROFILE_CACHE_KEY: &str = "profile.v1";
pub const DEFAULT_API_BASE: &str = "https://api.reelay.app/v1/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    RateLimited,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Internal
        )
    }

    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{}] {message}", .kind.code())]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_status(status: u16, body: Option<&[u8]>) -> Self {
        let kind = ErrorKind::from_status(status);
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorBody>(b).ok())
            .map_or_else(|| format!("HTTP error: {status}"), |e| e.message);
        Self::new(kind, message)
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => "Unable to connect. Check your connection and try again.".into(),
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => "You don't have permission to do that.".into(),
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "That content is no longer available.".into(),
            ErrorKind::RateLimited => "Too many requests. Please wait a moment.".into(),
            ErrorKind::Deserialization
            | ErrorKind::InvalidState
            | ErrorKind::Internal
            | ErrorKind::Unknown => "Something went wrong. Please try again.".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

pub type AppResult<T> = Result<T, AppError>;

/// Compact relative timestamp used by the chat list and message bubbles.
#[must_use]
pub fn format_time_ago(timestamp_ms: u64, now_ms: u64) -> String {
    if timestamp_ms > now_ms {
        return "now".into();
    }

    let secs = now_ms.saturating_sub(timestamp_ms) / 1000;
    if secs < 60 {
        return "now".into();
    }

    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins}m");
    }

    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h");
    }

    let days = hours / 24;
    if days < 7 {
        return format!("{days}d");
    }

    format!("{}w", days / 7)
}

/// Truncate user text for one-line previews, respecting char boundaries.
#[must_use]
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    preview.push('…');
    preview
}
