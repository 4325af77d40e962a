//! Tubetalk Core Library
//!
//! Session controller for asking questions about a YouTube video: validates
//! the video reference, has a remote service ingest its transcript, then
//! runs one question/answer turn at a time against that service.

pub mod backend;
pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod intake;
pub mod runtime;
pub mod session;

// Re-export commonly used items at crate root
pub use backend::{AssistantBackend, BackendError, HttpBackend, QueryReply};
pub use config::{Config, ConfigError};
pub use error::{Result, TubetalkError};
pub use format::{format_clock, format_message, format_transcript};
pub use history::{History, Message, Notice, Origin};
pub use intake::{VideoId, extract_video_id};
pub use runtime::{SessionHandle, SessionOptions, SessionUpdate, UserAction, start_session};
pub use session::{ConversationState, Rejection, RequestKind, RequestTicket, Session, Status};
