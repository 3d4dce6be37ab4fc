pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpChatApi;
pub use traits::ChatApi;
pub use types::{ApiError, ChatReply, ChatRequest, HistoryEntry};
