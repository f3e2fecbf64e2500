pub mod http;
pub mod messages;
pub mod socketio;
pub mod traits;
