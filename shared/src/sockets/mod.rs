pub mod broadcast;
pub mod changes;
pub mod connections;
pub mod handler;
pub mod messages;
pub mod topics;

pub use broadcast::{broadcast_change, BroadcastReport, ConnectionPusher};
pub use changes::DocumentChange;
pub use handler::{handle_websocket_event, websocket_route};
