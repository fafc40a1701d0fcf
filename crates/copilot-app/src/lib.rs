// Copilot service: request dispatch, review and idea flows, WebSocket server.

pub mod app;
pub mod error;
pub mod ideas;
pub mod review;
pub mod state;
pub mod ws_server;

#[cfg(test)]
pub(crate) mod testing;
