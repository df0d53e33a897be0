//! The HTTP gateway binary's library half: everything `main.rs` wires
//! together, factored out so integration tests can build an `AppState`
//! and drive the router without going through a real `TcpListener`.

pub mod api;
pub mod bootstrap;
pub mod runtime;
pub mod state;
