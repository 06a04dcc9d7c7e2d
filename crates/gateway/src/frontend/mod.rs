//! Frontend adapters (spec §4.8): accept client connections per protocol
//! and feed requests/streams into the middleware chain. Grounded on the
//! teacher's `axum`-based listener setup (already in its workspace
//! dependency table with the `ws` feature) generalized from the teacher's
//! single mesh listener to the four protocol-specific adapters spec §4.8
//! names.

pub mod grpc;
pub mod http;
pub mod sse;
pub mod websocket;

pub use http::HttpAdapter;
