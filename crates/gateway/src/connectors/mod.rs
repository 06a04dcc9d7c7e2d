//! Backend connectors, one per protocol (spec §4.2). Each implements
//! `forward`/`connect` per the spec's per-protocol contract; grounded on
//! the teacher's `proxy::httpproxy` forwarding path, with gRPC/SSE/WS split
//! out into their own modules the way the teacher keeps `client/`, `http/`,
//! and `proxy/` separate.

pub mod grpc;
pub mod http;
pub mod sse;
pub mod websocket;

pub use grpc::GrpcConnector;
pub use http::HttpConnector;
pub use sse::SseConnector;
pub use websocket::WebSocketConnector;
