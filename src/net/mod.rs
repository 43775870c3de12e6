//! Network helpers shared by the interceptors.
//!
//! # Data Flow
//! ```text
//! Forwarding headers (X-Forwarded-For, X-Real-IP)
//!     → peer.rs
//!     → socket address (ConnectInfo / RPC peer)
//!     → client ip of the access record
//! ```

pub mod peer;

pub use peer::{client_ip, is_local_health_check, peer_ip, socket_addr, LOCALHOST};
