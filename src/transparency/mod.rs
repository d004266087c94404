//! Transparency module for the face landmarks agent.
//!
//! Tracks and exposes what the agent did with the camera, supporting user
//! trust and regulatory compliance.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
