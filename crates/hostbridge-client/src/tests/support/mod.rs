//! Scripted bridge server for client tests.

mod fake_bridge;

pub use fake_bridge::{FakeBridge, ReplyMode, refused_endpoint};
