//! Test harness for driving the relay server over real TCP.

mod client;

pub use client::TestClient;
