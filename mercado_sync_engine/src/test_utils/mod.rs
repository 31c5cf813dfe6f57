//! Test doubles for the engine's two seams: storage and the outbound marketplace client.
pub mod mocks;
