//! Mixing and the lifetime of in-flight sounds

pub mod facade;
pub mod mixer;
pub mod sound;

pub use facade::{AudioFacade, PlayOutcome};
pub use mixer::MixingEngine;
pub use sound::{SoundId, SoundPayload};
