pub mod context;
pub mod engine;
pub mod patterns;
pub mod strength;

pub use engine::EntryFilterEngine;
pub use strength::StrengthCalculator;
