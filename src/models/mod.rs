pub mod loaders;
pub mod outcome;
pub mod target;

pub use loaders::load_targets;
pub use outcome::AttemptOutcome;
pub use target::Target;
