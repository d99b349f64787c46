//! Pipeline stages that turn extracted content into a quiz site: knowledge
//! synthesis, quiz generation, packaging, and the orchestrator tying them
//! together.

mod fanout;
pub mod generator;
pub mod packager;
pub mod pipeline;
mod prompts;
pub mod synthesizer;

pub use generator::{GenerationOutput, GeneratorConfig};
pub use packager::package;
pub use pipeline::{
    PipelineConfig, PipelineOutcome, ProgressReporter, RunStats, SilentProgress, Stage, run,
};
pub use synthesizer::{SynthesisOutput, SynthesizerConfig};
