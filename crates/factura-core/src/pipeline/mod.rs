//! Processing pipeline: page assembly, per-document processing, and the
//! bounded batch runner.

mod assembler;
mod batch;
mod processor;

pub use assembler::DocumentAssembler;
pub use batch::BatchRunner;
pub use processor::{DocumentProcessor, ProcessOptions};
