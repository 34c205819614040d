//! Конвейер подгонки озвучки под слоты
//!
//! Компоненты: классификатор скорости, планировщик пакетного синтеза,
//! корректор текста и оркестратор, связывающий их вместе.

pub mod classifier;
pub mod corrector;
pub mod orchestrator;
pub mod scheduler;

pub use classifier::{classify, Classification};
pub use corrector::TextFitCorrector;
pub use orchestrator::{NarrationPipeline, OutcomeSummary, PipelineOracles, PipelineOutcome};
pub use scheduler::BatchScheduler;
