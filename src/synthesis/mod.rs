//! Модуль озвучивания текста
//!
//! Текст целиком или построчно отправляется в сервис синтеза, результаты
//! сохраняются в папку и проходят постобработку (пауза, подгонка темпа).

pub mod orchestrator;
pub mod units;

pub use orchestrator::SynthesisOrchestrator;
pub use units::{BatchReport, SynthesisUnit, UnitOutcome};
