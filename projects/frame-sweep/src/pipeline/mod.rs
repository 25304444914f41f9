// Frame sampling and detection stages

pub mod detection;
pub mod dispatcher;
pub mod orchestrator;
pub mod runner;
pub mod sampler;
pub mod schedule;
