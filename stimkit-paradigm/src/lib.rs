//! Sequencing of stimuli into a playable paradigm.

pub mod config;
pub mod dataset;
pub mod descriptor;
pub mod paradigm;
pub mod script;

pub use config::{DataConfig, DataFormat, ParadigmConfig};
pub use dataset::Dataset;
pub use descriptor::StimulusDescriptor;
pub use paradigm::Paradigm;
pub use script::Script;
