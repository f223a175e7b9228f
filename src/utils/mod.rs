//! Shared tensor utilities

pub mod preprocessing;
pub mod validation;

pub use preprocessing::ImagePreprocessor;
pub use validation::TensorValidator;
