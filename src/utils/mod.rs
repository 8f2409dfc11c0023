mod validation;

// Validation operations
pub use validation::{mse, valid_audio, valid_multichannel};
