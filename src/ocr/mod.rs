pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{recognizer_from_config, RecognitionMode, TextRecognizer};
pub use preprocess::to_gray;
pub use setup::ensure_tessdata;
