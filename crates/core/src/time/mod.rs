pub mod window;

pub use window::{resolve_window, LookbackWindow, DEFAULT_LOOKBACK_YEARS};
