//! MuralKit Settings Crate
//!
//! UI tuning values and their persistence in a local key/value store.

pub mod error;
pub mod persistence;
pub mod tuning;

pub use error::{SettingsError, SettingsResult};
pub use persistence::{default_storage_path, LocalStorage, TuningStore};
pub use tuning::{clamp_int, limits_for, TuningLimits, UiTuning, ALL_LIMITS, UI_TUNING_KEY};
