//! User settings and the storage area they live in

pub mod schema;
pub mod store;

pub use schema::{fade_rate, Rgb, Rgba, Settings};
pub use store::{change_bus, SettingsStore, StorageArea, StorageChange, ValueChange};
