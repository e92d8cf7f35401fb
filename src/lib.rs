//! Client core for the SendMe errand marketplace: customers post errands,
//! runners take them, and both sides chat in real time.

pub mod api;
pub mod app;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod listener;
pub mod settings;
pub mod storage;
pub mod store;
pub mod utils;
pub mod validate;
pub mod workflow;

pub use app::App;
pub use error::{Error, Result};
