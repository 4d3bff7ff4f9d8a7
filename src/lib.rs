pub mod alarm;
pub mod alerts;
pub mod api;
pub mod config;
pub mod poller;
pub mod session;
pub mod store;
pub mod validate;
pub mod watchlist;

pub use alarm::{AlarmHandle, RingtonePlayer};
pub use alerts::{AlarmDefaults, AlertSink, ConsoleAlert};
pub use api::{ApiClient, ApiError};
pub use config::ClientConfig;
pub use poller::{PollerController, PollerSetup};
pub use session::Session;
pub use store::ProfileStore;
pub use watchlist::Watchlist;
