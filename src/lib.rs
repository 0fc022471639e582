pub mod config;
pub mod error;
pub mod gateway;
pub mod id;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod notify;
pub mod outbound;
pub mod server;
pub mod session;
pub mod store;
pub mod time;

pub use error::{AppError, AppResult};
pub use gateway::{Collection, Gateway};
pub use store::KitchenStore;
