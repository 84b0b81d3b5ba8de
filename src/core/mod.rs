pub mod accumulator;
pub mod coordinator;
pub mod guard;
pub mod outcome;
pub mod session;
pub mod subscriptions;

pub use crate::domain::model::{Channel, EnrollmentForm, UserSubscription};
pub use crate::domain::ports::{
    ConfigProvider, RemoteWriteClient, Storage, TrackerApi, WriteError,
};
pub use crate::utils::error::Result;
