mod delivery;
mod repository;

pub use delivery::DlqDeliveryTransport;
pub use repository::{DlqQueue, DlqRepository};
