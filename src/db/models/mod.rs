pub mod alert;
pub mod reading;
pub mod record;

pub use alert::{Alert, NewAlert};
pub use reading::{NewReading, Reading};
pub use record::{Collection, NewRecord, Record};
