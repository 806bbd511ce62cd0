pub mod errors;
pub mod machine;
pub mod order_ref;
pub mod signature;
pub mod status;

pub use errors::DomainError;
pub use machine::MachineType;
pub use status::{retry_allowed, EmailStatus, OrderStatus, PaymentStatus};
