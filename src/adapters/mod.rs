pub mod gateway;
pub mod mailer;
pub mod storage;

pub use gateway::{GatewayOrder, GatewayPaymentDetails, PaymentGateway, RazorpayClient};
pub use mailer::{EmailAttachment, EmailMessage, HttpMailer, Mailer};
pub use storage::{FileStorage, HttpFileStorage};
