pub mod email;
pub mod instagram;
pub mod messenger;
pub mod sms;
pub mod webchat;
pub mod whatsapp;

pub use email::EmailConnector;
pub use instagram::InstagramConnector;
pub use messenger::MessengerConnector;
pub use sms::SmsConnector;
pub use webchat::WebChatConnector;
pub use whatsapp::WhatsAppConnector;
