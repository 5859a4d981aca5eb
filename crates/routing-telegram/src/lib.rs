pub mod connector;

pub use connector::TelegramConnector;
