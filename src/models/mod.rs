pub mod company;
pub mod exchange;
pub mod quote;

pub use company::{Company, CompanyDailyQuote};
pub use exchange::{parse_timezone, Exchange, ExchangeDailyQuote};
pub use quote::{Quote, Serial, SerialType};
