mod free;
mod premium;

pub use free::FreeChatBackend;
pub use premium::PremiumChatBackend;
