//! Interceptor chain around a base `ChatClient` (spec.md §9): each layer
//! wraps the next and calls through it, the same composition pattern the
//! teacher's `reqwest-middleware` chain uses for HTTP requests.

mod retry;
mod token_tracking;

pub use retry::RetryingChatClient;
pub use token_tracking::TokenTrackingChatClient;
