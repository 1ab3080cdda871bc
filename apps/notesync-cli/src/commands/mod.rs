pub mod client;
pub mod store;

pub use client::{ClientArgs, PingArgs, PullArgs, PushArgs};
pub use store::{InitArgs, UserCmd};
