pub mod base;
pub mod signal_follow;

pub use base::Strategy;
pub use signal_follow::SignalFollowStrategy;
