//! 仓储实现

pub mod ban_repository_impl;
pub mod filter_pattern_repository_impl;
pub mod message_repository_impl;
pub mod settings_repository_impl;

pub use ban_repository_impl::*;
pub use filter_pattern_repository_impl::*;
pub use message_repository_impl::*;
pub use settings_repository_impl::*;
