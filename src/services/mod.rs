pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountError, AccountService, NewAccount, Registration};
pub use account_service_impl::SeaOrmAccountService;

pub mod avatar;
pub use avatar::{AvatarError, AvatarService};

pub mod token_service;
pub use token_service::{TokenError, TokenPair, TokenService};

pub mod validation;
