//! Stored records: add-on installations and the GitHub tokens they own.

pub mod account;
pub mod github_token;
pub mod token_id;

pub use account::*;
pub use github_token::*;
pub use token_id::*;
