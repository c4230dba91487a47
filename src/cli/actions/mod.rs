pub mod session;
pub mod token;

// Internal "interpreter" for `Action`, so this module stays small.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Status(GlobalArgs),
    Login(session::LoginArgs),
    Logout(GlobalArgs),
    Authorize(session::AuthorizeArgs),
    Decode(token::DecodeArgs),
    Mint(token::MintArgs),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
