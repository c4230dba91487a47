use crate::cli::actions::{session, token, Action};
use anyhow::Result;

/// Execute the provided action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Status(globals) => session::status(globals).await,
        Action::Login(args) => session::login(args).await,
        Action::Logout(globals) => session::logout(globals).await,
        Action::Authorize(args) => session::authorize(args).await,
        Action::Decode(args) => token::decode(&args),
        Action::Mint(args) => {
            token::mint(&args);
            Ok(())
        }
    }
}
