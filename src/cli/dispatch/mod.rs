use crate::{
    cli::{
        actions::{
            session::{AuthorizeArgs, LoginArgs},
            token::{DecodeArgs, MintArgs},
            Action,
        },
        globals::GlobalArgs,
    },
    session::{token::Credential, Role},
};
use anyhow::{anyhow, Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let (name, sub) = matches.subcommand().context("missing subcommand")?;

    // Global args are propagated to the subcommand matches.
    let globals = || -> Result<GlobalArgs> {
        sub.get_one::<String>("profile-dir")
            .map(GlobalArgs::new)
            .context("missing required argument: --profile-dir")
    };
    let string = |id: &str| -> Result<String> {
        sub.get_one::<String>(id)
            .cloned()
            .with_context(|| format!("missing required argument: --{id}"))
    };
    let role = || -> Result<Role> {
        sub.get_one::<Role>("role")
            .copied()
            .context("missing required argument: --role")
    };

    match name {
        "status" => Ok(Action::Status(globals()?)),
        "login" => Ok(Action::Login(LoginArgs {
            globals: globals()?,
            credential: Credential::new(string("token")?),
            role: role()?,
        })),
        "logout" => Ok(Action::Logout(globals()?)),
        "authorize" => Ok(Action::Authorize(AuthorizeArgs {
            globals: globals()?,
            path: string("path")?,
        })),
        "decode" => Ok(Action::Decode(DecodeArgs {
            credential: Credential::new(string("token")?),
        })),
        "mint" => Ok(Action::Mint(MintArgs {
            subject: string("subject")?,
            role: role()?,
            ttl: sub.get_one::<i64>("ttl").copied().unwrap_or(3600),
        })),
        other => Err(anyhow!("unknown command: {other}")),
    }
}
