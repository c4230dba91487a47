use crate::session::{Role, GIT_COMMIT_HASH};
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser, TypedValueParser, ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

fn role_arg() -> Arg {
    Arg::new("role")
        .long("role")
        .help("Portal role")
        .required(true)
        .value_parser(
            PossibleValuesParser::new(Role::ALL.map(Role::as_str))
                .try_map(|value| value.parse::<Role>()),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), GIT_COMMIT_HASH).into_boxed_str(),
    );

    Command::new("portal-session")
        .about("Inspect and drive the internship portal session")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("profile-dir")
                .long("profile-dir")
                .help("Directory holding the stored credential")
                .env("PORTAL_PROFILE_DIR")
                .global(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PORTAL_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(Command::new("status").about("Restore the stored session and print it"))
        .subcommand(
            Command::new("login")
                .about("Store a credential and sign in")
                .arg(
                    Arg::new("token")
                        .long("token")
                        .help("Bearer credential returned by the login endpoint")
                        .env("PORTAL_TOKEN")
                        .hide_env_values(true)
                        .required(true),
                )
                .arg(role_arg()),
        )
        .subcommand(Command::new("logout").about("Clear the stored credential"))
        .subcommand(
            Command::new("authorize")
                .about("Decide whether a portal path may render for the stored session")
                .arg(Arg::new("path").help("Portal path, e.g. /admin/dashboard").required(true)),
        )
        .subcommand(
            Command::new("decode")
                .about("Print the claims of a credential without verifying it")
                .arg(Arg::new("token").help("Bearer credential").required(true)),
        )
        .subcommand(
            Command::new("mint")
                .about("Print an unsigned credential for local testing")
                .arg(
                    Arg::new("subject")
                        .long("subject")
                        .help("Subject (username)")
                        .required(true),
                )
                .arg(role_arg())
                .arg(
                    Arg::new("ttl")
                        .long("ttl")
                        .help("Seconds until expiry, negative for an expired credential")
                        .default_value("3600")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(i64)),
                ),
        )
}
