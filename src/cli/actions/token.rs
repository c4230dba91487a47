use crate::{
    cli::actions::session::print_json,
    session::{
        clock::{Clock, SystemClock},
        token::{self, encode_unsigned, Claims, Credential},
        Role,
    },
};
use anyhow::{Context, Result};
use serde_json::json;

#[derive(Debug)]
pub struct DecodeArgs {
    pub credential: Credential,
}

#[derive(Debug)]
pub struct MintArgs {
    pub subject: String,
    pub role: Role,
    pub ttl: i64,
}

/// Print the claims of a credential. The signature is not checked.
/// # Errors
/// Returns an error if the credential is malformed.
pub fn decode(args: &DecodeArgs) -> Result<()> {
    let claims = token::decode(args.credential.expose()).context("Could not decode credential")?;
    let expired = claims.is_expired_at(SystemClock.now());

    print_json(&json!({
        "claims": claims,
        "expired": expired,
        "signature_verified": false,
    }))
}

/// Print an unsigned credential, for local testing only.
pub fn mint(args: &MintArgs) {
    let claims = Claims {
        subject: args.subject.clone(),
        role: args.role,
        expiry: SystemClock.now().saturating_add(args.ttl),
    };
    println!("{}", encode_unsigned(&claims));
}
