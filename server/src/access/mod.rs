//! Access control.
//!
//! Users authenticate with an opaque bearer token. The server only stores
//! the SHA-256 hash of each token, and looks users up by that hash.
//!
//! ## Supplying the token
//!
//! The token can be supplied to the server in one of two ways:
//!
//! - As a normal Bearer token.
//! - As the password in Basic Auth. The username is ignored.
//!
//! ## Uploading
//!
//! Only users who are verified and not banned may upload files.

pub mod http;

use std::str;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use lazy_static::lazy_static;
use regex::Regex;

use crate::database::entity::user::UserModel;
use hatch::hash::Hash;

lazy_static! {
    static ref AUTHORIZATION_REGEX: Regex =
        Regex::new(r"^(?i)((?P<bearer>bearer)|(?P<basic>basic))(?-i) (?P<rest>(.*))$").unwrap();
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub banned: bool,
    pub verified: bool,
}

impl Identity {
    /// Returns whether the user may upload files.
    pub fn can_upload(&self) -> bool {
        !self.banned && self.verified
    }
}

impl From<UserModel> for Identity {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            name: user.name,
            banned: user.banned,
            verified: user.verified,
        }
    }
}

/// Extracts the token from an Authorization header.
pub fn parse_authorization_header(authorization: &str) -> Option<String> {
    let captures = AUTHORIZATION_REGEX.captures(authorization)?;
    let rest = captures.name("rest")?.as_str();

    if captures.name("bearer").is_some() {
        Some(rest.to_string())
    } else {
        let bytes = BASE64_STANDARD.decode(rest).ok()?;

        let user_pass = str::from_utf8(&bytes).ok()?;
        let colon = user_pass.find(':')?;
        let pass = &user_pass[colon + 1..];

        Some(pass.to_string())
    }
}

/// Returns the hash of a token as stored in the database.
pub fn hash_token(token: &str) -> String {
    Hash::sha256_from_bytes(token.as_bytes()).to_base16()
}

#[cfg(test)]
mod tests {
    use super::*;

    use hatch::testing::fake_token;

    #[test]
    fn test_parse_authorization_header() {
        assert_eq!(
            "somepass",
            parse_authorization_header("Basic c29tZXVzZXI6c29tZXBhc3M=").unwrap(),
        );

        assert_eq!(
            "somepass",
            parse_authorization_header("baSIC c29tZXVzZXI6c29tZXBhc3M=").unwrap(),
        );

        assert_eq!(
            "some-token",
            parse_authorization_header("bearer some-token").unwrap(),
        );

        assert_eq!(None, parse_authorization_header("Token some-token"));
        assert_eq!(None, parse_authorization_header("Basic not*base64"));
        assert_eq!(None, parse_authorization_header("Basic bm9jb2xvbg=="));
    }

    #[test]
    fn test_hash_token() {
        let (token, hash) = fake_token("alice");
        assert_eq!(hash, hash_token(&token));
        assert_eq!(64, hash_token("").len());
    }

    #[test]
    fn test_can_upload() {
        let identity = |banned, verified| Identity {
            id: 1,
            name: "alice".to_string(),
            banned,
            verified,
        };

        assert!(identity(false, true).can_upload());
        assert!(!identity(true, true).can_upload());
        assert!(!identity(false, false).can_upload());
    }
}
