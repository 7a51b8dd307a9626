//! # arena-session
//!
//! Client-side representation of an authenticated identity.
//!
//! A [`Session`] holds the access token and refresh token issued by the game
//! backend. Expiry, user id, username and session variables are always
//! *derived* by decoding the token claims (the middle, base64url JSON segment
//! of each token); they are never supplied independently.
//!
//! Sessions are pure data: no I/O happens here. The HTTP layer that performs
//! authentication and refresh exchanges hands fresh token pairs to
//! [`Session::apply_tokens`].

#![deny(unsafe_code)]

pub mod claims;
pub mod errors;
pub mod session;

pub use claims::{TokenClaims, decode_claims};
pub use errors::{Result, SessionError};
pub use session::{Session, SessionTokens};
