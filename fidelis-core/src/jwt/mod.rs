//! Compact JWS parsing and verification, shared by SafetyNet responses and
//! the metadata service TOC.

mod token;
mod validator;
mod x5c;

pub use token::Jwt;
pub use validator::{JwsAlgorithm, JwtValidator, ValidationContext};
pub use x5c::{X5cParameter, X5cParameterReader};
