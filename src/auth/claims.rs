use serde::{Deserialize, Serialize};

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user uid
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
