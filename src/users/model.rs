use time::{Date, OffsetDateTime};

/// Privilege tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Normal,
    Admin,
}

impl Authority {
    pub fn as_str(self) -> &'static str {
        match self {
            Authority::Normal => "normal",
            Authority::Admin => "admin",
        }
    }

    /// Unknown values fall back to the lowest tier.
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Authority::Admin,
            _ => Authority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Unknown => "unknown",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "male" => Sex::Male,
            "female" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

/// Identity record. Holds no credential material.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub uid: i64,
    pub username: String,
    pub sex: Sex,
    pub profile: String,
    pub avatar_url: String,
    pub birthday: Date,
    pub authority: Authority,
    pub phone_number: Option<String>,
    pub register_ip: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.authority == Authority::Admin
    }
}

/// Birthday stored for accounts that never set one.
pub const DEFAULT_BIRTHDAY: Date = time::macros::date!(2000 - 01 - 01);

/// Input for creating a user together with its credential row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub register_ip: Option<String>,
}

/// A user joined with its stored password hash.
#[derive(Debug, Clone)]
pub struct Credential {
    pub user: User,
    pub password_hash: String,
}
