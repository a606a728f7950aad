use serde::Serialize;
use time::{format_description::well_known::Rfc3339, macros::format_description};

use super::model::User;

/// Public shape of a user. Never carries credential material.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserDto {
    pub uid: i64,
    pub username: String,
    pub sex: &'static str,
    pub profile: String,
    pub avatar_url: String,
    pub birth_time: String,
    pub authority: &'static str,
    pub register_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl UserDto {
    /// `show_private` exposes the phone number; callers decide who may see it.
    pub fn from_user(user: &User, image_url_prefix: &str, show_private: bool) -> Self {
        let birth_time = user
            .birthday
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_default();
        let register_time = user.created_at.format(&Rfc3339).unwrap_or_default();

        Self {
            uid: user.uid,
            username: user.username.clone(),
            sex: user.sex.as_str(),
            profile: user.profile.clone(),
            avatar_url: avatar_url(image_url_prefix, &user.avatar_url),
            birth_time,
            authority: user.authority.as_str(),
            register_time,
            phone_number: if show_private {
                user.phone_number.clone()
            } else {
                None
            },
        }
    }
}

fn avatar_url(prefix: &str, avatar: &str) -> String {
    if avatar.is_empty() || avatar.starts_with("http://") || avatar.starts_with("https://") {
        return avatar.to_string();
    }
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        avatar.trim_start_matches('/')
    )
}
