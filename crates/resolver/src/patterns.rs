use std::sync::LazyLock;

use regex::Regex;

/// Username in a canonical live-page link.
pub static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"com/@(.*?)/live").unwrap());

/// Room id in the profile page's meta tags.
pub static ROOM_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"room_id=(.*?)"/>"#).unwrap());

/// Username in the live detail API payload.
pub static UNIQUE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"uniqueId":"(.*?)","#).unwrap());

/// Present in the live detail payload once a broadcast has ended.
pub const ENDED_MARKER: &str = r#""status":4"#;
pub const PRIVATE_ACCOUNT_MARKER: &str = "This account is private";
pub const ROOM_INFO_MARKER: &str = "LiveRoomInfo";
pub const ROOM_ID_MARKER: &str = "room_id";

fn first_capture<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn extract_username(body: &str) -> Option<&str> {
    first_capture(&USERNAME_REGEX, body)
}

pub fn extract_room_id(body: &str) -> Option<&str> {
    first_capture(&ROOM_ID_REGEX, body)
}

pub fn extract_unique_id(body: &str) -> Option<&str> {
    first_capture(&UNIQUE_ID_REGEX, body)
}
