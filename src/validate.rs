use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

static PASSWORD_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{6,}$").expect("password pattern"));

// Letters, digits, underscore and CJK unified ideographs U+4E00..U+9FA5.
static USERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_\x{4e00}-\x{9fa5}]{2,30}$").expect("username pattern")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// At least six ASCII letters/digits, containing at least one of each.
pub fn is_valid_password(password: &str) -> bool {
    PASSWORD_CHARS.is_match(password)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME.is_match(username)
}
