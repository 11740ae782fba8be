//! Request payload checks that collect every failing field before answering.

use once_cell::sync::Lazy;
use platform_api::{ApiError, ApiResult, FieldError};
use platform_db::{MAX_PAGE_SIZE, PageRequest};
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});
static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid phone pattern"));
static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("valid username pattern"));

/// Upper bound for any single money amount: 10 billion in major units.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError::new(field, message));
        self
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.fail(field, message);
        }
        self
    }

    pub fn required(&mut self, value: &str, field: &str, message: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, message)
    }

    pub fn len_range(&mut self, value: &str, min: usize, max: usize, field: &str) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.fail(
                field,
                format!("{field} must be between {min} and {max} characters"),
            );
        }
        self
    }

    pub fn max_len(&mut self, value: Option<&str>, max: usize, field: &str) -> &mut Self {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.fail(field, format!("{field} cannot exceed {max} characters"));
        }
        self
    }

    pub fn email(&mut self, value: &str, field: &str) -> &mut Self {
        self.check(
            is_email(value),
            field,
            "Please provide a valid email address",
        )
    }

    pub fn phone(&mut self, value: Option<&str>, field: &str) -> &mut Self {
        if let Some(phone) = value.filter(|p| !p.is_empty()) {
            self.check(
                is_phone(phone),
                field,
                "Please provide a valid phone number",
            );
        }
        self
    }

    /// A money amount in `0..=MAX_AMOUNT_CENTS`.
    pub fn amount(&mut self, value: Option<i64>, field: &str) -> &mut Self {
        if let Some(value) = value {
            if value < 0 {
                self.fail(field, format!("{field} must be a positive number"));
            } else if value > MAX_AMOUNT_CENTS {
                self.fail(field, format!("{field} cannot exceed {MAX_AMOUNT_CENTS}"));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_phone(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE.is_match(&compact)
}

pub fn is_username(value: &str) -> bool {
    USERNAME.is_match(value)
}

/// At least 6 characters with an upper-case letter, a lower-case letter and a digit.
pub fn password_problem(password: &str) -> Option<&'static str> {
    if password.chars().count() < 6 {
        return Some("Password must be at least 6 characters long");
    }
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if upper && lower && digit {
        None
    } else {
        Some("Password must contain at least one uppercase letter, one lowercase letter, and one number")
    }
}

pub fn is_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Build a [`PageRequest`] from raw query values, rejecting out-of-range pairs.
pub fn page(page: Option<u64>, limit: Option<u64>, default_limit: u64) -> ApiResult<PageRequest> {
    let request = PageRequest::new(page.unwrap_or(1), limit.unwrap_or(default_limit));
    if let Some(valid) = request.validated() {
        return Ok(valid);
    }
    let mut checks = Checks::new();
    checks.check(request.page >= 1, "page", "Page must be a positive integer");
    checks.check(
        (1..=MAX_PAGE_SIZE).contains(&request.limit),
        "limit",
        "Limit must be between 1 and 100",
    );
    checks.finish()?;
    Err(ApiError::bad_request("Invalid pagination"))
}

/// Sum money amounts, failing on overflow instead of wrapping.
pub fn sum_cents<I>(values: I, field: &str) -> ApiResult<i64>
where
    I: IntoIterator<Item = i64>,
{
    values
        .into_iter()
        .try_fold(0i64, i64::checked_add)
        .ok_or_else(|| ApiError::field(field, format!("{field} is too large")))
}

/// Trim and drop empty strings from optional text inputs.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
