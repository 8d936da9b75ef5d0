//! Form payloads and their field-level validation.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::res::escape;

pub const TOPIC_MAX: usize = 200;
pub const ROOM_NAME_MAX: usize = 200;
pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwertyuiop", "qwerty123", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "abc12345", "letmein1", "trustno1", "passw0rd",
    "superman", "11111111", "00000000", "asdfghjkl", "dragon12", "monkey123",
];

/// Field name to error messages, rendered next to each input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the messages for one field as an error list, empty when clean.
    pub fn html(&self, field: &str) -> String {
        let messages = self.get(field);
        if messages.is_empty() {
            return String::new();
        }
        let items: String = messages
            .iter()
            .map(|message| format!("<li>{}</li>", escape(message)))
            .collect();
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn required(errors: &mut FieldErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        false
    } else {
        true
    }
}

fn max_len(errors: &mut FieldErrors, field: &'static str, value: &str, max: usize) {
    let len = value.trim().chars().count();
    if len > max {
        errors.add(field, format!("Ensure this value has at most {max} characters (it has {len})."));
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomForm {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Only honoured for staff; everyone else hosts their own rooms.
    #[serde(default)]
    pub host: Option<String>,
}

impl RoomForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if required(&mut errors, "topic", &self.topic) {
            max_len(&mut errors, "topic", &self.topic, TOPIC_MAX);
        }
        if required(&mut errors, "name", &self.name) {
            max_len(&mut errors, "name", &self.name, ROOM_NAME_MAX);
        }
        errors.into_result()
    }

    /// The username a staff member asked to host the room, if any.
    pub fn requested_host(&self) -> Option<&str> {
        self.host.as_deref().map(str::trim).filter(|host| !host.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl SignUpForm {
    /// Checks everything except username uniqueness, which needs the database.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        if required(&mut errors, "username", &self.username) {
            let username = self.username.trim();
            max_len(&mut errors, "username", username, USERNAME_MAX);
            if !username.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if required(&mut errors, field, value) {
                max_len(&mut errors, field, value, NAME_MAX);
            }
        }

        if required(&mut errors, "email", &self.email) && !is_email(self.email.trim()) {
            errors.add("email", "Enter a valid email address.");
        }

        if required(&mut errors, "password1", &self.password1) {
            for problem in self.password_problems() {
                errors.add("password2", problem);
            }
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors.into_result()
    }

    fn password_problems(&self) -> Vec<&'static str> {
        let password = self.password1.as_str();
        let mut problems = Vec::new();

        if password.chars().count() < PASSWORD_MIN {
            problems.push("This password is too short. It must contain at least 8 characters.");
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            problems.push("This password is entirely numeric.");
        }
        if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
            problems.push("This password is too common.");
        }

        let lowered = password.to_lowercase();
        let email_local = self.email.split('@').next().unwrap_or_default();
        let similar = [self.username.as_str(), self.first_name.as_str(), self.last_name.as_str(), email_local]
            .into_iter()
            .map(|attr| attr.trim().to_lowercase())
            .filter(|attr| attr.chars().count() >= 3)
            .any(|attr| lowered.contains(&attr) || attr.contains(&lowered));
        if similar {
            problems.push("The password is too similar to your personal information.");
        }

        problems
    }
}

fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignUpForm {
        SignUpForm {
            username: "newuser".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: "john.doe@example.com".into(),
            password1: "securepassword123".into(),
            password2: "securepassword123".into(),
        }
    }

    #[test]
    fn room_form_with_topic_and_name_is_valid() {
        let form = RoomForm {
            topic: "Python".into(),
            name: "Django Room".into(),
            description: "A room to discuss Django.".into(),
            host: None,
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn room_form_requires_topic_and_name() {
        let errors = RoomForm::default().validate().unwrap_err();
        assert!(errors.contains("topic"));
        assert!(errors.contains("name"));
        assert!(!errors.contains("description"));
    }

    #[test]
    fn room_form_limits_name_length() {
        let form = RoomForm { topic: "Python".into(), name: "x".repeat(201), ..Default::default() };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("name"), ["Ensure this value has at most 200 characters (it has 201)."]);
    }

    #[test]
    fn requested_host_ignores_blank_values() {
        let mut form = RoomForm { host: Some("  ".into()), ..Default::default() };
        assert_eq!(form.requested_host(), None);
        form.host = Some(" admin ".into());
        assert_eq!(form.requested_host(), Some("admin"));
    }

    #[test]
    fn signup_with_good_data_is_valid() {
        assert!(signup().validate().is_ok());
    }

    #[test]
    fn signup_flags_every_bad_field() {
        let form = SignUpForm {
            username: "".into(),
            email: "invalid-email".into(),
            password1: "short".into(),
            password2: "notmatching".into(),
            ..signup()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("email"));
        assert!(errors.contains("password2"));
    }

    #[test]
    fn signup_rejects_mismatched_passwords() {
        let form = SignUpForm { password2: "differentpassword".into(), ..signup() };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("password2"), ["The two password fields didn't match."]);
    }

    #[test]
    fn signup_rejects_weak_passwords() {
        for weak in ["12345678901", "password123", "newuser2024"] {
            let form = SignUpForm { password1: weak.into(), password2: weak.into(), ..signup() };
            assert!(form.validate().unwrap_err().contains("password2"), "{weak} accepted");
        }
    }

    #[test]
    fn signup_rejects_bad_username_characters() {
        let form = SignUpForm { username: "new user!".into(), ..signup() };
        assert!(form.validate().unwrap_err().contains("username"));
    }

    #[test]
    fn field_errors_render_escaped() {
        let mut errors = FieldErrors::default();
        assert_eq!(errors.html("name"), "");
        errors.add("name", "<bad>");
        assert_eq!(errors.html("name"), r#"<ul class="errorlist"><li>&lt;bad&gt;</li></ul>"#);
    }

    #[test]
    fn email_shape() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("@b.co"));
        assert!(!is_email("a@@b.co"));
        assert!(!is_email("a b@c.de"));
    }
}
