use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::models::{MemberSignup, NewItem, PasswordResetConfirm, StoreSignup, ITEM_CONDITIONS};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_ITEM_IMAGES: usize = 5;

static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Default)]
struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn required(&mut self, field: &str, value: &str, label: &str) {
        if value.trim().is_empty() {
            self.add(field, &format!("{} is required.", label));
        }
    }

    fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    RE_EMAIL.is_match(email.trim())
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "Email is required.");
    } else if !is_valid_email(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

fn check_password(errors: &mut FieldErrors, field: &str, password: &str, confirm: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            &format!("Password must be at least {} characters.", MIN_PASSWORD_LEN),
        );
    }
    if password != confirm {
        errors.add("password_confirm", "Passwords do not match.");
    }
}

pub fn validate_member_signup(form: &MemberSignup) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, &form.email);
    check_password(&mut errors, "password", &form.password, &form.password_confirm);
    errors.required("first_name", &form.first_name, "First name");
    errors.required("last_name", &form.last_name, "Last name");
    errors.finish()
}

pub fn validate_store_signup(form: &StoreSignup) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, &form.email);
    check_password(&mut errors, "password", &form.password, &form.password_confirm);
    errors.required("store_name", &form.store_name, "Store name");
    errors.required("address", &form.address, "Address");
    errors.required("city", &form.city, "City");
    errors.finish()
}

pub fn validate_password_reset_request(email: &str) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    check_email(&mut errors, email);
    errors.finish()
}

pub fn validate_password_reset_confirm(form: &PasswordResetConfirm, confirm: &str) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    errors.required("uid", &form.uid, "Reset link");
    errors.required("token", &form.token, "Reset link");
    check_password(&mut errors, "new_password", &form.new_password, confirm);
    errors.finish()
}

/// Item form checks, reported in the same field-keyed shape the backend uses.
pub fn validate_new_item(item: &NewItem) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    errors.required("name", &item.name, "Name");
    if !ITEM_CONDITIONS.contains(&item.condition.as_str()) {
        errors.add(
            "condition",
            &format!("Condition must be one of: {}.", ITEM_CONDITIONS.join(", ")),
        );
    }
    errors.required("category", &item.category, "Category");
    if !(item.price.is_finite() && item.price > 0.0) {
        errors.add("price", "Price must be greater than zero.");
    }
    if item.images.len() > MAX_ITEM_IMAGES {
        errors.add(
            "images",
            &format!("At most {} images are allowed.", MAX_ITEM_IMAGES),
        );
    }
    errors.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> MemberSignup {
        MemberSignup {
            email: "ana@example.com".to_string(),
            password: "longenough".to_string(),
            password_confirm: "longenough".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Li".to_string(),
        }
    }

    fn fields(result: AppResult<()>) -> BTreeMap<String, Vec<String>> {
        match result {
            Err(AppError::Validation(fields)) => fields,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("a.b@shop.co.uk"));
        assert!(!is_valid_email("a.b@shop"));
        assert!(!is_valid_email("a b@shop.com"));
    }

    #[test]
    fn test_valid_member_signup() {
        assert!(validate_member_signup(&member()).is_ok());
    }

    #[test]
    fn test_member_signup_errors() {
        let form = MemberSignup {
            email: "nope".to_string(),
            password: "short".to_string(),
            password_confirm: "shorter".to_string(),
            last_name: String::new(),
            ..member()
        };
        let errors = fields(validate_member_signup(&form));
        assert_eq!(errors["email"], vec!["Enter a valid email address."]);
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("password_confirm"));
        assert!(errors.contains_key("last_name"));
        assert!(!errors.contains_key("first_name"));
    }

    #[test]
    fn test_store_signup_requires_store_fields() {
        let form = StoreSignup {
            email: "shop@example.com".to_string(),
            password: "longenough".to_string(),
            password_confirm: "longenough".to_string(),
            store_name: String::new(),
            address: "1 High St".to_string(),
            city: " ".to_string(),
            phone_number: None,
        };
        let errors = fields(validate_store_signup(&form));
        assert!(errors.contains_key("store_name"));
        assert!(errors.contains_key("city"));
        assert_eq!(errors.len(), 2);
    }

    fn lamp() -> NewItem {
        NewItem {
            name: "Lamp".to_string(),
            description: String::new(),
            condition: "good".to_string(),
            category: "home".to_string(),
            price: 15.0,
            images: vec![],
        }
    }

    #[test]
    fn test_valid_item_passes() {
        assert!(validate_new_item(&lamp()).is_ok());
    }

    #[test]
    fn test_item_errors_by_field() {
        let item = NewItem {
            name: " ".to_string(),
            condition: "mint".to_string(),
            price: 0.0,
            ..lamp()
        };
        let errors = fields(validate_new_item(&item));
        assert_eq!(errors["name"], vec!["Name is required."]);
        assert!(errors["condition"][0].starts_with("Condition must be one of"));
        assert_eq!(errors["price"], vec!["Price must be greater than zero."]);
        assert!(!errors.contains_key("category"));
    }
}
