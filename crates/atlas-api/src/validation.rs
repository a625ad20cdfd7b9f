//! Field-level checks for incoming requests.
//!
//! Every create/update body implements [`Validate`]; handlers call it before
//! touching the database and return all failing fields at once.

use atlas_types::api::{
    ChangePasswordRequest, CreateCommentRequest, CreateFamilyRequest, CreateFindingRequest,
    CreateHabitatRequest, CreateMushroomRequest, CreateRecipeRequest, CreateTipRequest,
    ForwardMessageRequest, RateRecipeRequest, RegisterRequest, ReplyMessageRequest,
    SendMessageRequest, UpdateProfileRequest,
};

use crate::error::{ApiError, FieldErrors};

pub const MIN_PASSWORD_LEN: usize = 8;

pub trait Validate {
    fn check(&self, errors: &mut FieldErrors);

    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        self.check(&mut errors);
        errors.into_result()
    }
}

fn required(errors: &mut FieldErrors, field: &str, value: &str, max: Option<usize>) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
        return;
    }
    max_len(errors, field, value, max);
}

fn max_len(errors: &mut FieldErrors, field: &str, value: &str, max: Option<usize>) {
    if let Some(max) = max {
        if value.chars().count() > max {
            errors.add(field, format!("Ensure this value has at most {max} characters."));
        }
    }
}

fn optional_max(errors: &mut FieldErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        max_len(errors, field, value, Some(max));
    }
}

fn email(errors: &mut FieldErrors, value: &str) {
    if value.is_empty() {
        return;
    }
    max_len(errors, "email", value, Some(254));
    let valid = value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
}

fn new_password(errors: &mut FieldErrors, field: &str, password: &str, confirm: &str, confirm_field: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if password != confirm {
        errors.add(confirm_field, "The two password fields didn't match.");
    }
}

impl Validate for RegisterRequest {
    fn check(&self, errors: &mut FieldErrors) {
        let len = self.username.chars().count();
        if !(3..=32).contains(&len) {
            errors.add("username", "Username must be between 3 and 32 characters.");
        }
        if !self
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            errors.add("username", "Username may contain only letters, digits and @/./+/-/_.");
        }
        new_password(errors, "password", &self.password, &self.password_confirm, "password_confirm");
        max_len(errors, "first_name", &self.first_name, Some(150));
        max_len(errors, "last_name", &self.last_name, Some(150));
        email(errors, &self.email);
    }
}

impl Validate for ChangePasswordRequest {
    fn check(&self, errors: &mut FieldErrors) {
        if self.old_password.is_empty() {
            errors.add("old_password", "This field is required.");
        }
        new_password(
            errors,
            "new_password",
            &self.new_password,
            &self.new_password_confirm,
            "new_password_confirm",
        );
    }
}

impl Validate for UpdateProfileRequest {
    fn check(&self, errors: &mut FieldErrors) {
        optional_max(errors, "first_name", self.first_name.as_deref(), 150);
        optional_max(errors, "last_name", self.last_name.as_deref(), 150);
        if let Some(value) = &self.email {
            email(errors, value);
        }
    }
}

impl Validate for CreateFamilyRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "name", &self.name, Some(100));
        required(errors, "name_latin", &self.name_latin, Some(100));
    }
}

impl Validate for CreateHabitatRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "name", &self.name, Some(50));
    }
}

impl Validate for CreateMushroomRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "name_cz", &self.name_cz, Some(100));
        required(errors, "name_latin", &self.name_latin, Some(100));
    }
}

impl Validate for CreateRecipeRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "title", &self.title, Some(120));
        required(errors, "ingredients", &self.ingredients, None);
        required(errors, "instructions", &self.instructions, None);
        optional_max(errors, "source", self.source.as_deref(), 200);
    }
}

impl Validate for RateRecipeRequest {
    fn check(&self, errors: &mut FieldErrors) {
        if !(1..=5).contains(&self.value) {
            errors.add("value", "Rating must be between 1 and 5.");
        }
    }
}

impl Validate for CreateTipRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "title", &self.title, Some(500));
        required(errors, "content", &self.content, None);
    }
}

impl Validate for CreateFindingRequest {
    fn check(&self, errors: &mut FieldErrors) {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            errors.add("latitude", "Latitude must be between -90 and 90.");
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            errors.add("longitude", "Longitude must be between -180 and 180.");
        }
    }
}

impl Validate for CreateCommentRequest {
    fn check(&self, errors: &mut FieldErrors) {
        required(errors, "text", &self.text, None);
    }
}

impl Validate for SendMessageRequest {
    fn check(&self, errors: &mut FieldErrors) {
        optional_max(errors, "subject", self.subject.as_deref(), 255);
        required(errors, "content", &self.content, None);
    }
}

impl Validate for ReplyMessageRequest {
    fn check(&self, errors: &mut FieldErrors) {
        optional_max(errors, "subject", self.subject.as_deref(), 255);
        required(errors, "content", &self.content, None);
    }
}

impl Validate for ForwardMessageRequest {
    fn check(&self, errors: &mut FieldErrors) {
        optional_max(errors, "subject", self.subject.as_deref(), 255);
        if let Some(content) = &self.content {
            required(errors, "content", content, None);
        }
    }
}
