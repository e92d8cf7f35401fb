use crate::api::models::{Attachment, NewErrand, Role, SignInRequest, SignUpRequest};
use crate::error::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_ERRAND_PRICE: f64 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default)]
pub struct ErrandForm {
    pub title: String,
    pub description: String,
    pub pickup: String,
    pub dropoff: String,
    /// As typed; parsed during validation.
    pub price: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunnerForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub relative_phone: String,
    pub location: String,
    pub vehicle: String,
    pub national_id: String,
    pub national_slip_image: Option<Attachment>,
    pub photo: Option<Attachment>,
}

fn invalid<T>(field: &'static str, message: &str) -> Result<T> {
    Err(Error::Validation { field, message: message.to_string() })
}

fn required(field: &'static str, value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return invalid(field, message);
    }
    Ok(trimmed.to_string())
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
        && !value.chars().any(char::is_whitespace)
}

fn email(value: &str) -> Result<String> {
    let value = required("email", value, "Email is required")?;
    if !looks_like_email(&value) {
        return invalid("email", "Invalid email address");
    }
    Ok(value)
}

fn new_password(value: &str) -> Result<String> {
    if value.is_empty() {
        return invalid("password", "Password is required");
    }
    if value.chars().count() < MIN_PASSWORD_LEN {
        return invalid("password", "Password must be at least 6 characters");
    }
    Ok(value.to_string())
}

pub fn sign_in(form: &SignInForm) -> Result<SignInRequest> {
    let email = email(&form.email)?;
    if form.password.is_empty() {
        return invalid("password", "Password is required");
    }
    Ok(SignInRequest { email, password: form.password.clone() })
}

pub fn sign_up(form: &SignUpForm, role: Role) -> Result<SignUpRequest> {
    let name = required("name", &form.name, "Full Name is required")?;
    let email = email(&form.email)?;
    let password = new_password(&form.password)?;
    if form.confirm_password.is_empty() {
        return invalid("confirm_password", "Confirm Password is required");
    }
    if form.confirm_password != form.password {
        return invalid("confirm_password", "Passwords must match");
    }
    Ok(SignUpRequest { name, email, password, role })
}

pub fn errand(form: &ErrandForm) -> Result<NewErrand> {
    let title = required("title", &form.title, "Title is required")?;
    let description = required("description", &form.description, "Description is required")?;
    let pickup = required("pickup", &form.pickup, "Pickup location is required")?;
    let dropoff = required("dropoff", &form.dropoff, "Dropoff location is required")?;
    let raw_price = required("price", &form.price, "Price is required")?;
    let Ok(price) = raw_price.parse::<f64>() else {
        return invalid("price", "Price must be a number");
    };
    if !price.is_finite() || price <= 0.0 {
        return invalid("price", "Price must be positive");
    }
    if price < MIN_ERRAND_PRICE {
        return invalid("price", "Minimum price is ₦100");
    }
    Ok(NewErrand { title, description, pickup, dropoff, price })
}

/// Checks the whole runner form and returns the sign-up half; the
/// application half needs the new account's id, see
/// [`crate::app::App::become_runner`].
pub fn runner(form: &RunnerForm) -> Result<SignUpRequest> {
    let name = required("full_name", &form.full_name, "Full Name is required")?;
    let email = email(&form.email)?;
    let password = new_password(&form.password)?;
    required("phone", &form.phone, "Phone number is required")?;
    required("relative_phone", &form.relative_phone, "Next of Kin Phone is required")?;
    required("location", &form.location, "Location is required")?;
    required("vehicle", &form.vehicle, "Vehicle type is required")?;
    required("national_id", &form.national_id, "National ID Number is required")?;
    if form.national_slip_image.is_none() {
        return invalid("national_slip_image", "National Slip Image is required");
    }
    if form.photo.is_none() {
        return invalid("photo", "Selfie Photo is required");
    }
    Ok(SignUpRequest { name, email, password, role: Role::Runner })
}
