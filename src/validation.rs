//! Payload schemas.
//!
//! A `Schema` checks a raw form body and either produces the validated input or
//! a `ValidationError` listing every problem found. Messages name the offending
//! field by its path, e.g. `"listing.price" must be a number`.

use crate::error::AppError;
use crate::models::{ListingForm, ListingInput, ReviewForm, ReviewInput};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDetail {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationError {
    pub details: Vec<ValidationDetail>,
}

impl ValidationError {
    fn push(&mut self, message: String) {
        self.details.push(ValidationDetail { message });
    }

    /// All messages joined by a comma.
    pub fn message(&self) -> String {
        self.details
            .iter()
            .map(|detail| detail.message.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.message())
    }
}

pub trait Schema {
    /// Name of the schema, used as the prefix of every message path.
    const NAME: &'static str;
    type Valid;

    fn validate(&self) -> Result<Self::Valid, ValidationError>;
}

fn required_text(
    errors: &mut ValidationError,
    schema: &str,
    field: &str,
    value: &Option<String>,
) -> String {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        Some(_) => {
            errors.push(format!("\"{}.{}\" is not allowed to be empty", schema, field));
            String::new()
        }
        None => {
            errors.push(format!("\"{}.{}\" is required", schema, field));
            String::new()
        }
    }
}

fn required_number<T: std::str::FromStr>(
    errors: &mut ValidationError,
    schema: &str,
    field: &str,
    value: &Option<String>,
) -> Option<T> {
    match value.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push(format!("\"{}.{}\" is required", schema, field));
            None
        }
        Some(text) => match text.parse::<T>() {
            Ok(number) => Some(number),
            Err(_) => {
                errors.push(format!("\"{}.{}\" must be a number", schema, field));
                None
            }
        },
    }
}

impl Schema for ListingForm {
    const NAME: &'static str = "listing";
    type Valid = ListingInput;

    fn validate(&self) -> Result<ListingInput, ValidationError> {
        let mut errors = ValidationError::default();

        let title = required_text(&mut errors, Self::NAME, "title", &self.title);
        let description = required_text(&mut errors, Self::NAME, "description", &self.description);
        // Whole numbers only, matching the BIGINT column.
        let price = required_number::<i64>(&mut errors, Self::NAME, "price", &self.price);
        let location = required_text(&mut errors, Self::NAME, "location", &self.location);
        let country = required_text(&mut errors, Self::NAME, "country", &self.country);

        if let Some(price) = price {
            if price < 0 {
                errors.push(format!(
                    "\"{}.price\" must be greater than or equal to 0",
                    Self::NAME
                ));
            }
        }

        // Image is optional and may be submitted empty.
        let image_url = self
            .image
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        match price {
            Some(price) if errors.details.is_empty() => Ok(ListingInput {
                title,
                description,
                image_url,
                price,
                location,
                country,
            }),
            _ => Err(errors),
        }
    }
}

impl Schema for ReviewForm {
    const NAME: &'static str = "review";
    type Valid = ReviewInput;

    fn validate(&self) -> Result<ReviewInput, ValidationError> {
        let mut errors = ValidationError::default();

        let rating = required_number::<i32>(&mut errors, Self::NAME, "rating", &self.rating);
        if let Some(rating) = rating {
            if rating < 1 {
                errors.push(format!(
                    "\"{}.rating\" must be greater than or equal to 1",
                    Self::NAME
                ));
            } else if rating > 5 {
                errors.push(format!(
                    "\"{}.rating\" must be less than or equal to 5",
                    Self::NAME
                ));
            }
        }
        let comment = required_text(&mut errors, Self::NAME, "comment", &self.comment);

        match rating {
            Some(rating) if errors.details.is_empty() => Ok(ReviewInput { rating, comment }),
            _ => Err(errors),
        }
    }
}
