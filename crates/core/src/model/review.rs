//! Product reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::RatingSummary;
use crate::error::StoreError;
use crate::types::{ProductId, ReviewId, UserId};

/// Longest comment accepted.
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// A star rating and comment left by a user on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    /// 1 to 5 stars.
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Build a validated review with a fresh ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the rating is outside 1..=5 or the
    /// comment is too long.
    pub fn new(
        product_id: ProductId,
        user_id: UserId,
        author_name: impl Into<String>,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let review = Self {
            id: ReviewId::generate(),
            product_id,
            user_id,
            author_name: author_name.into(),
            rating,
            comment: comment.into().trim().to_owned(),
            created_at: Utc::now(),
        };
        review.validate()?;
        Ok(review)
    }

    /// Check the rating range and comment length.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` describing the first problem.
    pub fn validate(&self) -> Result<(), StoreError> {
        if !(1..=5).contains(&self.rating) {
            return Err(StoreError::validation("Rating must be between 1 and 5"));
        }
        if self.comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(StoreError::validation(format!(
                "Comment must be at most {MAX_COMMENT_LENGTH} characters"
            )));
        }
        Ok(())
    }

    /// Aggregate rating of a product's reviews.
    #[must_use]
    pub fn summarize(reviews: &[Self]) -> RatingSummary {
        RatingSummary::from_ratings(reviews.iter().map(|r| r.rating))
    }

    /// Rating as filled/empty stars, e.g. "★★★☆☆".
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::from(self.rating.min(5));
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        for rating in [0, 6] {
            assert!(
                Review::new(ProductId::new("p"), UserId::new("u"), "Jo", rating, "").is_err()
            );
        }
        let review = Review::new(ProductId::new("p"), UserId::new("u"), "Jo", 4, " nice ").unwrap();
        assert_eq!(review.comment, "nice");
        assert_eq!(review.stars(), "★★★★☆");
    }

    #[test]
    fn test_validate_catches_edited_rating() {
        let mut review = Review::new(ProductId::new("p"), UserId::new("u"), "Jo", 4, "").unwrap();
        review.rating = 0;
        assert!(review.validate().is_err());
    }

    #[test]
    fn test_summarize() {
        let reviews: Vec<Review> = [5, 2]
            .into_iter()
            .map(|r| Review::new(ProductId::new("p"), UserId::new("u"), "Jo", r, "").unwrap())
            .collect();
        let summary = Review::summarize(&reviews);
        assert_eq!(summary.count, 2);
        assert!((summary.average - 3.5).abs() < f32::EPSILON);
        assert_eq!(Review::summarize(&[]), RatingSummary::default());
    }

    #[test]
    fn test_comment_length_limit() {
        let long = "x".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(Review::new(ProductId::new("p"), UserId::new("u"), "Jo", 3, long).is_err());
    }
}
