//! Client reviews left at confirmation time

use serde::{Deserialize, Serialize};

use crate::time::TimeStamp;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// One review per booking, keyed by the booking id in storage.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
pub struct Review {
    #[n(0)]
    pub booking_id: String,
    #[n(1)]
    pub cleaner_user_id: String,
    #[n(2)]
    pub client_user_id: String,
    #[n(3)]
    pub rating: u8,
    #[n(4)]
    pub comment: Option<String>,
    #[n(5)]
    pub created_at: TimeStamp,
}

pub fn rating_in_range(rating: u8) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// Mean over every review left for a cleaner; 0.0 when there are none.
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    sum as f64 / reviews.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: u8) -> Review {
        Review {
            booking_id: "booking_test".into(),
            cleaner_user_id: "cleaner_test".into(),
            client_user_id: "client_test".into(),
            rating,
            comment: None,
            created_at: TimeStamp::now(),
        }
    }

    #[test]
    fn average_is_mean_of_all_ratings() {
        let reviews = vec![review(5), review(4), review(3)];

        assert!((average_rating(&reviews) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn average_of_no_reviews_is_zero() {
        assert_eq!(average_rating(&[]), 0.0);
    }

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        assert!(!rating_in_range(0));
        assert!(rating_in_range(1));
        assert!(rating_in_range(5));
        assert!(!rating_in_range(6));
    }
}
