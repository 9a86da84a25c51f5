//! The scoring engine: turns a category's products, grades, and pairwise
//! comparisons into an ordered, scored list.
//!
//! Scores are computed from scratch on every call and never persisted, so
//! there is no cached state to invalidate when a grade or comparison is
//! recorded.

use crate::{
    product::Product,
    ranking::{ComparativeRank, GradedRank},
};

/// The top of the semantic grading scale.
///
/// Grades are always stored on a 1 to [REFERENCE_SCALE_MAX] scale, no matter
/// how many buttons the grading UI happens to show, and the score formula
/// normalises against this constant rather than any UI setting.
pub const REFERENCE_SCALE_MAX: i64 = 7;

/// How many score points a single comparison win is worth (and a loss costs).
pub const COMPARISON_WEIGHT: i64 = 5;

/// A product together with the scores derived from its grade and comparison
/// records.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProduct {
    /// The product being ranked.
    pub product: Product,

    /// The combined score, rounded to the nearest whole number.
    pub score: i64,

    /// The mean of the product's grades, or `None` if it has never been graded.
    pub average_grade: Option<f64>,

    /// How many comparisons this product has won.
    pub wins: usize,

    /// How many comparisons this product has lost.
    pub losses: usize,
}

impl RankedProduct {
    /// The average grade formatted for display, to one decimal place, or
    /// "N/A" for a product that has never been graded.
    pub fn average_grade_display(&self) -> String {
        match self.average_grade {
            Some(average) => format!("{average:.1}"),
            None => "N/A".to_string(),
        }
    }
}

/// Score `products` against their grade and comparison records and return
/// them ordered from highest score to lowest.
///
/// Each product's score depends only on its own records: the average grade is
/// normalised to a 0-100 range against [REFERENCE_SCALE_MAX] (an ungraded
/// product contributes zero), and each net comparison win adds
/// [COMPARISON_WEIGHT] points, unbounded in either direction.
///
/// Rank records that refer to a product outside `products` are ignored, so a
/// list can be scored even when old rank rows outlive their product. The sort
/// is stable, so products with equal scores keep their input order.
pub fn compute_ranked_list(
    products: Vec<Product>,
    graded_ranks: &[GradedRank],
    comparative_ranks: &[ComparativeRank],
) -> Vec<RankedProduct> {
    let comparisons: Vec<&ComparativeRank> = comparative_ranks
        .iter()
        .filter(|comparison| {
            let winner_present = products
                .iter()
                .any(|product| product.id == comparison.winner_product_id);
            let loser_present = products
                .iter()
                .any(|product| product.id == comparison.loser_product_id);

            winner_present && loser_present
        })
        .collect();

    let mut ranked: Vec<RankedProduct> = products
        .into_iter()
        .map(|product| {
            let grades: Vec<i64> = graded_ranks
                .iter()
                .filter(|rank| rank.product_id == product.id)
                .map(|rank| rank.rank.as_i64())
                .collect();

            let average_grade = if grades.is_empty() {
                None
            } else {
                Some(grades.iter().sum::<i64>() as f64 / grades.len() as f64)
            };

            let graded_score = match average_grade {
                Some(average) => {
                    (average - 1.0) / (REFERENCE_SCALE_MAX - 1) as f64 * 100.0
                }
                None => 0.0,
            };

            let wins = comparisons
                .iter()
                .filter(|comparison| comparison.winner_product_id == product.id)
                .count();
            let losses = comparisons
                .iter()
                .filter(|comparison| comparison.loser_product_id == product.id)
                .count();
            let comparative_score = (wins as i64 - losses as i64) * COMPARISON_WEIGHT;

            let score = (graded_score + comparative_score as f64).round() as i64;

            RankedProduct {
                product,
                score,
                average_grade,
                wins,
                losses,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    ranked
}

#[cfg(test)]
mod compute_ranked_list_tests {
    use crate::{
        product::{Product, ProductId, ProductName},
        ranking::{ComparativeRank, Grade, GradedRank},
        score::{COMPARISON_WEIGHT, compute_ranked_list},
        user::UserID,
    };

    fn test_product(id: ProductId) -> Product {
        Product {
            id,
            category_id: 1,
            name: ProductName::new_unchecked(&format!("Product {id}")),
            description: None,
            image_url: None,
            image_hint: None,
            user_id: UserID::new(1),
        }
    }

    fn test_grade(product_id: ProductId, rank: i64) -> GradedRank {
        GradedRank {
            id: 0,
            product_id,
            category_id: 1,
            rank: Grade::new(rank).expect("invalid grade in test fixture"),
            user_id: UserID::new(1),
        }
    }

    fn test_comparison(winner: ProductId, loser: ProductId) -> ComparativeRank {
        ComparativeRank {
            id: 0,
            category_id: 1,
            winner_product_id: winner,
            loser_product_id: loser,
            user_id: UserID::new(1),
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let ranked = compute_ranked_list(vec![], &[], &[]);

        assert!(ranked.is_empty());
    }

    #[test]
    fn unranked_product_scores_zero_with_no_average() {
        let ranked = compute_ranked_list(vec![test_product(1)], &[], &[]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0);
        assert_eq!(ranked[0].average_grade, None);
        assert_eq!(ranked[0].average_grade_display(), "N/A");
    }

    #[test]
    fn grades_five_and_seven_average_to_six_and_score_eighty_three() {
        let grades = [test_grade(1, 5), test_grade(1, 7)];

        let ranked = compute_ranked_list(vec![test_product(1)], &grades, &[]);

        assert_eq!(ranked[0].average_grade, Some(6.0));
        assert_eq!(ranked[0].average_grade_display(), "6.0");
        // ((6 - 1) / 6) * 100 = 83.33, rounded.
        assert_eq!(ranked[0].score, 83);
    }

    #[test]
    fn three_wins_one_loss_scores_ten_with_no_average() {
        let products = vec![test_product(1), test_product(2), test_product(3)];
        let comparisons = [
            test_comparison(1, 2),
            test_comparison(1, 2),
            test_comparison(1, 3),
            test_comparison(2, 1),
        ];

        let ranked = compute_ranked_list(products, &[], &comparisons);

        let product_one = ranked
            .iter()
            .find(|ranked_product| ranked_product.product.id == 1)
            .unwrap();
        assert_eq!(product_one.wins, 3);
        assert_eq!(product_one.losses, 1);
        assert_eq!(product_one.score, (3 - 1) * COMPARISON_WEIGHT);
        assert_eq!(product_one.average_grade_display(), "N/A");
    }

    #[test]
    fn average_grade_stays_within_grading_scale() {
        let grades = [
            test_grade(1, 1),
            test_grade(1, 7),
            test_grade(1, 4),
            test_grade(1, 2),
        ];

        let ranked = compute_ranked_list(vec![test_product(1)], &grades, &[]);

        let average = ranked[0].average_grade.unwrap();
        assert!((1.0..=7.0).contains(&average), "average was {average}");
    }

    #[test]
    fn score_is_monotonic_in_net_wins() {
        let products = vec![test_product(1), test_product(2)];
        let grades = [test_grade(1, 4), test_grade(2, 4)];
        let mut comparisons = vec![];

        let mut previous_score = i64::MIN;
        for _ in 0..5 {
            comparisons.push(test_comparison(1, 2));

            let ranked = compute_ranked_list(products.clone(), &grades, &comparisons);
            let product_one = ranked
                .iter()
                .find(|ranked_product| ranked_product.product.id == 1)
                .unwrap();

            assert!(product_one.score > previous_score);
            previous_score = product_one.score;
        }
    }

    #[test]
    fn score_does_not_depend_on_input_order() {
        let products = vec![test_product(1), test_product(2), test_product(3)];
        let grades = [test_grade(1, 7), test_grade(2, 3), test_grade(3, 5)];
        let comparisons = [test_comparison(2, 3), test_comparison(3, 1)];

        let forwards = compute_ranked_list(products.clone(), &grades, &comparisons);
        let mut reversed_products = products;
        reversed_products.reverse();
        let backwards = compute_ranked_list(reversed_products, &grades, &comparisons);

        for ranked_product in &forwards {
            let twin = backwards
                .iter()
                .find(|candidate| candidate.product.id == ranked_product.product.id)
                .unwrap();

            assert_eq!(ranked_product.score, twin.score);
            assert_eq!(ranked_product.average_grade, twin.average_grade);
        }
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let products = vec![test_product(1), test_product(2)];
        let grades = [test_grade(1, 6), test_grade(2, 2)];
        let comparisons = [test_comparison(2, 1)];

        let first = compute_ranked_list(products.clone(), &grades, &comparisons);
        let second = compute_ranked_list(products, &grades, &comparisons);

        assert_eq!(first, second);
    }

    #[test]
    fn products_are_ordered_by_descending_score() {
        let products = vec![test_product(1), test_product(2), test_product(3)];
        let grades = [test_grade(1, 2), test_grade(2, 7), test_grade(3, 4)];

        let ranked = compute_ranked_list(products, &grades, &[]);

        let ids: Vec<_> = ranked
            .iter()
            .map(|ranked_product| ranked_product.product.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn tied_products_keep_their_input_order() {
        let products = vec![test_product(3), test_product(1), test_product(2)];

        let ranked = compute_ranked_list(products, &[], &[]);

        let ids: Vec<_> = ranked
            .iter()
            .map(|ranked_product| ranked_product.product.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn rank_records_for_absent_products_are_ignored() {
        let products = vec![test_product(1)];
        let grades = [test_grade(1, 4), test_grade(99, 7)];
        let comparisons = [test_comparison(1, 99), test_comparison(99, 1)];

        let ranked = compute_ranked_list(products, &grades, &comparisons);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].average_grade, Some(4.0));
        assert_eq!(ranked[0].wins, 0);
        assert_eq!(ranked[0].losses, 0);
        // ((4 - 1) / 6) * 100 = 50, with no comparison contribution.
        assert_eq!(ranked[0].score, 50);
    }

    #[test]
    fn a_product_can_both_win_and_lose() {
        let products = vec![test_product(1), test_product(2), test_product(3)];
        let comparisons = [test_comparison(1, 2), test_comparison(3, 1)];

        let ranked = compute_ranked_list(products, &[], &comparisons);

        let product_one = ranked
            .iter()
            .find(|ranked_product| ranked_product.product.id == 1)
            .unwrap();
        assert_eq!(product_one.wins, 1);
        assert_eq!(product_one.losses, 1);
        assert_eq!(product_one.score, 0);
    }
}
