//! Length-based engagement scoring.
//!
//! A crude but stable proxy for user investment: longer messages and longer
//! agent replies both read as a livelier exchange. Used by the casual
//! conversation graph to gate the reveal moment.

/// Score one exchange into [0, 1].
///
/// Message length saturates at 100 chars, response length at 200; the score
/// is the mean of the two saturated ratios, so it is non-decreasing in both
/// lengths up to their caps.
pub fn score(message: &str, response: &str) -> f32 {
    let length_score = (message.len() as f32 / 100.0).min(1.0);
    let response_score = (response.len() as f32 / 200.0).min(1.0);
    (length_score + response_score) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_in_unit_interval() {
        let s = score("hi", "hello there");
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn test_empty_exchange_scores_zero() {
        assert_eq!(score("", ""), 0.0);
    }

    #[test]
    fn test_saturated_exchange_scores_one() {
        let msg = "x".repeat(150);
        let resp = "y".repeat(250);
        assert_eq!(score(&msg, &resp), 1.0);
    }

    #[test]
    fn test_monotone_in_message_length() {
        let resp = "a fixed response";
        let mut prev = score("", resp);
        for n in (10..=120).step_by(10) {
            let s = score(&"m".repeat(n), resp);
            assert!(s >= prev, "score decreased at message length {}", n);
            prev = s;
        }
    }

    #[test]
    fn test_monotone_in_response_length() {
        let msg = "a fixed message";
        let mut prev = score(msg, "");
        for n in (20..=240).step_by(20) {
            let s = score(msg, &"r".repeat(n));
            assert!(s >= prev, "score decreased at response length {}", n);
            prev = s;
        }
    }

    #[test]
    fn test_exact_midpoint() {
        // 50/100 and 100/200 both give 0.5, mean is 0.5
        let s = score(&"m".repeat(50), &"r".repeat(100));
        assert!((s - 0.5).abs() < f32::EPSILON);
    }
}
