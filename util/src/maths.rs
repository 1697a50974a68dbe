//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Return the euclidian norm (distance between) of two points.
///
/// If the points do not have the same number of dimentions then `None` is
/// returned.
pub fn norm<T>(point_0: &[T], point_1: &[T]) -> Option<T>
where
    T: Float + std::ops::AddAssign
{
    // Check that the dimentions match
    if point_0.len() != point_1.len() {
        return None;
    }

    // Sum the squared differences of all elements
    let mut sum = T::zero();

    for (a, b) in point_0.iter().zip(point_1.iter()) {
        sum += (*a - *b).powi(2);
    }

    // Return the squareroot of the sum
    Some(sum.sqrt())
}

/// Returns true if `a` and `b` differ by no more than `tol`.
pub fn approx_eq<T>(a: T, b: T, tol: T) -> bool
where
    T: Float
{
    (a - b).abs() <= tol
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_norm() {
        assert_eq!(norm(&[0f64, 0.0, 0.0], &[3.0, 4.0, 0.0]), Some(5.0));
        assert_eq!(norm(&[3f64, 4.0], &[0.0, 0.0]), Some(5.0));
        assert_eq!(norm(&[1f64, 2.0, 3.0], &[1.0, 2.0, 3.0]), Some(0.0));
        assert_eq!(norm(&[1f64, 2.0], &[1.0]), None);
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0.1f64 + 0.2, 0.3, 1e-9));
        assert!(!approx_eq(1.0f64, 1.1, 1e-9));
    }
}
