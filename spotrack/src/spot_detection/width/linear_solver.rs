//! Dense solver for the small normal-equation systems of the LM fit.

/// Pivots smaller than this make the system singular.
const SINGULAR_PIVOT: f64 = 1e-10;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// `None` if the matrix is singular.
#[allow(clippy::needless_range_loop)]
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut matrix = *a;
    let mut rhs = *b;

    for col in 0..N {
        let mut pivot_row = col;
        let mut pivot = matrix[col][col].abs();
        for row in (col + 1)..N {
            if matrix[row][col].abs() > pivot {
                pivot = matrix[row][col].abs();
                pivot_row = row;
            }
        }
        if !(pivot >= SINGULAR_PIVOT) {
            return None;
        }
        if pivot_row != col {
            matrix.swap(col, pivot_row);
            rhs.swap(col, pivot_row);
        }

        for row in (col + 1)..N {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_values = matrix[col];
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_values[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= matrix[i][j] * xj;
        }
        x[i] = sum / matrix[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let a = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(solve(&a, &[3.0, -2.0, 5.0]), Some([3.0, -2.0, 5.0]));
    }

    #[test]
    fn needs_pivoting() {
        // zero on the first diagonal entry
        let a = [[0.0, 2.0], [3.0, 1.0]];
        let x = solve(&a, &[4.0, 5.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn symmetric_five_by_five() {
        let a = [
            [4.0, 1.0, 0.0, 0.0, 0.0],
            [1.0, 4.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 4.0, 1.0, 0.0],
            [0.0, 0.0, 1.0, 4.0, 1.0],
            [0.0, 0.0, 0.0, 1.0, 4.0],
        ];
        let expected = [1.0, -1.0, 2.0, 0.5, 3.0];
        let mut b = [0.0; 5];
        for i in 0..5 {
            b[i] = (0..5).map(|j| a[i][j] * expected[j]).sum();
        }
        let x = solve(&a, &b).unwrap();
        for (xi, ei) in x.iter().zip(expected) {
            assert!((xi - ei).abs() < 1e-12);
        }
    }

    #[test]
    fn singular_is_none() {
        let a = [[1.0, 2.0], [2.0, 4.0]];
        assert!(solve(&a, &[1.0, 2.0]).is_none());
        let nan = [[f64::NAN, 0.0], [0.0, 1.0]];
        assert!(solve(&nan, &[1.0, 1.0]).is_none());
    }
}
