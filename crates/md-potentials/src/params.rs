//! Per-type-pair parameter matrices.

use crate::error::{PotentialError, PotentialResult};
use crate::pair::PairFunction;

/// Symmetric `num_types x num_types` table of parameter vectors.
///
/// For the cutoff wrappers the last entry of every vector is the interaction
/// cutoff; the pair function decides how it is read (`cutoff_for`).
#[derive(Clone, Debug, PartialEq)]
pub struct PairParams {
    num_types: usize,
    num_params: usize,
    // row-major [ti][tj][p]
    values: Vec<f64>,
}

impl PairParams {
    /// Single particle type.
    pub fn uniform(params: Vec<f64>) -> PotentialResult<Self> {
        if params.is_empty() {
            return Err(PotentialError::InvalidArg {
                what: "parameter vector must not be empty",
            });
        }
        Ok(Self {
            num_types: 1,
            num_params: params.len(),
            values: params,
        })
    }

    /// One square matrix per parameter, e.g. `[sigma, epsilon, cutoff]`.
    pub fn from_matrices(matrices: &[Vec<Vec<f64>>]) -> PotentialResult<Self> {
        let num_params = matrices.len();
        if num_params == 0 {
            return Err(PotentialError::InvalidArg {
                what: "at least one parameter matrix is required",
            });
        }
        let num_types = matrices[0].len();
        if num_types == 0 {
            return Err(PotentialError::Shape {
                what: "parameter matrix has no rows".to_string(),
            });
        }

        for (p, matrix) in matrices.iter().enumerate() {
            if matrix.len() != num_types {
                return Err(PotentialError::Shape {
                    what: format!(
                        "parameter {p} has {} rows, expected {num_types}",
                        matrix.len()
                    ),
                });
            }
            for (i, row) in matrix.iter().enumerate() {
                if row.len() != num_types {
                    return Err(PotentialError::Shape {
                        what: format!(
                            "parameter {p} row {i} has {} columns, expected {num_types}",
                            row.len()
                        ),
                    });
                }
            }
            for i in 0..num_types {
                for j in (i + 1)..num_types {
                    if matrix[i][j] != matrix[j][i] {
                        return Err(PotentialError::NotSymmetric {
                            param: p,
                            ti: i,
                            tj: j,
                        });
                    }
                }
            }
        }

        let mut values = Vec::with_capacity(num_types * num_types * num_params);
        for i in 0..num_types {
            for j in 0..num_types {
                for matrix in matrices {
                    values.push(matrix[i][j]);
                }
            }
        }

        Ok(Self {
            num_types,
            num_params,
            values,
        })
    }

    /// Check that every vector has the length `func` consumes.
    pub fn validate_for<F: PairFunction>(&self, func: &F) -> PotentialResult<()> {
        if func.num_params() != self.num_params {
            return Err(PotentialError::ParamCount {
                name: func.name(),
                expected: func.num_params(),
                got: self.num_params,
            });
        }
        Ok(())
    }

    pub fn num_types(&self) -> usize {
        self.num_types
    }

    pub fn num_params(&self) -> usize {
        self.num_params
    }

    #[inline]
    pub fn get(&self, ti: usize, tj: usize) -> &[f64] {
        let start = (ti * self.num_types + tj) * self.num_params;
        &self.values[start..start + self.num_params]
    }

    /// Interaction range of type pair (ti, tj) as read by `func`.
    ///
    /// Errors when `func` has no cutoff or the value is not positive and finite.
    pub fn cutoff_for<F: PairFunction>(&self, func: &F, ti: usize, tj: usize) -> PotentialResult<f64> {
        let Some(rc) = func.cutoff(self.get(ti, tj)) else {
            return Err(PotentialError::MissingCutoff { name: func.name() });
        };
        if !rc.is_finite() || rc <= 0.0 {
            return Err(PotentialError::Cutoff { value: rc, ti, tj });
        }
        Ok(rc)
    }

    /// Largest cutoff over all type pairs.
    pub fn max_cutoff_for<F: PairFunction>(&self, func: &F) -> PotentialResult<f64> {
        let mut max = 0.0_f64;
        for ti in 0..self.num_types {
            for tj in ti..self.num_types {
                max = max.max(self.cutoff_for(func, ti, tj)?);
            }
        }
        Ok(max)
    }
}
