//! md-potentials: two-body interaction library for mdflow.
//!
//! Provides:
//! - The pair-function contract (`PairFunction`): `(r, params) -> (u, s, u'')`
//!   with `s = -u'(r)/r`, so the force on i from j is `s * (r_i - r_j)`
//! - Built-in potentials (12-6 Lennard-Jones, Yukawa, harmonic repulsion)
//! - Cutoff wrapper policies (shifted potential, shifted force)
//! - Per-type-pair parameter matrices (`PairParams`)
//! - Finite-difference consistency checks
//!
//! # Architecture
//!
//! Pair functions are plain values dispatched statically: the force kernel is
//! generic over `F: PairFunction`, so wrappers such as
//! `ShiftedPotential<LennardJones>` are fully inlined into the hot loop.
//! A cutoff wrapper reads the cutoff from the LAST entry of the parameter
//! vector and forwards the preceding entries to the bare potential.
//!
//! # Example
//!
//! ```
//! use md_potentials::{LennardJones, PairFunction, ShiftedPotential};
//!
//! let lj = ShiftedPotential::new(LennardJones);
//! let params = [1.0, 1.0, 2.5]; // sigma, epsilon, cutoff
//! let terms = lj.eval(1.5, &params);
//! assert!(terms.u < 0.0);
//! assert_eq!(lj.eval(2.5, &params).u, 0.0);
//! ```

pub mod builtin;
pub mod check;
pub mod cutoff;
pub mod error;
pub mod pair;
pub mod params;

// Re-exports for ergonomics
pub use builtin::{HarmonicRepulsion, LennardJones, Yukawa};
pub use check::{DerivativeCheck, finite_difference_check};
pub use cutoff::{ShiftedForce, ShiftedPotential};
pub use error::{PotentialError, PotentialResult};
pub use pair::{PairFunction, PairTerms};
pub use params::PairParams;
