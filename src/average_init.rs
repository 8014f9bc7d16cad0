// src/average_init.rs

use crate::error::{InitError, NumericDomainWarning};
use crate::matrix_access::{scaled_mean, summarize, StoredElements, ValueSummary};
use log::{debug, trace, warn};
use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

// --- Factor Selection ---

/// Identifies one of the two factors of `V ≈ W · H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorMatrix {
    /// The left factor, shape `(n, rank)`.
    W,
    /// The right factor, shape `(rank, m)`.
    H,
}

impl FactorMatrix {
    /// Shape of this factor for an `nrows × ncols` input and the given rank.
    pub fn shape(self, nrows: usize, ncols: usize, rank: usize) -> (usize, usize) {
        match self {
            FactorMatrix::W => (nrows, rank),
            FactorMatrix::H => (rank, ncols),
        }
    }
}

impl fmt::Display for FactorMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorMatrix::W => write!(f, "W"),
            FactorMatrix::H => write!(f, "H"),
        }
    }
}

impl TryFrom<char> for FactorMatrix {
    type Error = InitError;

    fn try_from(which: char) -> Result<Self, Self::Error> {
        match which {
            'W' | 'w' => Ok(FactorMatrix::W),
            'H' | 'h' => Ok(FactorMatrix::H),
            other => Err(InitError::InvalidArgument { got: other.to_string() }),
        }
    }
}

impl FromStr for FactorMatrix {
    type Err = InitError;

    /// Accepts exactly one character, `W` or `H`, in either case.
    fn from_str(which: &str) -> Result<Self, Self::Err> {
        let mut chars = which.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => FactorMatrix::try_from(c),
            _ => Err(InitError::InvalidArgument { got: which.to_string() }),
        }
    }
}

/// Anything that can name a factor: a `FactorMatrix`, a `char`, or a string.
pub trait FactorSelector {
    fn to_factor(&self) -> Result<FactorMatrix, InitError>;
}

impl FactorSelector for FactorMatrix {
    fn to_factor(&self) -> Result<FactorMatrix, InitError> {
        Ok(*self)
    }
}

impl FactorSelector for char {
    fn to_factor(&self) -> Result<FactorMatrix, InitError> {
        FactorMatrix::try_from(*self)
    }
}

impl FactorSelector for str {
    fn to_factor(&self) -> Result<FactorMatrix, InitError> {
        self.parse()
    }
}

impl FactorSelector for String {
    fn to_factor(&self) -> Result<FactorMatrix, InitError> {
        self.parse()
    }
}

impl<T: FactorSelector + ?Sized> FactorSelector for &T {
    fn to_factor(&self) -> Result<FactorMatrix, InitError> {
        (**self).to_factor()
    }
}

// --- Output Structures ---

/// How the seed value was obtained from the input statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedDerivation {
    /// Sum of stored values divided by the full `n * m` shape.
    pub mean: f64,
    /// Minimum over the stored values.
    pub min: f64,
    /// Number of stored values visited.
    pub stored_count: usize,
    /// Factorization rank.
    pub rank: usize,
    /// `sqrt(max(0, (mean - min) / rank))`.
    pub seed: f64,
    /// Set when `(mean - min) / rank` was negative and the seed was clamped to zero.
    pub domain_warning: Option<NumericDomainWarning>,
}

impl SeedDerivation {
    fn from_summary(summary: &ValueSummary, mean: f64, rank: usize) -> Self {
        // Halve both terms when their difference overflows; the sqrt(2) factor restores the scale.
        let difference = mean - summary.min;
        let (argument, scale) = if difference.is_finite() {
            (difference / rank as f64, 1.0)
        } else {
            ((mean / 2.0 - summary.min / 2.0) / rank as f64, SQRT_2)
        };

        let (seed, domain_warning) = if argument >= 0.0 {
            (argument.sqrt() * scale, None)
        } else {
            let warning = NumericDomainWarning {
                mean,
                min: summary.min,
                rank,
            };
            // Reported both through the log and in the returned derivation.
            warn!("Average initialization: {}", warning);
            (0.0, Some(warning))
        };

        Self {
            mean,
            min: summary.min,
            stored_count: summary.count,
            rank,
            seed,
            domain_warning,
        }
    }
}

/// Freshly allocated starting factors for an alternating factorization.
#[derive(Debug, Clone)]
pub struct InitializedFactors {
    /// Shape: `(n, rank)`
    pub w: Array2<f64>,
    /// Shape: `(rank, m)`
    pub h: Array2<f64>,
    /// Statistics and seed shared by both factors.
    pub derivation: SeedDerivation,
}

impl InitializedFactors {
    /// Drops the derivation and returns `(W, H)`.
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>) {
        (self.w, self.h)
    }
}

/// A single freshly allocated starting factor.
#[derive(Debug, Clone)]
pub struct InitializedFactor {
    /// Which factor `matrix` is.
    pub which: FactorMatrix,
    /// Shape: `(n, rank)` for `W`, `(rank, m)` for `H`
    pub matrix: Array2<f64>,
    /// Statistics and seed used for the fill.
    pub derivation: SeedDerivation,
}

// --- Solver-facing Seam ---

/// Strategy for producing the starting point of an alternating factorization.
///
/// A factorization driver is generic over this trait and calls it once, before
/// its first update step. Implementors hold no state between calls.
pub trait InitializationRule {
    /// Produces both `W` (`n × rank`) and `H` (`rank × m`) for the input `v`.
    fn initialize<M, R>(&self, v: &M, rank: usize, rng: &mut R) -> Result<InitializedFactors, InitError>
    where
        M: StoredElements + ?Sized,
        R: Rng + ?Sized;

    /// Produces only the factor named by `which`.
    fn initialize_one<M, S, R>(
        &self,
        v: &M,
        rank: usize,
        which: S,
        rng: &mut R,
    ) -> Result<InitializedFactor, InitError>
    where
        M: StoredElements + ?Sized,
        S: FactorSelector,
        R: Rng + ?Sized;
}

// --- Average Initialization ---

/// Initializes `W` and `H` to the root of the (min-shifted) average of `V`,
/// perturbed with uniform noise.
///
/// The seed is
///
/// ```text
/// seed = sqrt(max(0, (sum(V) / (n * m) - min(V)) / rank))
/// ```
///
/// where `sum` and `min` range over the stored elements only. Every entry of
/// the produced factors is `seed + u` with `u` drawn uniformly from `[0, 1)`.
///
/// # Examples
///
/// ```
/// use amf_init::{AverageInitialization, InitializationRule};
/// use ndarray::array;
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let v = array![[0.0, 2.0], [4.0, 6.0]];
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
/// let factors = AverageInitialization::new().initialize(&v, 2, &mut rng)?;
/// assert!((factors.derivation.seed - 1.5f64.sqrt()).abs() < 1e-12);
/// assert_eq!(factors.w.dim(), (2, 2));
/// # Ok::<(), amf_init::InitError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AverageInitialization;

impl AverageInitialization {
    /// Creates the (stateless) strategy.
    pub fn new() -> Self {
        Self
    }

    /// Computes the seed value for `v` and `rank` without allocating any factor.
    ///
    /// # Errors
    /// `InvalidInput` if `v` has zero rows or columns, if `rank` is zero, or if
    /// the stored values are not all finite.
    pub fn derive_seed<M>(&self, v: &M, rank: usize) -> Result<SeedDerivation, InitError>
    where
        M: StoredElements + ?Sized,
    {
        let (nrows, ncols) = v.shape();
        if nrows == 0 || ncols == 0 {
            return Err(InitError::invalid_input(format!(
                "input matrix has zero rows or zero columns ({} x {})",
                nrows, ncols
            )));
        }
        if rank == 0 {
            return Err(InitError::invalid_input("factorization rank must be greater than 0"));
        }

        let summary = summarize(v);
        if !summary.all_finite() {
            return Err(InitError::invalid_input(format!(
                "input matrix contains {} non-finite (NaN or infinity) values",
                summary.non_finite
            )));
        }

        let mean = if summary.sum.is_finite() {
            summary.mean_over_shape(nrows, ncols)
        } else {
            debug!("Sum of stored values overflowed; recomputing the mean with per-element scaling.");
            scaled_mean(v, nrows, ncols)
        };

        let derivation = SeedDerivation::from_summary(&summary, mean, rank);
        debug!(
            "Average initialization of {} x {} input (rank {}): {} stored values, mean {}, min {}, seed {}",
            nrows, ncols, rank, summary.count, derivation.mean, derivation.min, derivation.seed
        );
        Ok(derivation)
    }

    /// Like [`InitializationRule::initialize`], drawing noise from a `ChaCha8Rng`.
    ///
    /// * `seed` - `Some(s)` makes the output reproducible; `None` seeds from OS entropy.
    pub fn initialize_seeded<M>(
        &self,
        v: &M,
        rank: usize,
        seed: Option<u64>,
    ) -> Result<InitializedFactors, InitError>
    where
        M: StoredElements + ?Sized,
    {
        let mut rng = rng_from_seed(seed);
        self.initialize(v, rank, &mut rng)
    }

    /// Like [`InitializationRule::initialize_one`], drawing noise from a `ChaCha8Rng`.
    pub fn initialize_one_seeded<M, S>(
        &self,
        v: &M,
        rank: usize,
        which: S,
        seed: Option<u64>,
    ) -> Result<InitializedFactor, InitError>
    where
        M: StoredElements + ?Sized,
        S: FactorSelector,
    {
        let mut rng = rng_from_seed(seed);
        self.initialize_one(v, rank, which, &mut rng)
    }
}

impl InitializationRule for AverageInitialization {
    fn initialize<M, R>(&self, v: &M, rank: usize, rng: &mut R) -> Result<InitializedFactors, InitError>
    where
        M: StoredElements + ?Sized,
        R: Rng + ?Sized,
    {
        let derivation = self.derive_seed(v, rank)?;
        let (nrows, ncols) = v.shape();

        let w = offset_uniform(FactorMatrix::W.shape(nrows, ncols, rank), derivation.seed, rng);
        let h = offset_uniform(FactorMatrix::H.shape(nrows, ncols, rank), derivation.seed, rng);

        Ok(InitializedFactors { w, h, derivation })
    }

    fn initialize_one<M, S, R>(
        &self,
        v: &M,
        rank: usize,
        which: S,
        rng: &mut R,
    ) -> Result<InitializedFactor, InitError>
    where
        M: StoredElements + ?Sized,
        S: FactorSelector,
        R: Rng + ?Sized,
    {
        let which = which.to_factor()?;
        let derivation = self.derive_seed(v, rank)?;
        let (nrows, ncols) = v.shape();

        let matrix = offset_uniform(which.shape(nrows, ncols, rank), derivation.seed, rng);

        Ok(InitializedFactor {
            which,
            matrix,
            derivation,
        })
    }
}

// --- Utility Functions ---

/// Uniform `[0, 1)` noise of the given shape, shifted by `offset`.
fn offset_uniform<R: Rng + ?Sized>(shape: (usize, usize), offset: f64, rng: &mut R) -> Array2<f64> {
    trace!("Filling {:?} factor with uniform noise offset by {}", shape, offset);
    let noise: Array2<f64> = Array2::random_using(shape, Uniform::new(0.0, 1.0), rng);
    noise + offset
}

fn rng_from_seed(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}
