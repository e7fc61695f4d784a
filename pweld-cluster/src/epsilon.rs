//! Epsilon search for a target reduction rate.
//!
//! Inverts the clustering: given a target fraction of vertices to remove,
//! finds the epsilon that achieves it. A linear scan over a fixed grid first
//! brackets the target, then a binary search narrows the bracket. Every probe
//! runs the forward clustering on the same prebuilt spatial index; the mesh
//! itself is never mutated.

use crate::forward::forward_weld;
use crate::{validate_weld_input, ThreadPoolConfig};
use log::info;
use pweld_core::{Error, Result, TriangleMesh};
use pweld_spatial::KdTree;
use rayon::ThreadPool;

/// How fast epsilon grows during the linear search phase.
const EPSILON_STEP_SIZE: f64 = 0.01;

/// The linear phase never searches past this epsilon.
const MAX_EPSILON_SEARCHED: f64 = 10.0;

/// Absolute tolerance for floating point comparisons on reduction rates.
const REDUCTION_RATE_MIN_ERROR: f64 = 1e-5;

/// Smallest bracket width before the binary search reports its midpoint.
const EPSILON_MIN_RANGE: f64 = 1e-7;

/// A binary search bracket: epsilon bounds and the reduction rates they
/// produce.
#[derive(Debug, Clone, Copy)]
struct SearchBracket {
    epsilon_min: f64,
    epsilon_max: f64,
    rate_on_min: f64,
    rate_on_max: f64,
}

/// Find an epsilon whose forward clustering reduces the vertex count by
/// approximately `target_rate` (a fraction in `(0, 1)`).
pub fn find_epsilon(
    mesh: &TriangleMesh,
    index: &KdTree,
    target_rate: f64,
    config: &ThreadPoolConfig,
) -> Result<f64> {
    if !(0.0..1.0).contains(&target_rate) || target_rate == 0.0 {
        return Err(Error::OutOfRange(format!(
            "target reduction rate {} is not in (0, 1)",
            target_rate
        )));
    }
    validate_weld_input(mesh, 0.0)?;
    if mesh.is_empty() {
        return Err(Error::OutOfRange(
            "cannot search for epsilon on an empty mesh".to_string(),
        ));
    }

    let pool = crate::parallel::build_pool(config)?;
    let bracket = linear_search(mesh, index, target_rate, &pool)?;
    Ok(binary_search(mesh, index, target_rate, bracket, &pool))
}

/// Reduction rate of the forward clustering at one epsilon.
fn reduction_rate(mesh: &TriangleMesh, index: &KdTree, epsilon: f64, pool: &ThreadPool) -> f64 {
    info!("testing epsilon = {}", epsilon);
    let initial_count = mesh.vertex_count();
    let reduced = forward_weld(mesh, index, epsilon, pool);
    (initial_count - reduced.vertex_count()) as f64 / initial_count as f64
}

/// Walk epsilon up a fixed grid until the target rate is first met; the
/// previous grid point and the current one bracket the answer.
fn linear_search(
    mesh: &TriangleMesh,
    index: &KdTree,
    target_rate: f64,
    pool: &ThreadPool,
) -> Result<SearchBracket> {
    let mut prev_rate = 0.0;
    let mut step = 1u32;
    loop {
        let epsilon = f64::from(step) * EPSILON_STEP_SIZE;
        if epsilon >= MAX_EPSILON_SEARCHED {
            return Err(Error::OutOfRange(format!(
                "no epsilon below {} reaches reduction rate {}",
                MAX_EPSILON_SEARCHED, target_rate
            )));
        }

        let rate = reduction_rate(mesh, index, epsilon, pool);
        if rate >= target_rate {
            return Ok(SearchBracket {
                epsilon_min: epsilon - EPSILON_STEP_SIZE,
                epsilon_max: epsilon,
                rate_on_min: prev_rate,
                rate_on_max: rate,
            });
        }
        prev_rate = rate;
        step += 1;
    }
}

/// Narrow the bracket by bisection until either the epsilon range or the
/// reduction rate difference falls under its tolerance.
fn binary_search(
    mesh: &TriangleMesh,
    index: &KdTree,
    target_rate: f64,
    bracket: SearchBracket,
    pool: &ThreadPool,
) -> f64 {
    let range = bracket.epsilon_max - bracket.epsilon_min;
    let midpoint = bracket.epsilon_min + range / 2.0;

    if range <= EPSILON_MIN_RANGE {
        return midpoint;
    }
    if bracket.rate_on_max - bracket.rate_on_min < REDUCTION_RATE_MIN_ERROR {
        return midpoint;
    }

    let rate_on_midpoint = reduction_rate(mesh, index, midpoint, pool);
    if rate_on_midpoint <= target_rate {
        if target_rate - rate_on_midpoint < REDUCTION_RATE_MIN_ERROR {
            return midpoint;
        }
        binary_search(
            mesh,
            index,
            target_rate,
            SearchBracket {
                epsilon_min: midpoint,
                epsilon_max: bracket.epsilon_max,
                rate_on_min: rate_on_midpoint,
                rate_on_max: bracket.rate_on_max,
            },
            pool,
        )
    } else {
        if rate_on_midpoint - target_rate < REDUCTION_RATE_MIN_ERROR {
            return midpoint;
        }
        binary_search(
            mesh,
            index,
            target_rate,
            SearchBracket {
                epsilon_min: bracket.epsilon_min,
                epsilon_max: midpoint,
                rate_on_min: bracket.rate_on_min,
                rate_on_max: rate_on_midpoint,
            },
            pool,
        )
    }
}
