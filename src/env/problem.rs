//! Problem batches and the sources that produce them.
//!
//! A [`ProblemBatch`] holds the static geometry and demands of B instances.
//! Batches come from a [`ProblemSource`]: the seeded [`RandomProblems`]
//! generator or a fixed [`SavedProblems`] pool read through a cursor.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::error::EnvError;
use super::types::Position;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Static data for a batch of problem instances.
///
/// Node arrays are flat, instance-major: node `j` (0-based, excluding the
/// depot) of instance `b` lives at `b * problem_size + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemBatch {
    problem_size: usize,
    depot_xy: Vec<Position>,
    node_xy: Vec<Position>,
    node_demand: Vec<f64>,
}

impl ProblemBatch {
    /// Builds a batch from flat arrays, checking their lengths.
    ///
    /// Demands are fractions of the unit vehicle capacity and must lie in `[0, 1]`.
    pub fn new(
        problem_size: usize,
        depot_xy: Vec<Position>,
        node_xy: Vec<Position>,
        node_demand: Vec<f64>,
    ) -> Result<Self, EnvError> {
        let expected = depot_xy.len() * problem_size;
        if node_xy.len() != expected {
            return Err(EnvError::ShapeMismatch {
                expected,
                actual: node_xy.len(),
            });
        }
        if node_demand.len() != expected {
            return Err(EnvError::ShapeMismatch {
                expected,
                actual: node_demand.len(),
            });
        }
        if let Some(bad) = node_demand.iter().find(|d| !(0.0..=1.0).contains(*d)) {
            return Err(EnvError::InvalidConfig(format!(
                "demand {bad} outside unit capacity"
            )));
        }
        Ok(Self {
            problem_size,
            depot_xy,
            node_xy,
            node_demand,
        })
    }

    /// Number of instances B.
    pub fn batch_size(&self) -> usize {
        self.depot_xy.len()
    }

    /// Number of customer nodes N.
    pub fn problem_size(&self) -> usize {
        self.problem_size
    }

    /// Depot position per instance.
    pub fn depot_xy(&self) -> &[Position] {
        &self.depot_xy
    }

    /// Customer positions, `B × N`.
    pub fn node_xy(&self) -> &[Position] {
        &self.node_xy
    }

    /// Customer demands, `B × N`.
    pub fn node_demand(&self) -> &[f64] {
        &self.node_demand
    }

    /// Returns the instances `start..start + len` as a new batch.
    pub fn slice(&self, start: usize, len: usize) -> ProblemBatch {
        let n = self.problem_size;
        ProblemBatch {
            problem_size: n,
            depot_xy: self.depot_xy[start..start + len].to_vec(),
            node_xy: self.node_xy[start * n..(start + len) * n].to_vec(),
            node_demand: self.node_demand[start * n..(start + len) * n].to_vec(),
        }
    }

    /// Depot+node coordinate table, `B × (N+1)`, depot at index 0.
    pub fn depot_node_xy(&self) -> Vec<Position> {
        let n = self.problem_size;
        let mut table = Vec::with_capacity(self.batch_size() * (n + 1));
        for (b, depot) in self.depot_xy.iter().enumerate() {
            table.push(*depot);
            table.extend_from_slice(&self.node_xy[b * n..(b + 1) * n]);
        }
        table
    }

    /// Depot+node demand table, `B × (N+1)`, depot demand 0.
    pub fn depot_node_demand(&self) -> Vec<f64> {
        let n = self.problem_size;
        let mut table = Vec::with_capacity(self.batch_size() * (n + 1));
        for b in 0..self.batch_size() {
            table.push(0.0);
            table.extend_from_slice(&self.node_demand[b * n..(b + 1) * n]);
        }
        table
    }

    /// Replicates every instance into the 8 symmetric folds of the unit square.
    ///
    /// The result is fold-major: instances `0..B` are the identity fold, so
    /// the first B entries equal the input exactly. Demands are repeated.
    pub fn augment_by_8_fold(&self) -> ProblemBatch {
        let mut node_demand = Vec::with_capacity(self.node_demand.len() * 8);
        for _ in 0..8 {
            node_demand.extend_from_slice(&self.node_demand);
        }
        ProblemBatch {
            problem_size: self.problem_size,
            depot_xy: augment_xy_by_8_fold(&self.depot_xy),
            node_xy: augment_xy_by_8_fold(&self.node_xy),
            node_demand,
        }
    }
}

/// Applies the 8 reflections/rotations of the unit square to every point.
///
/// Output order is fold-major, starting with the identity.
pub fn augment_xy_by_8_fold(points: &[Position]) -> Vec<Position> {
    let folds: [fn(f64, f64) -> (f64, f64); 8] = [
        |x, y| (x, y),
        |x, y| (1.0 - x, y),
        |x, y| (x, 1.0 - y),
        |x, y| (1.0 - x, 1.0 - y),
        |x, y| (y, x),
        |x, y| (1.0 - y, x),
        |x, y| (y, 1.0 - x),
        |x, y| (1.0 - y, 1.0 - x),
    ];
    folds
        .iter()
        .flat_map(|fold| {
            points.iter().map(move |p| {
                let (x, y) = fold(p.x, p.y);
                Position::new(x, y)
            })
        })
        .collect()
}

/// A supplier of problem batches.
pub trait ProblemSource: Send + std::fmt::Debug {
    /// Produces the next `batch_size` instances with `problem_size` customers.
    fn next_batch(
        &mut self,
        batch_size: usize,
        problem_size: usize,
    ) -> Result<ProblemBatch, EnvError>;

    /// Returns a human-readable name for this source.
    fn name(&self) -> &str;
}

/// Uniform random instances on the unit square.
///
/// Demands are integers in `1..=9` scaled by a size-dependent vehicle capacity.
#[derive(Debug)]
pub struct RandomProblems {
    rng: StdRng,
}

impl RandomProblems {
    /// Creates a generator with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Vehicle capacity used to normalize integer demands.
    pub fn demand_scaler(problem_size: usize) -> f64 {
        match problem_size {
            0..=20 => 30.0,
            21..=50 => 40.0,
            51..=100 => 50.0,
            _ => 50.0 + (problem_size as f64 - 100.0) / 10.0,
        }
    }
}

impl ProblemSource for RandomProblems {
    fn next_batch(
        &mut self,
        batch_size: usize,
        problem_size: usize,
    ) -> Result<ProblemBatch, EnvError> {
        let scaler = Self::demand_scaler(problem_size);
        let rng = &mut self.rng;
        let depot_xy = (0..batch_size)
            .map(|_| Position::new(rng.gen(), rng.gen()))
            .collect();
        let node_xy = (0..batch_size * problem_size)
            .map(|_| Position::new(rng.gen(), rng.gen()))
            .collect();
        let node_demand = (0..batch_size * problem_size)
            .map(|_| rng.gen_range(1..10) as f64 / scaler)
            .collect();
        ProblemBatch::new(problem_size, depot_xy, node_xy, node_demand)
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// A fixed pool of instances consumed sequentially.
///
/// Each `next_batch` call advances the cursor by the batch size; the pool is
/// never mutated and never wraps around.
#[derive(Debug, Clone)]
pub struct SavedProblems {
    pool: ProblemBatch,
    cursor: usize,
}

impl SavedProblems {
    /// Wraps a pool with the cursor at its first instance.
    pub fn new(pool: ProblemBatch) -> Self {
        Self { pool, cursor: 0 }
    }

    /// Number of instances in the pool.
    pub fn len(&self) -> usize {
        self.pool.batch_size()
    }

    /// Returns true if the pool holds no instances.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the next instance to be served.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Instances not yet served.
    pub fn remaining(&self) -> usize {
        self.len() - self.cursor
    }

    /// Reads a pool from a JSON file in the saved-record layout.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, EnvError> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|e| EnvError::Io(e.to_string()))?;
        Self::from_json_str(&text)
    }

    /// Parses a pool from a JSON string in the saved-record layout.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, EnvError> {
        let record: SavedProblemsRecord =
            serde_json::from_str(json).map_err(|e| EnvError::Parse(e.to_string()))?;
        Ok(Self::new(record.into_batch()?))
    }
}

impl ProblemSource for SavedProblems {
    fn next_batch(
        &mut self,
        batch_size: usize,
        problem_size: usize,
    ) -> Result<ProblemBatch, EnvError> {
        if self.pool.problem_size() != problem_size {
            return Err(EnvError::ProblemSizeMismatch {
                expected: problem_size,
                actual: self.pool.problem_size(),
            });
        }
        if batch_size > self.remaining() {
            return Err(EnvError::SavedPoolExhausted {
                requested: batch_size,
                cursor: self.cursor,
                available: self.len(),
            });
        }
        let batch = self.pool.slice(self.cursor, batch_size);
        self.cursor += batch_size;
        debug!(cursor = self.cursor, total = self.len(), "served saved problems");
        Ok(batch)
    }

    fn name(&self) -> &str {
        "saved"
    }
}

/// On-disk layout of a saved pool: depot `(B, 1, 2)`, nodes `(B, N, 2)`,
/// demands `(B, N)`.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedProblemsRecord {
    pub depot_xy: Vec<[[f64; 2]; 1]>,
    pub node_xy: Vec<Vec<[f64; 2]>>,
    pub node_demand: Vec<Vec<f64>>,
}

#[cfg(feature = "serde")]
impl SavedProblemsRecord {
    /// Captures a batch in the saved-record layout.
    pub fn from_batch(batch: &ProblemBatch) -> Self {
        let n = batch.problem_size();
        Self {
            depot_xy: batch.depot_xy().iter().map(|p| [p.as_array()]).collect(),
            node_xy: batch
                .node_xy()
                .chunks(n.max(1))
                .map(|row| row.iter().map(Position::as_array).collect())
                .collect(),
            node_demand: batch
                .node_demand()
                .chunks(n.max(1))
                .map(<[f64]>::to_vec)
                .collect(),
        }
    }

    /// Flattens the record into a batch, checking that all instances agree on N.
    pub fn into_batch(self) -> Result<ProblemBatch, EnvError> {
        let problem_size = self.node_xy.first().map_or(0, Vec::len);
        if let Some(row) = self.node_xy.iter().find(|row| row.len() != problem_size) {
            return Err(EnvError::ProblemSizeMismatch {
                expected: problem_size,
                actual: row.len(),
            });
        }
        if self.node_xy.len() != self.depot_xy.len() {
            return Err(EnvError::ShapeMismatch {
                expected: self.depot_xy.len(),
                actual: self.node_xy.len(),
            });
        }
        if self.node_demand.len() != self.depot_xy.len() {
            return Err(EnvError::ShapeMismatch {
                expected: self.depot_xy.len(),
                actual: self.node_demand.len(),
            });
        }
        if let Some(row) = self.node_demand.iter().find(|row| row.len() != problem_size) {
            return Err(EnvError::ProblemSizeMismatch {
                expected: problem_size,
                actual: row.len(),
            });
        }
        let depot_xy = self.depot_xy.into_iter().map(|[xy]| xy.into()).collect();
        let node_xy = self
            .node_xy
            .into_iter()
            .flatten()
            .map(Position::from)
            .collect();
        let node_demand = self.node_demand.into_iter().flatten().collect();
        ProblemBatch::new(problem_size, depot_xy, node_xy, node_demand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_instances() -> ProblemBatch {
        ProblemBatch::new(
            2,
            vec![Position::new(0.5, 0.5), Position::new(0.1, 0.2)],
            vec![
                Position::new(0.0, 0.0),
                Position::new(1.0, 0.0),
                Position::new(0.3, 0.4),
                Position::new(0.6, 0.9),
            ],
            vec![0.1, 0.2, 0.3, 0.4],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_wrong_lengths() {
        let err = ProblemBatch::new(3, vec![Position::origin()], vec![], vec![]);
        assert_eq!(
            err,
            Err(EnvError::ShapeMismatch {
                expected: 3,
                actual: 0
            })
        );
    }

    #[test]
    fn new_rejects_demand_above_capacity() {
        let err = ProblemBatch::new(
            1,
            vec![Position::origin()],
            vec![Position::origin()],
            vec![1.5],
        );
        assert!(matches!(err, Err(EnvError::InvalidConfig(_))));
    }

    #[test]
    fn depot_node_tables_put_depot_first() {
        let batch = two_instances();
        let xy = batch.depot_node_xy();
        let demand = batch.depot_node_demand();
        assert_eq!(xy.len(), 6);
        assert_eq!(xy[0], Position::new(0.5, 0.5));
        assert_eq!(xy[3], Position::new(0.1, 0.2));
        assert_eq!(xy[5], Position::new(0.6, 0.9));
        assert_eq!(demand, vec![0.0, 0.1, 0.2, 0.0, 0.3, 0.4]);
    }

    #[test]
    fn augmentation_keeps_identity_fold_first() {
        let batch = two_instances();
        let aug = batch.augment_by_8_fold();
        assert_eq!(aug.batch_size(), 16);
        assert_eq!(aug.slice(0, 2), batch);
    }

    #[test]
    fn augmentation_folds_stay_in_unit_square() {
        let points = vec![Position::new(0.2, 0.7)];
        let folds = augment_xy_by_8_fold(&points);
        assert_eq!(folds.len(), 8);
        assert!((folds[1].x - 0.8).abs() < 1e-12 && folds[1].y == 0.7);
        assert_eq!(folds[4], Position::new(0.7, 0.2));
        for p in folds {
            assert!((0.0..=1.0).contains(&p.x));
            assert!((0.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn random_problems_are_reproducible() {
        let a = RandomProblems::new(7).next_batch(3, 10).unwrap();
        let b = RandomProblems::new(7).next_batch(3, 10).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.batch_size(), 3);
        assert!(a.node_demand().iter().all(|d| *d > 0.0 && *d < 1.0));
    }

    #[test]
    fn saved_problems_advance_cursor() {
        let mut saved = SavedProblems::new(two_instances());
        let first = saved.next_batch(1, 2).unwrap();
        assert_eq!(first.depot_xy(), &[Position::new(0.5, 0.5)]);
        assert_eq!(saved.cursor(), 1);
        let second = saved.next_batch(1, 2).unwrap();
        assert_eq!(second.node_demand(), &[0.3, 0.4]);
        assert_eq!(saved.remaining(), 0);
    }

    #[test]
    fn saved_problems_report_exhaustion() {
        let mut saved = SavedProblems::new(two_instances());
        saved.next_batch(1, 2).unwrap();
        assert_eq!(
            saved.next_batch(2, 2),
            Err(EnvError::SavedPoolExhausted {
                requested: 2,
                cursor: 1,
                available: 2
            })
        );
        assert_eq!(saved.cursor(), 1);
    }

    #[test]
    fn saved_problems_reject_other_problem_size() {
        let mut saved = SavedProblems::new(two_instances());
        assert_eq!(
            saved.next_batch(1, 5),
            Err(EnvError::ProblemSizeMismatch {
                expected: 5,
                actual: 2
            })
        );
    }

    #[cfg(feature = "serde")]
    mod serde_tests {
        use super::*;

        #[test]
        fn record_json_layout() {
            let json = r#"{
                "depot_xy": [[[0.5, 0.5]], [[0.1, 0.2]]],
                "node_xy": [[[0.0, 0.0], [1.0, 0.0]], [[0.3, 0.4], [0.6, 0.9]]],
                "node_demand": [[0.1, 0.2], [0.3, 0.4]]
            }"#;
            let saved = SavedProblems::from_json_str(json).unwrap();
            assert_eq!(saved.len(), 2);
            assert_eq!(saved.pool, two_instances());
        }

        #[test]
        fn record_captures_batch() {
            let record = SavedProblemsRecord::from_batch(&two_instances());
            assert_eq!(record.depot_xy[1], [[0.1, 0.2]]);
            assert_eq!(record.node_demand[1], vec![0.3, 0.4]);
            assert_eq!(record.into_batch().unwrap(), two_instances());
        }

        #[test]
        fn ragged_record_rejected() {
            let json = r#"{
                "depot_xy": [[[0.5, 0.5]], [[0.1, 0.2]]],
                "node_xy": [[[0.0, 0.0], [1.0, 0.0]], [[0.3, 0.4]]],
                "node_demand": [[0.1, 0.2], [0.3]]
            }"#;
            assert!(matches!(
                SavedProblems::from_json_str(json),
                Err(EnvError::ProblemSizeMismatch { .. })
            ));
        }

        #[test]
        fn demand_rows_must_match_node_rows() {
            // Same total demand count, but split unevenly across instances.
            let json = r#"{
                "depot_xy": [[[0.5, 0.5]], [[0.1, 0.2]]],
                "node_xy": [[[0.0, 0.0], [1.0, 0.0]], [[0.3, 0.4], [0.6, 0.9]]],
                "node_demand": [[0.1, 0.2, 0.3], [0.4]]
            }"#;
            assert_eq!(
                SavedProblems::from_json_str(json).unwrap_err(),
                EnvError::ProblemSizeMismatch {
                    expected: 2,
                    actual: 3
                }
            );
        }

        #[test]
        fn missing_demand_row_rejected() {
            let json = r#"{
                "depot_xy": [[[0.5, 0.5]], [[0.1, 0.2]]],
                "node_xy": [[[0.0, 0.0], [1.0, 0.0]], [[0.3, 0.4], [0.6, 0.9]]],
                "node_demand": [[0.1, 0.2, 0.3, 0.4]]
            }"#;
            assert_eq!(
                SavedProblems::from_json_str(json).unwrap_err(),
                EnvError::ShapeMismatch {
                    expected: 2,
                    actual: 1
                }
            );
        }

        #[test]
        fn malformed_json_is_parse_error() {
            assert!(matches!(
                SavedProblems::from_json_str("{"),
                Err(EnvError::Parse(_))
            ));
        }
    }
}
