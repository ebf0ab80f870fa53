//! The direct-solve smoother.
//!
//! One instance lives at one multigrid level. Construction resolves the
//! engine name; `setup` factorizes the (possibly nullspace-corrected) level
//! operator; `apply` runs the triangular solves. Setup and apply are
//! synchronous, and in a partitioned run both are collective: every rank
//! must call them the same number of times in the same order. A single
//! instance is not safe for concurrent apply; independent instances on
//! independent operators are.

use std::fmt;
use std::sync::Arc;

use mgx_core::{CsrOperator, MultiVector, Operator};

use crate::backend::{self, BackendRegistry, DirectSolver};
use crate::error::{Result, SmootherError};
use crate::level::Level;
use crate::logging::{FacadeLog, SmootherLog};
use crate::params::SmootherParams;
use crate::smoother::nullspace::fix_nullspace;
use crate::verbosity::Verbosity;

/// Private contiguized vectors used when the corrected operator's layout
/// does not match the caller's. Decided and allocated during setup, never
/// probed during apply.
struct WorkingBuffers {
    x: MultiVector,
    b: MultiVector,
}

/// Coarse-level smoother that solves the residual equation exactly through
/// a direct-solver engine.
pub struct DirectSmoother {
    backend_name: String,
    params: SmootherParams,
    registry: Arc<BackendRegistry>,
    log: Arc<dyn SmootherLog>,
    solver: Option<Box<dyn DirectSolver>>,
    working: Option<WorkingBuffers>,
    is_setup: bool,
}

impl DirectSmoother {
    /// Construct with the shipped registry and the `log`-facade collaborator.
    ///
    /// Resolves the requested engine name immediately (walking the fallback
    /// order if needed); no operator is touched until [`setup`](Self::setup).
    pub fn new(params: SmootherParams) -> Result<Self> {
        Self::with_collaborators(
            params,
            Arc::new(BackendRegistry::default()),
            Arc::new(FacadeLog),
        )
    }

    /// Construct with explicit registry and logging collaborators.
    pub fn with_collaborators(
        params: SmootherParams,
        registry: Arc<BackendRegistry>,
        log: Arc<dyn SmootherLog>,
    ) -> Result<Self> {
        let backend_name = backend::resolve_backend(&params.backend, &registry, log.as_ref())?;
        Ok(Self {
            backend_name,
            params,
            registry,
            log,
            solver: None,
            working: None,
            is_setup: false,
        })
    }

    /// Resolved canonical engine name.
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    /// Declare which level inputs must be populated before setup.
    pub fn declare_input(&self, level: &mut Level) {
        level.request("A");
        if self.params.fix_nullspace {
            level.request("Nullspace");
        }
    }

    /// Factorize the level operator.
    ///
    /// Re-running setup is not an error: it logs a warning, drops the old
    /// solver handle, and factorizes afresh.
    pub fn setup(&mut self, level: &Level) -> Result<()> {
        if self.is_setup {
            self.log
                .warning("DirectSmoother::setup: setup has already been called");
        }
        self.solver = None;
        self.working = None;
        self.is_setup = false;

        let a = level.operator("A")?;
        let mut backend_options = self.params.backend_options.clone();

        let factor_a: CsrOperator = if self.params.fix_nullspace {
            self.log.runtime("DirectSmoother::setup: fixing nullspace");
            let nullspace = level.multivector("Nullspace")?;
            fix_nullspace(a.as_ref(), &nullspace, self.log.as_ref())?
        } else {
            a.as_row_sparse()
                .ok_or_else(|| {
                    SmootherError::Precondition(
                        "factorization of an operator without row-sparse access has not \
                         been implemented yet"
                            .into(),
                    )
                })?
                .clone()
        };

        // Layout decision. Engines index vectors by local position, so a
        // corrected operator over a gapped numbering needs private
        // contiguized buffers; without the correction the gap is only
        // forwarded to the engine as a hint.
        if !factor_a.row_map().is_contiguous() {
            if self.params.fix_nullspace {
                let contiguized = Arc::new(factor_a.row_map().contiguized());
                self.working = Some(WorkingBuffers {
                    x: MultiVector::new(contiguized.clone(), 1),
                    b: MultiVector::new(contiguized, 1),
                });
            } else {
                backend_options = ensure_option(
                    backend_options,
                    "IsContiguous",
                    serde_json::Value::Bool(false),
                );
            }
        }

        let mut solver = self.registry.create(&self.backend_name)?;
        solver.set_options(&backend_options)?;
        solver.factor(&factor_a)?;

        self.solver = Some(solver);
        self.is_setup = true;
        Ok(())
    }

    /// Solve `A' x = b`, writing the solution into `x`.
    ///
    /// The initial-guess flag is accepted but unused: the engine always
    /// performs a fresh solve rather than refining a guess.
    pub fn apply(
        &mut self,
        x: &mut MultiVector,
        b: &MultiVector,
        _zero_initial_guess: bool,
    ) -> Result<()> {
        if !self.is_setup {
            return Err(SmootherError::Precondition(
                "DirectSmoother::apply: setup has not been called".into(),
            ));
        }

        let Self {
            solver, working, ..
        } = self;
        let solver = solver.as_ref().ok_or_else(|| {
            SmootherError::Precondition("DirectSmoother::apply: no solver handle".into())
        })?;

        if x.num_vectors() != b.num_vectors() || x.local_length() != b.local_length() {
            return Err(SmootherError::Precondition(format!(
                "solution and right-hand side shapes differ: {} column(s) of length {} \
                 vs {} column(s) of length {}",
                x.num_vectors(),
                x.local_length(),
                b.num_vectors(),
                b.local_length()
            )));
        }

        match working.as_mut() {
            None => {
                for col in 0..x.num_vectors() {
                    solver.solve(x.data_mut(col), b.data(col))?;
                }
            }
            Some(WorkingBuffers { x: wx, b: wb }) => {
                if x.num_vectors() > 1 {
                    return Err(SmootherError::Precondition(
                        "transformed-layout apply for multivectors has not been \
                         implemented yet"
                            .into(),
                    ));
                }
                let length = x.local_length();
                for i in 0..length {
                    wx.data_mut(0)[i] = x.data(0)[i];
                    wb.data_mut(0)[i] = b.data(0)[i];
                }

                solver.solve(wx.data_mut(0), wb.data(0))?;

                for i in 0..length {
                    x.data_mut(0)[i] = wx.data(0)[i];
                }
            }
        }
        Ok(())
    }

    /// Independent prototype clone: same resolved engine, parameters, and
    /// collaborators, but no solver state until its own setup runs.
    pub fn prototype_copy(&self) -> Self {
        Self {
            backend_name: self.backend_name.clone(),
            params: self.params.clone(),
            registry: self.registry.clone(),
            log: self.log.clone(),
            solver: None,
            working: None,
            is_setup: false,
        }
    }

    /// Nonzero count of the factorization, or zero before setup.
    pub fn node_smoother_complexity(&self) -> usize {
        self.solver.as_ref().map(|s| s.factor_nnz()).unwrap_or(0)
    }

    pub fn description(&self) -> String {
        match &self.solver {
            Some(solver) => solver.description(),
            None => format!("DirectSmoother{{backend = {}}}", self.backend_name),
        }
    }

    /// Verbosity-gated diagnostic print.
    pub fn print(&self, out: &mut dyn fmt::Write, verbosity: Verbosity) -> fmt::Result {
        if verbosity.contains(Verbosity::PARAMETERS0) {
            writeln!(out, "Backend: {}", self.backend_name)?;
        }
        if verbosity.contains(Verbosity::PARAMETERS1) {
            writeln!(out, "Parameter list:")?;
            writeln!(out, "  backend = \"{}\"", self.params.backend)?;
            writeln!(out, "  fix nullspace = {}", self.params.fix_nullspace)?;
            writeln!(out, "  backend_options = {}", self.params.backend_options)?;
        }
        if verbosity.contains(Verbosity::EXTERNAL) {
            if let Some(solver) = &self.solver {
                writeln!(out, "{}", solver.description())?;
            }
        }
        if verbosity.contains(Verbosity::DEBUG) {
            writeln!(out, "IsSetup: {}", self.is_setup)?;
            writeln!(
                out,
                "solver handle: {}",
                if self.solver.is_some() {
                    "present"
                } else {
                    "absent"
                }
            )?;
        }
        Ok(())
    }
}

/// Insert `key` into the forwarded options unless the caller already set it.
fn ensure_option(
    options: serde_json::Value,
    key: &str,
    value: serde_json::Value,
) -> serde_json::Value {
    let mut options = match options {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other,
    };
    if let Some(map) = options.as_object_mut() {
        map.entry(key.to_string()).or_insert(value);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendDescriptor;
    use crate::logging::test_support::RecordingLog;
    use mgx_core::{Comm, Map};
    use nalgebra::{DMatrix, DVector};
    use std::sync::Mutex;

    fn spd_triplets() -> Vec<(usize, usize, f64)> {
        vec![
            (0, 0, 4.0),
            (0, 1, -1.0),
            (1, 0, -1.0),
            (1, 1, 4.0),
            (1, 2, -1.0),
            (2, 1, -1.0),
            (2, 2, 4.0),
        ]
    }

    fn laplacian_triplets() -> Vec<(usize, usize, f64)> {
        vec![
            (0, 0, 1.0),
            (0, 1, -1.0),
            (1, 0, -1.0),
            (1, 1, 2.0),
            (1, 2, -1.0),
            (2, 1, -1.0),
            (2, 2, 1.0),
        ]
    }

    fn level_with(map: &Arc<Map>, triplets: &[(usize, usize, f64)]) -> Level {
        let a = CsrOperator::from_triplets(map.clone(), triplets).unwrap();
        let mut level = Level::new();
        level.set_operator("A", Arc::new(a));
        level
    }

    fn smoother(params: SmootherParams) -> (DirectSmoother, Arc<RecordingLog>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let log = Arc::new(RecordingLog::default());
        let s = DirectSmoother::with_collaborators(
            params,
            Arc::new(BackendRegistry::default()),
            log.clone(),
        )
        .unwrap();
        (s, log)
    }

    fn dense_solve(a: &DMatrix<f64>, b: &DVector<f64>) -> DVector<f64> {
        a.clone().lu().solve(b).expect("dense reference solve")
    }

    #[test]
    fn apply_before_setup_is_a_precondition_error() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let (mut s, _) = smoother(SmootherParams::default());
        let b = MultiVector::new(map.clone(), 1);
        let mut x = MultiVector::new(map, 1);
        assert!(matches!(
            s.apply(&mut x, &b, true),
            Err(SmootherError::Precondition(_))
        ));
    }

    #[test]
    fn apply_reproduces_the_dense_reference_solution() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let level = level_with(&map, &spd_triplets());
        let (mut s, _) = smoother(SmootherParams::default());

        s.declare_input(&mut Level::new()); // exercised for coverage; level below is populated
        s.setup(&level).unwrap();
        assert!(s.is_setup());
        assert!(s.working.is_none());

        let b = MultiVector::from_column(map.clone(), DVector::from_vec(vec![1.0, 2.0, 1.0]))
            .unwrap();
        let mut x = MultiVector::new(map, 1);
        s.apply(&mut x, &b, true).unwrap();

        let dense = DMatrix::from_row_slice(
            3,
            3,
            &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 4.0],
        );
        let expected = dense_solve(&dense, b.data(0));
        for i in 0..3 {
            let rel = (x.data(0)[i] - expected[i]).abs() / expected[i].abs();
            assert!(rel < 1e-12, "row {}: relative error {}", i, rel);
        }
    }

    #[test]
    fn repeated_setup_warns_and_uses_the_fresh_factorization() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 2));
        let level1 = level_with(&map, &[(0, 0, 2.0), (1, 1, 2.0)]);
        let level2 = level_with(&map, &[(0, 0, 4.0), (1, 1, 4.0)]);
        let (mut s, log) = smoother(SmootherParams::default());

        s.setup(&level1).unwrap();
        assert_eq!(log.warning_count(), 0);
        s.setup(&level2).unwrap();
        assert!(log.warning_containing("already been called"));

        let b = MultiVector::from_column(map.clone(), DVector::from_vec(vec![8.0, 8.0]))
            .unwrap();
        let mut x = MultiVector::new(map, 1);
        s.apply(&mut x, &b, true).unwrap();

        // The second operator (diag 4) is the one in effect.
        assert!((x.data(0)[0] - 2.0).abs() < 1e-12);
        assert!((x.data(0)[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn nullspace_fix_makes_a_singular_operator_solvable() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let mut level = level_with(&map, &laplacian_triplets());
        let nullspace = MultiVector::from_column(
            map.clone(),
            DVector::from_element(3, 1.0),
        )
        .unwrap();
        level.set_multivector("Nullspace", Arc::new(nullspace));

        let params = SmootherParams {
            fix_nullspace: true,
            ..Default::default()
        };
        let (mut s, log) = smoother(params);
        s.setup(&level).unwrap();
        assert!(log.runtime_containing("fixing nullspace"));
        assert!(s.working.is_none()); // contiguous layout, no private buffers

        let b = MultiVector::from_column(map.clone(), DVector::from_vec(vec![1.0, 0.0, -1.0]))
            .unwrap();
        let mut x = MultiVector::new(map, 1);
        s.apply(&mut x, &b, true).unwrap();

        // Reference: dense solve of A + (n n^T)/3.
        let mut dense = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 1.0],
        );
        dense.add_scalar_mut(1.0 / 3.0);
        let expected = dense_solve(&dense, b.data(0));
        for i in 0..3 {
            assert!(
                (x.data(0)[i] - expected[i]).abs() < 1e-12,
                "row {}: {} vs {}",
                i,
                x.data(0)[i],
                expected[i]
            );
        }
    }

    #[test]
    fn gapped_numbering_with_fix_uses_private_buffers() {
        let map = Arc::new(
            Map::from_global_indices(Comm::serial(), 3, vec![0, 2, 4]).unwrap(),
        );
        let mut level = level_with(&map, &laplacian_triplets());
        let nullspace = MultiVector::from_column(
            map.clone(),
            DVector::from_element(3, 1.0),
        )
        .unwrap();
        level.set_multivector("Nullspace", Arc::new(nullspace));

        let params = SmootherParams {
            fix_nullspace: true,
            ..Default::default()
        };
        let (mut s, _) = smoother(params);
        s.setup(&level).unwrap();
        assert!(s.working.is_some());

        let b = MultiVector::from_column(map.clone(), DVector::from_vec(vec![1.0, 0.0, -1.0]))
            .unwrap();
        let mut x = MultiVector::new(map.clone(), 1);
        s.apply(&mut x, &b, true).unwrap();

        // Post-apply, the private solution buffer holds exactly what was
        // copied back to the caller.
        let w = s.working.as_ref().unwrap();
        for i in 0..3 {
            assert_eq!(w.x.data(0)[i], x.data(0)[i]);
            assert_eq!(w.b.data(0)[i], b.data(0)[i]);
        }

        let mut dense = DMatrix::from_row_slice(
            3,
            3,
            &[1.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 1.0],
        );
        dense.add_scalar_mut(1.0 / 3.0);
        let expected = dense_solve(&dense, b.data(0));
        for i in 0..3 {
            assert!((x.data(0)[i] - expected[i]).abs() < 1e-12);
        }

        // Multi-column apply under transformation is not implemented.
        let mut x2 = MultiVector::new(map.clone(), 2);
        let b2 = MultiVector::new(map, 2);
        assert!(matches!(
            s.apply(&mut x2, &b2, true),
            Err(SmootherError::Precondition(_))
        ));
    }

    #[test]
    fn complexity_is_zero_before_setup_and_nnz_after() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let level = level_with(&map, &spd_triplets());
        let (mut s, _) = smoother(SmootherParams::default());

        assert_eq!(s.node_smoother_complexity(), 0);
        s.setup(&level).unwrap();
        assert!(s.node_smoother_complexity() >= 7);
    }

    #[test]
    fn prototype_copy_shares_no_solver_state() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let level = level_with(&map, &spd_triplets());
        let (mut s, _) = smoother(SmootherParams::default());
        s.setup(&level).unwrap();

        let mut copy = s.prototype_copy();
        assert!(!copy.is_setup());
        assert_eq!(copy.node_smoother_complexity(), 0);
        assert_eq!(copy.backend_name(), s.backend_name());

        copy.setup(&level).unwrap();
        let b = MultiVector::from_column(map.clone(), DVector::from_vec(vec![1.0, 2.0, 1.0]))
            .unwrap();
        let mut x = MultiVector::new(map, 1);
        copy.apply(&mut x, &b, true).unwrap();
    }

    #[test]
    fn declare_input_requests_nullspace_only_with_the_fix() {
        let (plain, _) = smoother(SmootherParams::default());
        let mut level = Level::new();
        plain.declare_input(&mut level);
        assert!(level.is_requested("A"));
        assert!(!level.is_requested("Nullspace"));

        let (fixing, _) = smoother(SmootherParams {
            fix_nullspace: true,
            ..Default::default()
        });
        let mut level = Level::new();
        fixing.declare_input(&mut level);
        assert!(level.is_requested("A"));
        assert!(level.is_requested("Nullspace"));
    }

    #[test]
    fn missing_nullspace_input_fails_setup() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let level = level_with(&map, &laplacian_triplets());
        let (mut s, _) = smoother(SmootherParams {
            fix_nullspace: true,
            ..Default::default()
        });
        assert!(matches!(
            s.setup(&level),
            Err(SmootherError::Precondition(_))
        ));
        assert!(!s.is_setup());
    }

    #[test]
    fn description_and_print_reflect_setup_state() {
        let map = Arc::new(Map::contiguous(Comm::serial(), 3));
        let level = level_with(&map, &spd_triplets());
        let (mut s, _) = smoother(SmootherParams::default());

        assert!(s.description().contains("DirectSmoother"));

        let mut out = String::new();
        s.print(&mut out, Verbosity::PARAMETERS0 | Verbosity::DEBUG)
            .unwrap();
        assert!(out.contains("Backend: Superlu"));
        assert!(out.contains("IsSetup: false"));

        s.setup(&level).unwrap();
        assert!(s.description().contains("Superlu"));

        let mut out = String::new();
        s.print(&mut out, Verbosity::ALL).unwrap();
        assert!(out.contains("IsSetup: true"));
        assert!(out.contains("nnz(LU)"));
    }

    // Engine probe capturing the options the smoother forwards.
    static PROBED_OPTIONS: Mutex<Option<serde_json::Value>> = Mutex::new(None);

    struct ProbeEngine {
        n: usize,
    }

    impl DirectSolver for ProbeEngine {
        fn set_options(&mut self, options: &serde_json::Value) -> crate::Result<()> {
            *PROBED_OPTIONS.lock().unwrap() = Some(options.clone());
            Ok(())
        }

        fn factor(&mut self, a: &CsrOperator) -> crate::Result<()> {
            self.n = a.local_rows();
            Ok(())
        }

        fn solve(&self, _x: &mut DVector<f64>, _b: &DVector<f64>) -> crate::Result<()> {
            Ok(())
        }

        fn factor_nnz(&self) -> usize {
            self.n
        }

        fn description(&self) -> String {
            "Probe".into()
        }
    }

    fn probe_registry() -> Arc<BackendRegistry> {
        let mut registry = BackendRegistry::empty();
        registry.register(BackendDescriptor {
            name: "Probe",
            available: || true,
            factory: || Ok(Box::new(ProbeEngine { n: 0 })),
        });
        Arc::new(registry)
    }

    #[test]
    fn gapped_numbering_without_fix_forwards_a_contiguity_hint() {
        let map = Arc::new(
            Map::from_global_indices(Comm::serial(), 3, vec![0, 2, 4]).unwrap(),
        );
        let level = level_with(&map, &spd_triplets());

        // Hint injected when the caller did not set one.
        let log = Arc::new(RecordingLog::default());
        let mut s = DirectSmoother::with_collaborators(
            SmootherParams {
                backend: "probe".into(),
                ..Default::default()
            },
            probe_registry(),
            log,
        )
        .unwrap();

        s.setup(&level).unwrap();
        assert!(s.working.is_none());

        let forwarded = PROBED_OPTIONS.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded["IsContiguous"], serde_json::json!(false));

        // A caller-supplied value is forwarded untouched.
        let log = Arc::new(RecordingLog::default());
        let mut s = DirectSmoother::with_collaborators(
            SmootherParams {
                backend: "probe".into(),
                backend_options: serde_json::json!({"IsContiguous": true}),
                ..Default::default()
            },
            probe_registry(),
            log,
        )
        .unwrap();

        s.setup(&level).unwrap();
        let forwarded = PROBED_OPTIONS.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded["IsContiguous"], serde_json::json!(true));
    }
}
