//! Per-thread chemistry worker.
//!
//! A worker owns one expression evaluator, one ODE integrator, and one
//! Newton solver, and applies reactions to a single segment's
//! concentration vector at a time. The transport engine creates one
//! worker per thread, so no solver scratch state is ever shared.

use crate::classify::{Classification, SpeciesGroups};
use crate::error::{ChemError, ChemResult};
use crate::rates::{ExprRates, RateEvaluator};
use crate::vars::{lookup_var, SegEnv};
use nalgebra::DVector;
use wq_core::{Coupling, QualityOptions, Real};
use wq_network::{Kinetics, Network, Species};
use wq_solver::{new_integrator, NewtonConfig, NewtonSolver, OdeIntegrator, OdeTolerances};
use wq_solver::{SolverError, SolverResult};

/// Whether a segment belongs to a pipe or a tank, selecting which of a
/// species' two kinetics definitions applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Pipe,
    Tank,
}

impl ElementKind {
    pub fn groups(self, classes: &Classification) -> &SpeciesGroups {
        match self {
            ElementKind::Pipe => &classes.pipe,
            ElementKind::Tank => &classes.tank,
        }
    }

    fn kinetics(self, sp: &Species) -> &Kinetics {
        match self {
            ElementKind::Pipe => &sp.pipe_kinetics,
            ElementKind::Tank => &sp.tank_kinetics,
        }
    }

    fn context(self) -> &'static str {
        match self {
            ElementKind::Pipe => "pipe kinetics",
            ElementKind::Tank => "tank kinetics",
        }
    }
}

/// Per-variable tolerance slices for one rate group, resolved once at
/// construction from species overrides and the global defaults.
#[derive(Debug, Clone, Default)]
struct RateTols {
    atol: Vec<Real>,
    rtol: Vec<Real>,
}

/// One thread's reaction machinery.
pub struct ChemWorker {
    evaluator: Box<dyn RateEvaluator>,
    integrator: Box<dyn OdeIntegrator>,
    newton: NewtonSolver,
    coupling: Coupling,
    pipe_tols: RateTols,
    tank_tols: RateTols,
    /// Rate-species state vector handed to the integrator.
    y: Vec<Real>,
    /// Full concentration vector seen by expressions inside the
    /// derivative callback.
    scratch: Vec<Real>,
}

impl ChemWorker {
    pub fn new(net: &Network, classes: &Classification, opts: &QualityOptions) -> Self {
        Self::with_evaluator(net, classes, opts, Box::new(ExprRates::new()))
    }

    /// Build a worker around a non-default kinetics backend.
    pub fn with_evaluator(
        net: &Network,
        classes: &Classification,
        opts: &QualityOptions,
        evaluator: Box<dyn RateEvaluator>,
    ) -> Self {
        let tols_for = |group: &SpeciesGroups| {
            let mut tols = RateTols::default();
            for &id in &group.rate {
                let sp = net.species_at(id);
                tols.atol.push(sp.abs_tol.unwrap_or(opts.abs_tol));
                tols.rtol.push(sp.rel_tol.unwrap_or(opts.rel_tol));
            }
            tols
        };
        Self {
            evaluator,
            integrator: new_integrator(opts.integrator),
            newton: NewtonSolver::new(NewtonConfig {
                max_iterations: opts.newton_max_iter,
                digits: opts.newton_digits,
                ..NewtonConfig::default()
            }),
            coupling: opts.coupling,
            pipe_tols: tols_for(&classes.pipe),
            tank_tols: tols_for(&classes.tank),
            y: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// React one segment over `[t0, t0 + dt]` in place.
    ///
    /// Order matters: rate species are integrated first (with equilibria
    /// re-solved inside every derivative when coupling is `Full`), then
    /// equilibria are enforced on the final state, then formulas are
    /// evaluated from everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn react_segment(
        &mut self,
        net: &Network,
        classes: &Classification,
        kind: ElementKind,
        conc: &mut [Real],
        params: &[Real],
        env: &SegEnv,
        t0: Real,
        dt: Real,
    ) -> ChemResult<()> {
        let groups = kind.groups(classes);
        if groups.is_inert() {
            return Ok(());
        }

        let Self {
            evaluator,
            integrator,
            newton,
            coupling,
            pipe_tols,
            tank_tols,
            y,
            scratch,
        } = self;
        let tols = match kind {
            ElementKind::Pipe => &*pipe_tols,
            ElementKind::Tank => &*tank_tols,
        };

        if !groups.rate.is_empty() {
            y.clear();
            y.extend(groups.rate.iter().map(|&id| conc[id.usize()]));
            scratch.clear();
            scratch.extend_from_slice(conc);

            let coupled = *coupling == Coupling::Full;
            let mut rhs = |_t: Real, yv: &[Real], dydt: &mut [Real]| -> SolverResult<()> {
                for (slot, &id) in groups.rate.iter().enumerate() {
                    scratch[id.usize()] = yv[slot];
                }
                if coupled {
                    solve_equilibrium(&mut **evaluator, newton, net, kind, groups, scratch, params, env)
                        .map_err(|e| SolverError::Derivative {
                            what: e.to_string(),
                        })?;
                }
                for (slot, &id) in groups.rate.iter().enumerate() {
                    let sp = net.species_at(id);
                    let Some(prog) = kind.kinetics(sp).program() else {
                        dydt[slot] = 0.0;
                        continue;
                    };
                    dydt[slot] = evaluator.eval(prog, &mut |v| lookup_var(v, scratch, params, env));
                    if let Some(fault) = evaluator.take_fault() {
                        return Err(SolverError::Derivative {
                            what: format!(
                                "'{}' on {} in rate expression for '{}'",
                                fault.op, fault.value, sp.name
                            ),
                        });
                    }
                }
                Ok(())
            };

            integrator
                .integrate(
                    y,
                    t0,
                    t0 + dt,
                    OdeTolerances {
                        atol: &tols.atol,
                        rtol: &tols.rtol,
                    },
                    &mut rhs,
                )
                .map_err(|source| ChemError::Integration { source })?;

            for (slot, &id) in groups.rate.iter().enumerate() {
                conc[id.usize()] = y[slot];
            }
        }

        if !groups.equil.is_empty() {
            solve_equilibrium(&mut **evaluator, newton, net, kind, groups, conc, params, env).map_err(
                |source| ChemError::Equilibrium {
                    species: group_names(net, &groups.equil),
                    source,
                },
            )?;
        }

        for &id in &groups.formula {
            let sp = net.species_at(id);
            let Some(prog) = kind.kinetics(sp).program() else {
                continue;
            };
            let v = evaluator.eval(prog, &mut |var| lookup_var(var, conc, params, env));
            if let Some(fault) = evaluator.take_fault() {
                return Err(ChemError::MathFault {
                    op: fault.op,
                    value: fault.value,
                    species: sp.name.clone(),
                    context: kind.context(),
                });
            }
            conc[id.usize()] = v;
        }

        Ok(())
    }
}

/// Enforce the equilibrium constraints on `conc` in place.
#[allow(clippy::too_many_arguments)]
fn solve_equilibrium(
    evaluator: &mut dyn RateEvaluator,
    newton: &NewtonSolver,
    net: &Network,
    kind: ElementKind,
    groups: &SpeciesGroups,
    conc: &mut [Real],
    params: &[Real],
    env: &SegEnv,
) -> SolverResult<()> {
    if groups.equil.is_empty() {
        return Ok(());
    }

    let mut x = DVector::from_iterator(
        groups.equil.len(),
        groups.equil.iter().map(|&id| conc[id.usize()]),
    );

    let mut work = conc.to_vec();
    let iterations = newton.solve(&mut x, |xv| {
        for (slot, &id) in groups.equil.iter().enumerate() {
            work[id.usize()] = xv[slot];
        }
        let mut r = DVector::zeros(groups.equil.len());
        for (slot, &id) in groups.equil.iter().enumerate() {
            let sp = net.species_at(id);
            let Some(prog) = kind.kinetics(sp).program() else {
                continue;
            };
            r[slot] = evaluator.eval(prog, &mut |v| lookup_var(v, &work, params, env));
            if let Some(fault) = evaluator.take_fault() {
                return Err(SolverError::Derivative {
                    what: format!(
                        "'{}' on {} in equilibrium expression for '{}'",
                        fault.op, fault.value, sp.name
                    ),
                });
            }
        }
        Ok(r)
    })?;
    tracing::debug!(
        iterations,
        unknowns = groups.equil.len(),
        "equilibrium solve converged"
    );

    for (slot, &id) in groups.equil.iter().enumerate() {
        conc[id.usize()] = x[slot];
    }
    Ok(())
}

fn group_names(net: &Network, ids: &[wq_core::SpeciesId]) -> String {
    ids.iter()
        .map(|&id| net.species_at(id).name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::vars::ParamTable;
    use wq_express::compile;
    use wq_network::NetworkBuilder;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    // Species are compiled against their declaration indices, matching
    // the order they are added to the builder below.
    fn resolver(params: &ParamTable) -> impl FnMut(&str) -> Option<u32> + '_ {
        move |name| match name {
            "Cl2" => Some(0),
            "HOCl" => Some(1),
            "Age" => Some(2),
            _ => params.index_of(name),
        }
    }

    fn decay_network(params: &ParamTable) -> Network {
        let mut b = NetworkBuilder::new();

        let mut cl2 = Species::bulk("Cl2");
        cl2.pipe_kinetics = Kinetics::Rate(compile("0 - k * Cl2", resolver(params)).unwrap());
        b.add_species(cl2);

        let mut hocl = Species::bulk("HOCl");
        hocl.pipe_kinetics =
            Kinetics::Equilibrium(compile("HOCl - 0.4 * Cl2", resolver(params)).unwrap());
        b.add_species(hocl);

        let mut age = Species::bulk("Age");
        age.pipe_kinetics = Kinetics::Formula(compile("Cl2 + HOCl", resolver(params)).unwrap());
        b.add_species(age);

        b.build().unwrap()
    }

    #[test]
    fn first_order_decay_matches_exact_solution() {
        init_tracing();
        let mut params = ParamTable::default();
        params.add("k", 0.5);
        let net = decay_network(&params);
        let classes = classify(&net);
        let opts = QualityOptions::default();
        let mut worker = ChemWorker::new(&net, &classes, &opts);

        let mut conc = vec![2.0, 0.0, 0.0];
        let env = SegEnv::default();
        worker
            .react_segment(
                &net,
                &classes,
                ElementKind::Pipe,
                &mut conc,
                &params.values,
                &env,
                0.0,
                1.0,
            )
            .unwrap();

        let exact = 2.0 * (-0.5f64).exp();
        assert!((conc[0] - exact).abs() < 1e-4, "got {}", conc[0]);
        // equilibrium enforced on the decayed value, formula on both
        assert!((conc[1] - 0.4 * conc[0]).abs() < 1e-4);
        assert!((conc[2] - (conc[0] + conc[1])).abs() < 1e-9);
    }

    #[test]
    fn tank_side_is_inert_here() {
        let mut params = ParamTable::default();
        params.add("k", 0.5);
        let net = decay_network(&params);
        let classes = classify(&net);
        let opts = QualityOptions::default();
        let mut worker = ChemWorker::new(&net, &classes, &opts);

        let mut conc = vec![2.0, 1.0, 3.0];
        worker
            .react_segment(
                &net,
                &classes,
                ElementKind::Tank,
                &mut conc,
                &params.values,
                &SegEnv::default(),
                0.0,
                1.0,
            )
            .unwrap();
        assert_eq!(conc, vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn formula_fault_reports_species() {
        let mut b = NetworkBuilder::new();
        let mut s = Species::bulk("Bad");
        s.pipe_kinetics = Kinetics::Formula(compile("log(Bad)", |_| Some(0)).unwrap());
        b.add_species(s);
        let net = b.build().unwrap();
        let classes = classify(&net);
        let opts = QualityOptions::default();
        let mut worker = ChemWorker::new(&net, &classes, &opts);

        let mut conc = vec![0.0];
        let err = worker
            .react_segment(
                &net,
                &classes,
                ElementKind::Pipe,
                &mut conc,
                &[],
                &SegEnv::default(),
                0.0,
                60.0,
            )
            .unwrap_err();
        match err {
            ChemError::MathFault { op, species, .. } => {
                assert_eq!(op, "log");
                assert_eq!(species, "Bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rate_fault_surfaces_as_integration_error() {
        let mut b = NetworkBuilder::new();
        let mut s = Species::bulk("Bad");
        s.pipe_kinetics = Kinetics::Rate(compile("sqrt(0 - Bad) - 1", |_| Some(0)).unwrap());
        b.add_species(s);
        let net = b.build().unwrap();
        let classes = classify(&net);
        let opts = QualityOptions::default();
        let mut worker = ChemWorker::new(&net, &classes, &opts);

        let mut conc = vec![1.0];
        let err = worker
            .react_segment(
                &net,
                &classes,
                ElementKind::Pipe,
                &mut conc,
                &[],
                &SegEnv::default(),
                0.0,
                60.0,
            )
            .unwrap_err();
        assert!(matches!(err, ChemError::Integration { .. }));
    }
}
