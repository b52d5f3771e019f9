use std::process::ExitCode;

use ddm_solver::{
    BiCgStab, BiCgStabConfig, IetiSystem, LaplaceChain1d, NativeBackend, ScaledDirichletBuilder,
    SolveDiagnostics, restrict_to_skeleton,
};
use nalgebra::DVector;

fn usage() {
    eprintln!("usage:");
    eprintln!("  ddm-solver refine [options]");
    eprintln!("  ddm-solver solve [options]");
    eprintln!();
    eprintln!("options:");
    eprintln!("  --subdomains <N>     number of subdomains (default 2)");
    eprintln!("  --elements <n>       elements per subdomain (default 4)");
    eprintln!("  --levels <L>         refinement levels, factor 2 each (default 4)");
    eprintln!("  --reaction <c>       reaction coefficient (default 0, needs > 0 for N > 2)");
    eprintln!("  --scaling <kind>     multiplicity | deluxe (default multiplicity)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scaling {
    Multiplicity,
    Deluxe,
}

#[derive(Debug, Clone)]
struct Options {
    subdomains: usize,
    elements: usize,
    levels: usize,
    reaction: f64,
    scaling: Scaling,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            subdomains: 2,
            elements: 4,
            levels: 4,
            reaction: 0.0,
            scaling: Scaling::Multiplicity,
        }
    }
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag.as_str() {
            "--subdomains" => opts.subdomains = parse_value(flag, value)?,
            "--elements" => opts.elements = parse_value(flag, value)?,
            "--levels" => opts.levels = parse_value(flag, value)?,
            "--reaction" => opts.reaction = parse_value(flag, value)?,
            "--scaling" => {
                opts.scaling = match value.to_lowercase().as_str() {
                    "multiplicity" => Scaling::Multiplicity,
                    "deluxe" => Scaling::Deluxe,
                    other => return Err(format!("unknown scaling '{other}'")),
                }
            }
            other => return Err(format!("unknown option '{other}'")),
        }
    }
    Ok(opts)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid value '{value}' for {flag}"))
}

struct StudyRow {
    elements: usize,
    multipliers: usize,
    diagnostics: SolveDiagnostics,
    max_error: f64,
}

/// Solve the decomposed problem and compare with the undecomposed one.
fn solve_chain(problem: &LaplaceChain1d, scaling: Scaling) -> Result<StudyRow, String> {
    let backend = NativeBackend::default();
    let locals = problem.local_problems().map_err(|e| e.to_string())?;

    let mut system = IetiSystem::new();
    let mut builder = ScaledDirichletBuilder::new();
    system.reserve(locals.len());
    builder.reserve(locals.len());
    for local in &locals {
        builder
            .add_local_skeleton(
                restrict_to_skeleton(&local.jump, &local.stiffness, &backend)
                    .map_err(|e| e.to_string())?,
            )
            .map_err(|e| e.to_string())?;
        system
            .add_subdomain(
                local.jump.clone(),
                &local.stiffness,
                local.rhs.clone(),
                &backend,
            )
            .map_err(|e| e.to_string())?;
    }
    let scaled = match scaling {
        Scaling::Multiplicity => builder.setup_multiplicity_scaling(),
        Scaling::Deluxe => builder.setup_deluxe_scaling(&problem.interfaces()),
    };
    scaled.map_err(|e| e.to_string())?;

    let precond = builder
        .preconditioner()
        .map_err(|e| e.to_string())?
        .into_operator();
    let matrix = system.schur_complement().map_err(|e| e.to_string())?;
    let rhs = system
        .rhs_for_schur_complement()
        .map_err(|e| e.to_string())?;

    let solver =
        BiCgStab::new(matrix, precond, BiCgStabConfig::default()).map_err(|e| e.to_string())?;
    let (lambda, diagnostics) = solver.solve(&rhs).map_err(|e| e.to_string())?;
    let solution = system
        .construct_solution_from_lagrange_multipliers(&lambda)
        .map_err(|e| e.to_string())?;

    let reference = reference_solution(problem)?;
    let n_el = problem.elements_per_subdomain;
    let mut max_error: f64 = 0.0;
    for (k, u) in solution.iter().enumerate() {
        for (i, value) in u.iter().enumerate() {
            max_error = max_error.max((value - reference[k * n_el + i]).abs());
        }
    }

    Ok(StudyRow {
        elements: n_el,
        multipliers: lambda.len(),
        diagnostics,
        max_error,
    })
}

fn reference_solution(problem: &LaplaceChain1d) -> Result<DVector<f64>, String> {
    use ddm_solver::Factorization;

    let global = problem.global_problem().map_err(|e| e.to_string())?;
    let inverse = NativeBackend::default()
        .factorize(&global.stiffness)
        .map_err(|e| e.to_string())?;
    Ok(inverse.apply(&global.rhs))
}

fn base_problem(opts: &Options) -> LaplaceChain1d {
    let n = opts.subdomains;
    let mut problem = LaplaceChain1d::new(n, opts.elements)
        .with_reaction(opts.reaction)
        .with_source(1.0);
    let length = problem.subdomain_length;
    for k in 1..n {
        problem = problem.with_point_load(k as f64 * length, 1.0);
    }
    problem
}

fn print_row(row: &StudyRow) {
    println!(
        "{:>10} {:>6} {:>6} {:>10} {:>12.3e} {:>12.3e}",
        row.elements,
        row.multipliers,
        row.diagnostics.iterations,
        format!("{:?}", row.diagnostics.status),
        row.diagnostics.relative_residual,
        row.max_error
    );
}

fn print_header(opts: &Options) {
    println!(
        "subdomains: {}  reaction: {}  scaling: {:?}",
        opts.subdomains, opts.reaction, opts.scaling
    );
    println!(
        "{:>10} {:>6} {:>6} {:>10} {:>12} {:>12}",
        "elements", "mult", "iters", "status", "residual", "max_error"
    );
}

fn run_study(opts: &Options, levels: usize) -> Result<(), String> {
    print_header(opts);
    let base = base_problem(opts);
    for level in 0..levels {
        let problem = base.refined(1 << level);
        let row = solve_chain(&problem, opts.scaling)?;
        print_row(&row);
        if !row.diagnostics.converged {
            return Err(format!(
                "no convergence at {} elements per subdomain",
                row.elements
            ));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("refine") => parse_options(&args[2..]).and_then(|opts| {
            let levels = opts.levels.max(1);
            run_study(&opts, levels)
        }),
        Some("solve") => parse_options(&args[2..]).and_then(|opts| run_study(&opts, 1)),
        _ => {
            usage();
            return ExitCode::from(2);
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ddm_error: {err}");
            ExitCode::from(1)
        }
    }
}
