//! One-dimensional model problem decomposed into a chain of subdomains.
//!
//! Solves `−u'' + c·u = f` on `[0, N·L]` with `u = 0` at both ends, using
//! `n` linear elements on each of the `N` subdomains `[k·L, (k+1)·L]`.
//! Neighbouring subdomains share their end node; one Lagrange multiplier per
//! shared node enforces `u_k(end) − u_{k+1}(start) = 0`.
//!
//! Dirichlet nodes are kept as dofs with an identity row and column, so every
//! subdomain has `n + 1` local dofs. For `c = 0` only the two outer subdomains
//! touch the Dirichlet boundary; chains of three or more subdomains then
//! contain floating subdomains whose local matrices are singular.
//!
//! The problem also assembles the undecomposed global system, which serves as
//! reference in tests and in the demo binary.

use crate::error::{DdmError, Result};
use crate::scaled_dirichlet::BoundaryInterface;
use crate::sparse::csr_from_triplets;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

/// Concentrated load at a node position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLoad {
    pub position: f64,
    pub magnitude: f64,
}

/// Decomposed 1-D reaction-diffusion problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaplaceChain1d {
    /// Number of subdomains N
    pub subdomains: usize,
    /// Linear elements per subdomain n
    pub elements_per_subdomain: usize,
    /// Length L of every subdomain
    pub subdomain_length: f64,
    /// Reaction coefficient c
    pub reaction: f64,
    /// Constant source f
    pub source: f64,
    /// Concentrated loads, applied at the node at `position`
    pub point_loads: Vec<PointLoad>,
}

/// Data of one subdomain as produced by the assembler.
#[derive(Debug, Clone)]
pub struct LocalProblem1d {
    pub stiffness: CsrMatrix<f64>,
    pub jump: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
    pub coordinates: Vec<f64>,
}

/// Undecomposed system on all nodes.
#[derive(Debug, Clone)]
pub struct GlobalProblem1d {
    pub stiffness: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
    pub coordinates: Vec<f64>,
}

impl LaplaceChain1d {
    /// Pure diffusion, unit subdomain length, no loads.
    pub fn new(subdomains: usize, elements_per_subdomain: usize) -> Self {
        Self {
            subdomains,
            elements_per_subdomain,
            subdomain_length: 1.0,
            reaction: 0.0,
            source: 0.0,
            point_loads: Vec::new(),
        }
    }

    pub fn with_reaction(mut self, reaction: f64) -> Self {
        self.reaction = reaction;
        self
    }

    pub fn with_source(mut self, source: f64) -> Self {
        self.source = source;
        self
    }

    pub fn with_point_load(mut self, position: f64, magnitude: f64) -> Self {
        self.point_loads.push(PointLoad {
            position,
            magnitude,
        });
        self
    }

    /// Same problem with every element split into `factor` elements.
    pub fn refined(&self, factor: usize) -> Self {
        Self {
            elements_per_subdomain: self.elements_per_subdomain * factor,
            ..self.clone()
        }
    }

    pub fn n_lagrange_multipliers(&self) -> usize {
        self.subdomains.saturating_sub(1)
    }

    pub fn element_size(&self) -> f64 {
        self.subdomain_length / self.elements_per_subdomain as f64
    }

    /// Interfaces between consecutive subdomains.
    pub fn interfaces(&self) -> Vec<BoundaryInterface> {
        (0..self.n_lagrange_multipliers())
            .map(|k| BoundaryInterface::new(k, k + 1))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.subdomains == 0 || self.elements_per_subdomain == 0 {
            return Err(DdmError::InvalidConfiguration(format!(
                "need at least one subdomain and one element, got {} x {}",
                self.subdomains, self.elements_per_subdomain
            )));
        }
        if !(self.subdomain_length > 0.0) || self.reaction < 0.0 {
            return Err(DdmError::InvalidConfiguration(format!(
                "subdomain length must be positive and reaction non-negative, got {} and {}",
                self.subdomain_length, self.reaction
            )));
        }
        Ok(())
    }

    /// Global node index closest to `position`, if a node sits there.
    fn node_at(&self, position: f64) -> Option<usize> {
        let h = self.element_size();
        let idx = (position / h).round();
        let n_nodes = self.subdomains * self.elements_per_subdomain + 1;
        if idx < 0.0 || idx as usize >= n_nodes {
            return None;
        }
        ((position - idx * h).abs() <= 1e-9 * h).then_some(idx as usize)
    }

    fn point_load_nodes(&self) -> Result<Vec<(usize, f64)>> {
        self.point_loads
            .iter()
            .map(|load| {
                self.node_at(load.position)
                    .map(|node| (node, load.magnitude))
                    .ok_or_else(|| {
                        DdmError::InvalidConfiguration(format!(
                            "point load at {} does not coincide with a node",
                            load.position
                        ))
                    })
            })
            .collect()
    }

    /// Assemble `n_elements` consecutive elements and their load vector.
    /// `dirichlet` lists local nodes with u = 0.
    fn assemble_segment(
        &self,
        n_elements: usize,
        dirichlet: &[usize],
    ) -> Result<(CsrMatrix<f64>, DVector<f64>)> {
        let h = self.element_size();
        let n = n_elements + 1;
        let k_diag = 1.0 / h + self.reaction * h / 2.0;
        let k_off = -1.0 / h;

        let mut rows = Vec::with_capacity(4 * n_elements);
        let mut cols = Vec::with_capacity(4 * n_elements);
        let mut values = Vec::with_capacity(4 * n_elements);
        let mut rhs = DVector::zeros(n);

        for e in 0..n_elements {
            for (i, j, v) in [
                (e, e, k_diag),
                (e, e + 1, k_off),
                (e + 1, e, k_off),
                (e + 1, e + 1, k_diag),
            ] {
                if dirichlet.contains(&i) || dirichlet.contains(&j) {
                    continue;
                }
                rows.push(i);
                cols.push(j);
                values.push(v);
            }
            rhs[e] += self.source * h / 2.0;
            rhs[e + 1] += self.source * h / 2.0;
        }
        for &d in dirichlet {
            rows.push(d);
            cols.push(d);
            values.push(1.0);
        }

        let stiffness = csr_from_triplets(n, n, rows, cols, values)?;
        Ok((stiffness, rhs))
    }

    /// Per-subdomain stiffness matrices, jump matrices and loads.
    pub fn local_problems(&self) -> Result<Vec<LocalProblem1d>> {
        self.validate()?;
        let n_el = self.elements_per_subdomain;
        let n_sub = self.subdomains;
        let n_mult = self.n_lagrange_multipliers();
        let h = self.element_size();
        let loads = self.point_load_nodes()?;

        let mut result = Vec::with_capacity(n_sub);
        for k in 0..n_sub {
            let mut dirichlet = Vec::new();
            if k == 0 {
                dirichlet.push(0);
            }
            if k + 1 == n_sub {
                dirichlet.push(n_el);
            }
            let (stiffness, mut rhs) = self.assemble_segment(n_el, &dirichlet)?;

            // Loads on a shared node are split between both subdomains.
            let first_node = k * n_el;
            for &(node, magnitude) in &loads {
                if node < first_node || node > first_node + n_el {
                    continue;
                }
                let local = node - first_node;
                let shared = (local == 0 && k > 0) || (local == n_el && k + 1 < n_sub);
                rhs[local] += if shared { magnitude / 2.0 } else { magnitude };
            }
            for &d in &dirichlet {
                rhs[d] = 0.0;
            }

            let mut jump_rows = Vec::new();
            let mut jump_cols = Vec::new();
            let mut jump_vals = Vec::new();
            if k > 0 {
                jump_rows.push(k - 1);
                jump_cols.push(0);
                jump_vals.push(-1.0);
            }
            if k + 1 < n_sub {
                jump_rows.push(k);
                jump_cols.push(n_el);
                jump_vals.push(1.0);
            }
            let jump = csr_from_triplets(n_mult, n_el + 1, jump_rows, jump_cols, jump_vals)?;

            let x0 = k as f64 * self.subdomain_length;
            let coordinates = (0..=n_el).map(|i| x0 + i as f64 * h).collect();

            result.push(LocalProblem1d {
                stiffness,
                jump,
                rhs,
                coordinates,
            });
        }
        Ok(result)
    }

    /// The undecomposed system on `N·n + 1` nodes.
    pub fn global_problem(&self) -> Result<GlobalProblem1d> {
        self.validate()?;
        let n_elements = self.subdomains * self.elements_per_subdomain;
        let dirichlet = [0, n_elements];
        let (stiffness, mut rhs) = self.assemble_segment(n_elements, &dirichlet)?;
        for (node, magnitude) in self.point_load_nodes()? {
            rhs[node] += magnitude;
        }
        for &d in &dirichlet {
            rhs[d] = 0.0;
        }
        let h = self.element_size();
        let coordinates = (0..=n_elements).map(|i| i as f64 * h).collect();
        Ok(GlobalProblem1d {
            stiffness,
            rhs,
            coordinates,
        })
    }
}
