//! Translation of instances into mixed-integer models.
//!
//! Every formulation goes through the same steps (precondition check,
//! variables, constraints, objective) and hands back the model together with
//! the handles of the variables it declared, so that a solution can later be
//! read back without looking variables up by name.

use clap::ValueEnum;

use crate::error::Result;
use crate::model::{Cmp, LinearExpr, Model, Sense, VarId};

mod cflp;
mod maxsum;
mod pdispersion;
mod uflp;

pub use cflp::Cflp;
pub use maxsum::{MaxSumDispersion, MaxSumVars};
pub use pdispersion::{PDispersion, PDispersionVars};
pub use uflp::{FacilityVars, Uflp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Formulation {
    Uflp,
    Cflp,
    #[value(name = "maxsum")]
    MaxSum,
    #[value(name = "pdisp")]
    PDispersion,
}

impl Formulation {
    /// Short tag used in result rows.
    pub fn tag(self) -> &'static str {
        match self {
            Formulation::Uflp => "UFLP",
            Formulation::Cflp => "CFLP",
            Formulation::MaxSum => "MaxS",
            Formulation::PDispersion => "Pdisp",
        }
    }
}

/// A model paired with the handles of its variables.
#[derive(Debug, Clone)]
pub struct Built<V> {
    pub kind: Formulation,
    pub model: Model,
    pub vars: V,
}

/// Variable sets that contain one `open` indicator per location.
pub trait OpenVars {
    fn open(&self) -> &[VarId];
}

pub trait ProblemFormulation {
    type Instance;
    type Vars;

    fn kind(&self) -> Formulation;

    fn sense(&self) -> Sense;

    /// Rejects instances the formulation cannot be built for.
    fn check(&self, _instance: &Self::Instance) -> Result<()> {
        Ok(())
    }

    fn build_variables(&self, instance: &Self::Instance, model: &mut Model) -> Self::Vars;

    fn build_constraints(&self, instance: &Self::Instance, vars: &Self::Vars, model: &mut Model);

    fn build_objective(&self, instance: &Self::Instance, vars: &Self::Vars) -> LinearExpr;

    fn build(&self, instance: &Self::Instance) -> Result<Built<Self::Vars>> {
        self.check(instance)?;
        let kind = self.kind();
        let mut model = Model::new(kind.tag());
        let vars = self.build_variables(instance, &mut model);
        self.build_constraints(instance, &vars, &mut model);
        let objective = self.build_objective(instance, &vars);
        model.set_objective(self.sense(), objective);
        Ok(Built { kind, model, vars })
    }
}

pub(crate) fn add_open_vars(model: &mut Model, n: usize) -> Vec<VarId> {
    (0..n).map(|i| model.add_binary(format!("open_{i}"))).collect()
}

/// `sum_i open[i] = p`
pub(crate) fn select_exactly(model: &mut Model, open: &[VarId], p: usize) {
    let lhs = open.iter().map(|&v| (v, 1.0)).collect();
    model.add_constraint("select_p", lhs, Cmp::Eq, p as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_result_tables() {
        let tags: Vec<_> = Formulation::value_variants().iter().map(|f| f.tag()).collect();
        assert_eq!(tags, ["UFLP", "CFLP", "MaxS", "Pdisp"]);
    }
}
