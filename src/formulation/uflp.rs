use super::{add_open_vars, Formulation, OpenVars, ProblemFormulation};
use crate::instance::FlpInstance;
use crate::model::{Cmp, LinearExpr, Model, Sense, VarId};

#[derive(Debug, Clone)]
pub struct FacilityVars {
    /// `open[i]`
    pub open: Vec<VarId>,
    /// `assign[i][j]`: client `j` is served by facility `i`.
    pub assign: Vec<Vec<VarId>>,
}

impl OpenVars for FacilityVars {
    fn open(&self) -> &[VarId] {
        &self.open
    }
}

/// Uncapacitated facility location.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uflp;

impl ProblemFormulation for Uflp {
    type Instance = FlpInstance;
    type Vars = FacilityVars;

    fn kind(&self) -> Formulation {
        Formulation::Uflp
    }

    fn sense(&self) -> Sense {
        Sense::Minimize
    }

    fn build_variables(&self, instance: &FlpInstance, model: &mut Model) -> FacilityVars {
        let open = add_open_vars(model, instance.n_facilities());
        let assign = (0..instance.n_facilities())
            .map(|i| (0..instance.n_clients()).map(|j| model.add_binary(format!("assign_{i}_{j}"))).collect())
            .collect();
        FacilityVars { open, assign }
    }

    fn build_constraints(&self, instance: &FlpInstance, vars: &FacilityVars, model: &mut Model) {
        for j in 0..instance.n_clients() {
            let lhs = vars.assign.iter().map(|row| (row[j], 1.0)).collect();
            model.add_constraint(format!("serve_{j}"), lhs, Cmp::Eq, 1.0);
        }
        for (i, row) in vars.assign.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                let lhs = LinearExpr::new().with(x, 1.0).with(vars.open[i], -1.0);
                model.add_constraint(format!("open_assign_{i}_{j}"), lhs, Cmp::Le, 0.0);
            }
        }
    }

    fn build_objective(&self, instance: &FlpInstance, vars: &FacilityVars) -> LinearExpr {
        let fixed = vars.open.iter().zip(instance.fixed_cost()).map(|(&y, &f)| (y, f));
        let service = vars.assign.iter().zip(instance.cost_rows()).flat_map(|(row, costs)| {
            row.iter().zip(costs).map(|(&x, &c)| (x, c))
        });
        fixed.chain(service).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> FlpInstance {
        FlpInstance::new(
            "U",
            "test",
            vec![(0.0, 0.0), (1.0, 0.0)],
            vec![(0.1, 0.0), (0.9, 0.0), (0.5, 0.0)],
            vec![vec![0.1, 0.9, 0.5], vec![0.9, 0.1, 0.5]],
            vec![2.0, 3.0],
            None,
        )
        .unwrap()
    }

    #[test]
    fn shape() {
        let built = Uflp.build(&instance()).unwrap();
        let m = &built.model;
        assert_eq!(m.variables().len(), 2 + 2 * 3);
        // one serve row per client, one linking row per pair
        assert_eq!(m.constraints().len(), 3 + 6);
        assert_eq!(m.sense(), Sense::Minimize);
        let serve = m.constraint("serve_2").unwrap();
        assert_eq!(serve.cmp, Cmp::Eq);
        assert_eq!(serve.lhs.terms(), &[(built.vars.assign[0][2], 1.0), (built.vars.assign[1][2], 1.0)]);
        let link = m.constraint("open_assign_1_0").unwrap();
        assert_eq!(link.lhs.terms(), &[(built.vars.assign[1][0], 1.0), (built.vars.open[1], -1.0)]);
    }

    #[test]
    fn objective_prices_plan() {
        let built = Uflp.build(&instance()).unwrap();
        let mut values = vec![0.0; built.model.variables().len()];
        values[built.vars.open[0].index()] = 1.0;
        for j in 0..3 {
            values[built.vars.assign[0][j].index()] = 1.0;
        }
        assert!(built.model.violations(&values, 1e-9).is_empty());
        assert!((built.model.objective_value(&values) - (2.0 + 1.5)).abs() < 1e-12);

        // serving from a closed facility is caught
        values[built.vars.assign[0][1].index()] = 0.0;
        values[built.vars.assign[1][1].index()] = 1.0;
        assert_eq!(built.model.violations(&values, 1e-9), vec!["open_assign_1_1".to_string()]);
    }
}
