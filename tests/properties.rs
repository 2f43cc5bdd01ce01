use std::collections::HashSet;

use proptest::prelude::*;

use locsci::extract::{extract_dispersion, extract_facility};
use locsci::format::{load_instance, save_instance};
use locsci::formulation::{Cflp, Formulation, MaxSumDispersion, PDispersion, ProblemFormulation, Uflp};
use locsci::generate::{DispersionRanges, FlpRanges, Group, InstanceGenerator};
use locsci::instance::Instance;
use locsci::resolution::{BranchAndBound, SolveLimits, Solver, Status};
use locsci::Error;

fn tiny_flp() -> FlpRanges {
    FlpRanges { facilities: (2, 4), clients: (6, 6), capacity: Some((2, 4)), fixed_cost: (1.0, 3.0) }
}

fn tiny_dispersion() -> DispersionRanges {
    DispersionRanges { locations: (4, 7), p: (2, 4) }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_capacities_cover_every_client(seed: u128, group in prop::sample::select(Group::ALL.to_vec())) {
        let mut generator = InstanceGenerator::from_seed(Some(seed));
        // draws that cannot be covered are refused, never returned
        match generator.generate_flp_instance("P", group.name(), &group.flp_ranges()) {
            Ok(inst) => prop_assert!(inst.total_capacity().unwrap() >= inst.n_clients() as u64),
            Err(e) => prop_assert!(matches!(e, Error::InstanceGeneration(_))),
        }
    }

    #[test]
    fn generated_distances_are_symmetric(seed: u128, group in prop::sample::select(Group::ALL.to_vec())) {
        let mut generator = InstanceGenerator::from_seed(Some(seed));
        let inst = generator.generate_dispersion_instance("P", group.name(), &group.dispersion_ranges()).unwrap();
        let dist = inst.distances();
        for i in 0..inst.n_locations() {
            prop_assert!(dist.get(i, i).is_none());
            for j in 0..inst.n_locations() {
                prop_assert_eq!(dist.get(i, j), dist.get(j, i));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn solved_facility_location_serves_each_client_once(seed: u128) {
        let mut generator = InstanceGenerator::from_seed(Some(seed));
        let inst = generator.generate_flp_instance("P", "tiny", &tiny_flp()).unwrap();
        let solver = BranchAndBound::default();
        let capacity = inst.capacity().unwrap().to_vec();

        for built in [Uflp.build(&inst).unwrap(), Cflp.build(&inst).unwrap()] {
            let sol = solver.solve(&built.model, &SolveLimits::default()).unwrap();
            prop_assert_eq!(sol.status, Status::Optimal);
            let values = sol.values.clone().unwrap();
            let open: HashSet<usize> = (0..inst.n_facilities())
                .filter(|&i| values[built.vars.open[i].index()] > 0.5)
                .collect();
            for j in 0..inst.n_clients() {
                let serving = open.iter().filter(|&&i| values[built.vars.assign[i][j].index()] > 0.5).count();
                prop_assert_eq!(serving, 1);
            }

            let res = extract_facility(&inst, &built, &sol).unwrap();
            let m = res.metrics().unwrap();
            prop_assert!((m.total_cost - res.objective().unwrap()).abs() < 1e-6);
            if built.kind == Formulation::Cflp {
                for &i in &open {
                    prop_assert!(m.load[i] <= capacity[i] as usize);
                }
            }
        }
    }

    #[test]
    fn solved_dispersion_matches_recomputed_distances(seed: u128) {
        let mut generator = InstanceGenerator::from_seed(Some(seed));
        let inst = match generator.generate_dispersion_instance("P", "tiny", &tiny_dispersion()) {
            Ok(inst) => inst,
            Err(_) => return Ok(()),
        };
        let solver = BranchAndBound::default();

        let built = MaxSumDispersion.build(&inst).unwrap();
        let sol = solver.solve(&built.model, &SolveLimits::default()).unwrap();
        let res = extract_dispersion(&inst, &built, &sol).unwrap();
        prop_assert_eq!(res.selected().unwrap().len(), inst.p());
        prop_assert!((res.metrics().unwrap().sum_distance - res.objective().unwrap()).abs() < 1e-6);

        let built = PDispersion.build(&inst).unwrap();
        let sol = solver.solve(&built.model, &SolveLimits::default()).unwrap();
        let res = extract_dispersion(&inst, &built, &sol).unwrap();
        prop_assert_eq!(res.selected().unwrap().len(), inst.p());
        let true_min = res.metrics().unwrap().pairs.unwrap().min;
        prop_assert!((true_min - res.objective().unwrap()).abs() < 1e-6);
    }

    #[test]
    fn instances_survive_a_round_trip(seed: u128, flp: bool) {
        let mut generator = InstanceGenerator::from_seed(Some(seed));
        let inst = if flp {
            Instance::Flp(generator.generate_flp_instance("RT", "tiny", &tiny_flp()).unwrap())
        } else {
            Instance::Dispersion(
                generator.generate_dispersion_instance("RT", "Small", &Group::Small.dispersion_ranges()).unwrap(),
            )
        };
        let path = std::env::temp_dir().join(format!("locsci_round_trip_{seed:x}_{flp}.json"));
        save_instance(&inst, &path).unwrap();
        let back = load_instance(&path).unwrap();
        std::fs::remove_file(&path).ok();

        match (inst, back) {
            (Instance::Flp(a), Instance::Flp(b)) => {
                prop_assert_eq!(a.id(), b.id());
                prop_assert_eq!(a.n_facilities(), b.n_facilities());
                prop_assert_eq!(a.n_clients(), b.n_clients());
                prop_assert_eq!(a.capacity(), b.capacity());
                for (ra, rb) in a.cost_rows().iter().zip(b.cost_rows()) {
                    for (x, y) in ra.iter().zip(rb) {
                        prop_assert!((x - y).abs() < 1e-12);
                    }
                }
                for (x, y) in a.fixed_cost().iter().zip(b.fixed_cost()) {
                    prop_assert!((x - y).abs() < 1e-12);
                }
            }
            (Instance::Dispersion(a), Instance::Dispersion(b)) => {
                prop_assert_eq!(a.p(), b.p());
                prop_assert_eq!(a.n_locations(), b.n_locations());
                for ((_, _, x), (_, _, y)) in a.distances().pairs().zip(b.distances().pairs()) {
                    prop_assert!((x - y).abs() < 1e-12);
                }
            }
            _ => prop_assert!(false, "family changed on reload"),
        }
    }
}
