//! Ensemble scatter/gather through an update plan.

use std::collections::BTreeMap;
use std::sync::Arc;

use ensnode_error::EnsError;
use ensnode_node::kinds::gen_kw::GenKw;
use ensnode_node::{EnsembleConfig, Node, NodeRegistry, PayloadVariant};
use ensnode_types::ActiveList;
use ensnode_update::UpdatePlan;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

const DECK: &str = r#"
ensemble_size = 3

[[parameter]]
kind = "gen_kw"
name = "HEAD"
elements = [
    { name = "H0" }, { name = "H1" }, { name = "H2" }, { name = "H3" }, { name = "H4" },
    { name = "H5" }, { name = "H6" }, { name = "H7" }, { name = "H8" }, { name = "H9" },
]

[[parameter]]
kind = "gen_kw"
name = "TAIL"
elements = [{ name = "T0" }, { name = "T1" }, { name = "T2" }, { name = "T3" }]

[[parameter]]
kind = "static_kw"
name = "ACTNUM"
file = "ACTNUM.bin"
"#;

type Member = BTreeMap<String, Node>;

fn members(config: &EnsembleConfig, registry: &NodeRegistry, seed: u64) -> Vec<Member> {
    (0..config.ensemble_size)
        .map(|member| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::try_from(member).expect("member")));
            config
                .parameters()
                .iter()
                .map(|param| {
                    let mut node = Node::alloc(registry, Arc::clone(param)).expect("alloc");
                    if node.kind() == ensnode_types::ImplKind::GenKw {
                        node.sample(&mut rng).expect("sample");
                    }
                    (param.name().to_owned(), node)
                })
                .collect()
        })
        .collect()
}

fn values(member: &Member, parameter: &str) -> Vec<f64> {
    member[parameter]
        .payload_as::<GenKw>()
        .expect("gen_kw")
        .values()
        .to_vec()
}

fn set_values(member: &mut Member, parameter: &str, values: &[f64]) {
    member
        .get_mut(parameter)
        .expect("node")
        .replace_payload(GenKw::new(values.to_vec()).into_payload())
        .expect("payload");
}

// ─── Row accounting ─────────────────────────────────────────────────────

#[test]
fn sparse_tail_lands_after_head_in_member_column() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let mut ensemble = members(&config, &registry, 1);
    set_values(&mut ensemble[2], "TAIL", &[1.0, 2.0, 3.0, 4.0]);

    let mut plan = UpdatePlan::new();
    plan.push_config(config.parameter("HEAD").expect("HEAD"), ActiveList::all())
        .expect("head");
    let tail = plan
        .push_config(
            config.parameter("TAIL").expect("TAIL"),
            ActiveList::from_indices([1, 3]),
        )
        .expect("tail");
    assert_eq!(tail.row_offset(), 10);
    assert_eq!(plan.total_rows(), 12);

    let mut matrix = plan.alloc_matrix(ensemble.len()).expect("matrix");
    plan.scatter(&ensemble, &mut matrix, 2).expect("scatter");
    assert_eq!(matrix.get(10, 2), Some(2.0));
    assert_eq!(matrix.get(11, 2), Some(4.0));
    assert_eq!(&matrix.column(0).expect("column")[..10], values(&ensemble[0], "HEAD").as_slice());

    matrix.set(10, 2, 20.0).expect("set");
    matrix.set(11, 2, 40.0).expect("set");
    plan.gather(&mut ensemble, &matrix, 2).expect("gather");
    assert_eq!(values(&ensemble[2], "TAIL"), vec![1.0, 20.0, 3.0, 40.0]);
}

#[test]
fn gather_without_update_is_identity() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let mut ensemble = members(&config, &registry, 8);
    let before: Vec<Vec<f64>> = ensemble.iter().map(|m| values(m, "HEAD")).collect();

    let mut plan = UpdatePlan::new();
    plan.push("HEAD", ActiveList::from_indices([9, 0, 4]), 10)
        .expect("head");
    let mut matrix = plan.alloc_matrix(ensemble.len()).expect("matrix");
    plan.scatter(&ensemble, &mut matrix, 1).expect("scatter");
    plan.gather(&mut ensemble, &matrix, 1).expect("gather");

    let after: Vec<Vec<f64>> = ensemble.iter().map(|m| values(m, "HEAD")).collect();
    assert_eq!(before, after);
}

// ─── Failure reporting ──────────────────────────────────────────────────

#[test]
fn missing_node_is_reported() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let mut ensemble = members(&config, &registry, 2);
    ensemble[1].remove("TAIL");

    let mut plan = UpdatePlan::new();
    plan.push_config(config.parameter("TAIL").expect("TAIL"), ActiveList::all())
        .expect("tail");
    let mut matrix = plan.alloc_matrix(ensemble.len()).expect("matrix");
    let err = plan.scatter(&ensemble, &mut matrix, 3).unwrap_err();
    assert!(matches!(err, EnsError::InvalidState { .. }));
    assert!(err.to_string().contains("member 1"));
}

#[test]
fn kind_without_matrix_support_is_reported() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let ensemble = members(&config, &registry, 3);

    let mut plan = UpdatePlan::new();
    plan.push_config(config.parameter("ACTNUM").expect("ACTNUM"), ActiveList::all())
        .expect("actnum");
    let mut matrix = plan.alloc_matrix(ensemble.len()).expect("matrix");
    let err = plan.scatter(&ensemble, &mut matrix, 1).unwrap_err();
    assert!(matches!(err, EnsError::UnsupportedOperation { kind: "static_kw", .. }));
}

#[test]
fn wrong_matrix_shape_is_dimension_mismatch() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let ensemble = members(&config, &registry, 4);

    let mut plan = UpdatePlan::new();
    plan.push("HEAD", ActiveList::all(), 10).expect("head");
    let mut matrix = plan.alloc_matrix(ensemble.len() + 1).expect("matrix");
    assert!(matches!(
        plan.scatter(&ensemble, &mut matrix, 1),
        Err(EnsError::DimensionMismatch { .. })
    ));
}

#[test]
fn size_disagreement_with_plan_is_dimension_mismatch() {
    let config = EnsembleConfig::from_toml_str(DECK).expect("config");
    let registry = NodeRegistry::with_builtin_kinds();
    let ensemble = members(&config, &registry, 5);

    let mut plan = UpdatePlan::new();
    plan.push("TAIL", ActiveList::all(), 5).expect("tail");
    let mut matrix = plan.alloc_matrix(ensemble.len()).expect("matrix");
    assert!(matches!(
        plan.scatter(&ensemble, &mut matrix, 1),
        Err(EnsError::DimensionMismatch { .. })
    ));
}

// ─── Parallelism ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn parallel_scatter_matches_sequential(
        seed in any::<u64>(),
        workers in 2usize..6,
        picks in prop::collection::vec(0usize..4, 0..6),
    ) {
        let config = EnsembleConfig::from_toml_str(DECK).expect("config");
        let registry = NodeRegistry::with_builtin_kinds();
        let ensemble = members(&config, &registry, seed);

        let mut plan = UpdatePlan::new();
        plan.push("HEAD", ActiveList::all(), 10).expect("head");
        plan.push("TAIL", ActiveList::from_indices(picks), 4).expect("tail");

        let mut sequential = plan.alloc_matrix(ensemble.len()).expect("matrix");
        plan.scatter(&ensemble, &mut sequential, 1).expect("sequential");
        let mut parallel = plan.alloc_matrix(ensemble.len()).expect("matrix");
        plan.scatter(&ensemble, &mut parallel, workers).expect("parallel");
        prop_assert_eq!(sequential, parallel);
    }

    #[test]
    fn parallel_gather_matches_sequential(
        seed in any::<u64>(),
        workers in 2usize..6,
        picks in prop::collection::vec(0usize..4, 0..6),
        shift in -5.0f64..5.0,
    ) {
        let config = EnsembleConfig::from_toml_str(DECK).expect("config");
        let registry = NodeRegistry::with_builtin_kinds();
        let mut sequential = members(&config, &registry, seed);
        let mut parallel = members(&config, &registry, seed);

        let mut plan = UpdatePlan::new();
        plan.push("HEAD", ActiveList::all(), 10).expect("head");
        plan.push("TAIL", ActiveList::from_indices(picks), 4).expect("tail");

        let mut matrix = plan.alloc_matrix(sequential.len()).expect("matrix");
        plan.scatter(&sequential, &mut matrix, 1).expect("scatter");
        for column in 0..matrix.columns() {
            for row in 0..matrix.rows() {
                let value = matrix.get(row, column).expect("cell");
                let step = f64::from(u32::try_from(row + column).expect("small"));
                matrix.set(row, column, value + shift * step).expect("set");
            }
        }

        plan.gather(&mut sequential, &matrix, 1).expect("sequential");
        plan.gather(&mut parallel, &matrix, workers).expect("parallel");
        for (a, b) in sequential.iter().zip(&parallel) {
            prop_assert_eq!(values(a, "HEAD"), values(b, "HEAD"));
            prop_assert_eq!(values(a, "TAIL"), values(b, "TAIL"));
        }

        let mut check = plan.alloc_matrix(parallel.len()).expect("matrix");
        plan.scatter(&parallel, &mut check, workers).expect("rescatter");
        prop_assert_eq!(check, matrix);
    }
}
