use std::path::Path;

use wing_domain::{check_prerequisites, validate, BoundaryLayerMode, ConfigurationError, SolverKind, Stage,
                  StageSelection, SweepGrid, WorkspaceLayout};

#[test]
fn every_sweep_point_gets_its_own_workspace() {
    let grid = SweepGrid::new(vec![-15.0, 0.0, 15.0], vec![0.0]).unwrap();
    let roots: Vec<_> = grid.points()
                            .map(|p| WorkspaceLayout::for_point(Path::new("out"), &p).root().to_path_buf())
                            .collect();
    assert_eq!(roots.len(), 3);
    let mut unique = roots.clone();
    unique.dedup();
    assert_eq!(unique, roots);
    assert_eq!(roots[0], Path::new("out/winglet_c-15_s0"));
}

#[test]
fn euler_full_selection_is_valid_and_ready() {
    let sel = StageSelection::full(SolverKind::Inviscid);
    assert_eq!(sel.mesh_mode, BoundaryLayerMode::WithoutPrism);
    assert!(validate(&sel).is_ok());
    // with all producers enabled nothing needs to exist on disk
    assert!(check_prerequisites(&sel, &WorkspaceLayout::new("/nowhere"), |_| false).is_ok());
}

#[test]
fn rans_on_a_prism_free_mesh_fails_before_anything_runs() {
    let sel = StageSelection { mesh_mode: BoundaryLayerMode::WithoutPrism,
                               ..StageSelection::full(SolverKind::Viscous) };
    match validate(&sel) {
        Err(ConfigurationError::SolverMeshMismatch { stage, solver, mode }) => {
            assert_eq!(stage, Stage::FlowSolve);
            assert_eq!(solver, SolverKind::Viscous);
            assert_eq!(mode, BoundaryLayerMode::WithoutPrism);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stage_ids_parse_back() {
    for stage in Stage::ALL {
        assert_eq!(stage.id().parse::<Stage>().unwrap(), stage);
    }
}
