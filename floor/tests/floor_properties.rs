use floorsim_core::{BarrierPolygon, BarrierType, Barriers, OverlapState, Tolerance, Uv};
use floorsim_floor::{CellularFloor, FloorGeometry};

fn l_shaped_floor() -> CellularFloor {
    let outline = BarrierPolygon::closed(vec![
        Uv::new(0.0, 0.0),
        Uv::new(10.0, 0.0),
        Uv::new(10.0, 4.0),
        Uv::new(4.0, 4.0),
        Uv::new(4.0, 10.0),
        Uv::new(0.0, 10.0),
    ]);
    let pillar = BarrierPolygon::rectangle(Uv::new(1.5, 6.0), Uv::new(2.5, 7.0));
    let barriers = Barriers {
        visual: vec![outline.clone()],
        physical: vec![outline.clone(), pillar],
        field: vec![outline],
    };

    CellularFloor::build(0.5, &barriers, Uv::new(1.0, 1.0), Tolerance::DEFAULT)
        .expect("valid L-shaped floor")
}

#[test]
fn every_cell_centre_maps_back_to_its_cell() {
    let floor = l_shaped_floor();
    let geometry = floor.geometry();

    for cell in geometry.cells() {
        let index = geometry.find_index(cell.center()).expect("centre on grid");
        let found = geometry.find_cell(index).expect("cell exists");
        assert_eq!(found.id(), cell.id());
    }
}

#[test]
fn overlap_state_agrees_with_edge_registration() {
    let floor = l_shaped_floor();

    for cell in floor.geometry().cells() {
        for barrier in BarrierType::ALL {
            let state = cell.overlap(barrier);
            assert_eq!(
                state == OverlapState::Overlap,
                !cell.edges(barrier).is_empty(),
                "cell {:?} class {barrier:?}",
                cell.index()
            );
        }
    }
}

#[test]
fn notch_of_the_l_is_outside_the_field_and_pruned() {
    let floor = l_shaped_floor();
    let geometry = floor.geometry();
    let notch = Uv::new(8.0, 8.0);

    assert_eq!(
        geometry.overlap_at(notch, BarrierType::Field),
        Some(OverlapState::Outside)
    );
    assert!(!geometry.is_walkable(notch));
    for barrier in BarrierType::ALL {
        assert_eq!(floor.distance_at(barrier, notch), None);
    }
    assert!(floor.distance_at(BarrierType::Physical, Uv::new(1.0, 1.0)).is_some());
}

#[test]
fn obstacles_and_field_use_opposite_flood_fill_states() {
    let floor = l_shaped_floor();
    let geometry = floor.geometry();
    let walkable = Uv::new(2.0, 2.0);

    assert_eq!(
        geometry.overlap_at(walkable, BarrierType::Field),
        Some(OverlapState::Inside)
    );
    assert_eq!(
        geometry.overlap_at(walkable, BarrierType::Physical),
        Some(OverlapState::Outside)
    );
    assert_eq!(
        geometry.overlap_at(walkable, BarrierType::Visual),
        Some(OverlapState::Outside)
    );
}

#[test]
fn geometry_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FloorGeometry>();
    assert_send_sync::<CellularFloor>();
}
