//! End-to-end runs of the Metropolis driver: growth, the volume snap,
//! trajectory determinism, checkpointing, and the sphere cap rules under
//! real dynamics.

use cdt2d::prelude::*;
use tempfile::tempdir;

fn simulation(slices: u32, sphere: bool, target: u32, seed: u64, file_id: &str) -> Simulation {
    let universe = Universe::new(slices, sphere, target);
    Simulation::new(universe, 2.0_f64.ln(), target, seed, file_id)
}

#[test]
fn grow_then_snap_reaches_the_exact_target() {
    let mut sim = simulation(8, false, 100, 1, "grow");
    sim.grow();
    assert!(sim.universe().triangle_count() >= 100);
    sim.sweep().unwrap();
    assert_eq!(sim.universe().triangle_count(), 100);
    sim.universe().check();
}

#[test]
fn identically_seeded_runs_write_identical_volume_profiles() {
    let mut outputs = Vec::new();
    for _ in 0..2 {
        let dir = tempdir().unwrap();
        let mut sim = simulation(8, false, 100, 1, "determinism");
        sim.set_directories(dir.path().join("out"), dir.path().join("geom"));
        sim.add_observable(Box::new(VolumeProfile));
        sim.run(3).unwrap();

        let path = dir.path().join("out").join("volume_profile-determinism.dat");
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        for line in contents.lines() {
            let total: u32 = line
                .split_whitespace()
                .map(|n| n.parse::<u32>().unwrap())
                .sum();
            // N2 == 2 * N0 on the torus, and each sweep ends snapped to
            // the target volume.
            assert_eq!(total, 50);
        }
        outputs.push(contents);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn observable_files_are_cleared_at_run_start() {
    let dir = tempdir().unwrap();
    for _ in 0..2 {
        let mut sim = simulation(4, false, 32, 2, "clear");
        sim.set_directories(dir.path().join("out"), dir.path().join("geom"));
        sim.add_observable(Box::new(VolumeProfile));
        sim.run(2).unwrap();
    }
    let contents =
        std::fs::read_to_string(dir.path().join("out").join("volume_profile-clear.dat")).unwrap();
    // Two lines from the second run only; the first run's lines were
    // truncated away, not appended to.
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn run_writes_a_checkpoint_that_imports_cleanly() {
    let dir = tempdir().unwrap();
    let mut sim = simulation(8, false, 100, 4, "checkpoint");
    sim.set_directories(dir.path().join("out"), dir.path().join("geom"));
    sim.run(1).unwrap();

    let path = sim.checkpoint_path();
    assert!(path.exists(), "run must leave a checkpoint behind");

    let imported = Universe::import_geometry(&path, false, 100).unwrap();
    // The final checkpoint was written at the snapped volume.
    assert_eq!(imported.triangle_count(), 100);
    assert_eq!(imported.slice_sizes(), sim.universe().slice_sizes());
    assert_eq!(
        imported.vertices_four().len(),
        sim.universe().vertices_four().len()
    );
    assert_eq!(
        imported.triangles_flip().len(),
        sim.universe().triangles_flip().len()
    );
    imported.check();
}

#[test]
fn hausdorff_series_appends_one_line_per_sweep() {
    let dir = tempdir().unwrap();
    let mut sim = simulation(8, false, 64, 6, "hausdorff");
    sim.set_directories(dir.path().join("out"), dir.path().join("geom"));
    sim.add_observable(Box::new(Hausdorff));
    sim.add_observable(Box::new(HausdorffDual));
    sim.add_observable(Box::new(Ricci::new(vec![1, 2])));
    sim.add_observable(Box::new(RicciDual::new(vec![1, 2])));
    sim.add_observable(Box::new(RicciV::new(vec![1, 2])));
    sim.run(2).unwrap();

    for name in ["hausdorff", "hausdorff_dual", "ricci", "ricci_dual", "ricciv"] {
        let path = dir.path().join("out").join(format!("{name}-hausdorff.dat"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2, "{name} line count");
    }
}

#[test]
fn sphere_caps_hold_through_thermalization_and_measurements() {
    let dir = tempdir().unwrap();
    let mut sim = simulation(6, true, 40, 5, "sphere");
    sim.set_directories(dir.path().join("out"), dir.path().join("geom"));
    sim.grow();
    sim.thermalize();
    assert_eq!(sim.universe().slice_sizes()[0], 3);
    assert_eq!(sim.universe().slice_sizes()[5], 3);

    for _ in 0..50 {
        sim.sweep().unwrap();
        assert_eq!(sim.universe().triangle_count(), 40);
        let sizes = sim.universe().slice_sizes();
        assert_eq!(sizes[0], 3);
        assert_eq!(sizes[5], 3);
    }
    sim.universe().check();
}

#[test]
fn rejected_moves_are_counted_not_errors() {
    let mut sim = simulation(4, false, 32, 8, "counts");
    let mut attempts = 0u64;
    for _ in 0..5000 {
        attempts += 1;
        sim.attempt_move();
    }
    let counts = sim.move_counts();
    assert_eq!(counts.iter().sum::<u64>(), attempts);
    assert!(counts[0] > 0, "some rejections are inevitable");
    assert!(counts[1] > 0, "adds should occur while growing");
}
