use std::thread;

use super::CollectingSink;
use super::SphManager;
use crate::communication::build_local_comms;
use crate::constants::DOMAIN_DIMENSION;
use crate::constants::R_MAX;
use crate::constants::SOURCE_SIZE;
use crate::grid::CellId;
use crate::parameters::SimulationParameters;
use crate::particle::Particle;
use crate::particle::ParticleKind;
use crate::vector::Vector3;

fn test_parameters() -> SimulationParameters {
    SimulationParameters {
        timesteps: 1,
        timestep_duration: 0.03,
        max_velocity: 1.0e9,
        sink_height: -1.0e9,
        sources: vec![],
        fluid_blocks: vec![],
    }
}

fn manager(parameters: SimulationParameters, comms: crate::communication::SimulatorComms) -> SphManager {
    let (sink, _) = CollectingSink::new();
    SphManager::new(&parameters, comms, Box::new(sink))
}

#[test]
fn migration_moves_particles_to_the_owner_of_their_new_cell() {
    let threads: Vec<_> = build_local_comms(2)
        .into_iter()
        .map(|comms| {
            thread::spawn(move || {
                let rank = comms.rank();
                let mut manager = manager(test_parameters(), comms);
                if rank == 0 {
                    // One particle moving fast enough to cross into the next
                    // cell within a single step, and one staged particle that
                    // already belongs to the other rank.
                    manager.add_particles([
                        Particle::fluid_with_velocity(
                            Vector3::new(DOMAIN_DIMENSION * 0.9, 1.0, 1.0),
                            Vector3::new(DOMAIN_DIMENSION * 0.5 / 0.03, 0.0, 0.0),
                        ),
                        Particle::fluid(Vector3::new(DOMAIN_DIMENSION + 0.5, 1.0, 1.0)),
                    ]);
                }
                manager.exchange_particles();
                assert!(manager.owns_all_its_particles());
                manager.exchange_rim(ParticleKind::Fluid);
                manager.update();
                manager.exchange_particles();
                assert!(manager.owns_all_its_particles());
                manager.fluid_particle_count()
            })
        })
        .collect();
    let counts: Vec<usize> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    // The fast particle migrated from rank 0 to rank 1 and joined the staged
    // one; nothing was lost.
    assert_eq!(counts.iter().sum::<usize>(), 2);
    assert_eq!(counts[0], 0);
    assert_eq!(counts[1], 2);
}

#[test]
fn rim_exchange_makes_remote_neighbours_visible() {
    let local_cell = CellId::pack(0, 0, 0);
    let remote_cell = CellId::pack(1, 0, 0);
    assert_eq!(local_cell.owner(2), 0);
    assert_eq!(remote_cell.owner(2), 1);
    let near_boundary = Vector3::new(DOMAIN_DIMENSION - 0.1, 1.0, 1.0);
    let across_boundary = Vector3::new(DOMAIN_DIMENSION + 0.1, 1.0, 1.0);
    assert!((near_boundary - across_boundary).length() <= 0.5 * R_MAX);

    let threads: Vec<_> = build_local_comms(2)
        .into_iter()
        .map(|comms| {
            thread::spawn(move || {
                let rank = comms.rank();
                let mut manager = manager(test_parameters(), comms);
                if rank == 0 {
                    manager.add_particles([Particle::fluid(near_boundary)]);
                } else {
                    manager.add_particles([Particle::fluid(across_boundary)]);
                }
                manager.exchange_particles();
                manager.exchange_rim(ParticleKind::Fluid);
                let (own_cell, other_cell, other_position) = if rank == 0 {
                    (local_cell, remote_cell, across_boundary)
                } else {
                    (remote_cell, local_cell, near_boundary)
                };
                let domain = manager.domain(own_cell).expect("domain must exist");
                let rim = domain.rim_of_kind(other_cell, ParticleKind::Fluid);
                rim.len() == 1 && rim[0].position == other_position
            })
        })
        .collect();
    for thread in threads {
        assert!(thread.join().unwrap());
    }
}

#[test]
fn static_rim_is_exchanged_for_domains_without_fluid() {
    let threads: Vec<_> = build_local_comms(2)
        .into_iter()
        .map(|comms| {
            thread::spawn(move || {
                let rank = comms.rank();
                let mut manager = manager(test_parameters(), comms);
                if rank == 1 {
                    // A wall particle near the boundary towards cell 0.
                    manager.add_particles([Particle::new(
                        Vector3::new(DOMAIN_DIMENSION + 0.1, 1.0, 1.0),
                        Vector3::ZERO,
                        ParticleKind::Static,
                    )]);
                }
                if rank == 0 {
                    manager.add_particles([Particle::fluid(Vector3::new(
                        DOMAIN_DIMENSION - 0.2,
                        1.0,
                        1.0,
                    ))]);
                }
                manager.exchange_particles();
                manager.exchange_rim(ParticleKind::Static);
                if rank == 0 {
                    let domain = manager.domain(CellId::pack(0, 0, 0)).unwrap();
                    let rim = domain.rim_of_kind(CellId::pack(1, 0, 0), ParticleKind::Static);
                    assert_eq!(rim.len(), 1);
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
}

#[test]
fn simulate_conserves_fluid_particles_and_spawns_sources() {
    let mut parameters = test_parameters();
    parameters.timesteps = 3;
    parameters.sink_height = 0.0;
    parameters.sources = vec![Vector3::new(0.0, 40.0, 0.0)];
    let initial = 27;

    let mut handles = Vec::new();
    let threads: Vec<_> = build_local_comms(2)
        .into_iter()
        .map(|comms| {
            let rank = comms.rank();
            let parameters = parameters.clone();
            let (sink, frames) = CollectingSink::new();
            handles.push(frames);
            thread::spawn(move || {
                let mut manager = SphManager::new(&parameters, comms, Box::new(sink));
                if rank == 0 {
                    // A small block high above the sink.
                    let mut block = Vec::new();
                    for i in 0..3 {
                        for j in 0..3 {
                            for k in 0..3 {
                                block.push(Particle::fluid(Vector3::new(
                                    0.3 + 0.5 * i as f64,
                                    20.0 + 0.5 * j as f64,
                                    0.3 + 0.5 * k as f64,
                                )));
                            }
                        }
                    }
                    manager.add_particles(block);
                }
                manager.simulate();
                (manager.spawned_particle_count(), manager.sunk_particle_count())
            })
        })
        .collect();
    let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    let spawned: usize = results.iter().map(|(spawned, _)| spawned).sum();
    let sunk: usize = results.iter().map(|(_, sunk)| sunk).sum();
    assert_eq!(spawned, 3);
    assert_eq!(sunk, 0);

    for frame in 0..parameters.timesteps as usize {
        let total: usize = handles
            .iter()
            .map(|handle| handle.lock().unwrap()[frame].len())
            .sum();
        // One source particle enters per step, before the export.
        assert_eq!(total, initial + frame + 1);
    }
}

#[test]
fn single_particle_free_fall_through_the_whole_pipeline() {
    let mut parameters = test_parameters();
    parameters.timesteps = 100;
    let comms = build_local_comms(1).pop().unwrap();
    let (sink, frames) = CollectingSink::new();
    let mut manager = SphManager::new(&parameters, comms, Box::new(sink));
    manager.add_particles([Particle::fluid(Vector3::new(0.5, 10.0, 0.5))]);
    manager.simulate();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 100);
    let last = &frames[99];
    assert_eq!(last.len(), 1);
    let time = 100.0 * parameters.timestep_duration;
    let expected_y = 10.0 - 0.5 * 9.81 * time * time;
    let drop = 10.0 - expected_y;
    assert!(
        (last[0].position.y - expected_y).abs() < 0.01 * drop,
        "y = {}, expected {}",
        last[0].position.y,
        expected_y
    );
    assert_eq!(last[0].position.x, 0.5);
    assert_eq!(last[0].position.z, 0.5);
}

#[test]
fn update_removes_particles_below_the_sink() {
    let mut parameters = test_parameters();
    parameters.timestep_duration = 0.1;
    parameters.sink_height = 0.0;
    let comms = build_local_comms(1).pop().unwrap();
    let mut manager = manager(parameters, comms);
    manager.add_particles([Particle::fluid(Vector3::new(0.5, 0.01, 0.5))]);
    manager.exchange_particles();
    manager.exchange_rim(ParticleKind::Fluid);
    assert_eq!(manager.fluid_particle_count(), 1);
    manager.update();
    assert_eq!(manager.fluid_particle_count(), 0);
    assert_eq!(manager.sunk_particle_count(), 1);
}

#[test]
fn sources_spawn_inside_the_spawn_volume() {
    let mut parameters = test_parameters();
    parameters.sources = vec![Vector3::ZERO];
    let comms = build_local_comms(1).pop().unwrap();
    let mut manager = manager(parameters, comms);
    manager.spawn_source_particles();
    let spawned: Vec<Particle> = manager
        .domains
        .values()
        .flat_map(|domain| domain.particles().to_vec())
        .collect();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].kind, ParticleKind::Fluid);
    for value in [
        spawned[0].position.x,
        spawned[0].position.y,
        spawned[0].position.z,
    ] {
        assert!((-SOURCE_SIZE..=SOURCE_SIZE).contains(&value));
    }
}
