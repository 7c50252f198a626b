use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use region_store::{
    ChunkDeletion, ChunkPos, DeletionScanner, FlagError, PointerTable, ScanEnv, ScanPoll,
    RegionError, ScanSettings, SqliteFlagger, VisitOracle, VisitStatus, World,
    region::{POINTER_TABLE_SIZE, RegionDirectory, RegionPos, pointer_offset},
    scanner::completion::{RegionOutcome, complete_region},
};
use tempfile::TempDir;

const FILE_LEN: usize = 3 * POINTER_TABLE_SIZE;

struct TestWorld {
    root: TempDir,
    active: HashSet<(i32, i32)>,
}

impl TestWorld {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("region")).unwrap();
        Self {
            root,
            active: HashSet::new(),
        }
    }

    fn region_path(&self, x: i32, z: i32) -> PathBuf {
        self.root.path().join("region").join(format!("r.{x}.{z}.mca"))
    }

    /// A region whose every pointer entry is populated
    fn write_full_region(&self, x: i32, z: i32) -> Vec<u8> {
        let mut bytes = vec![0u8; FILE_LEN];
        for (slot, entry) in bytes[..POINTER_TABLE_SIZE].chunks_exact_mut(4).enumerate() {
            let location = ((slot as u32 + 2) << 8) | 1;
            entry.copy_from_slice(&location.to_be_bytes());
        }
        for (i, byte) in bytes[POINTER_TABLE_SIZE..].iter_mut().enumerate() {
            *byte = (i % 251) as u8 + 1;
        }
        fs::write(self.region_path(x, z), &bytes).unwrap();
        bytes
    }
}

impl World for TestWorld {
    fn name(&self) -> &str {
        "world"
    }

    fn storage_root(&self) -> &Path {
        self.root.path()
    }

    fn is_chunk_active(&self, x: i32, z: i32) -> bool {
        self.active.contains(&(x, z))
    }
}

#[derive(Default)]
struct MapOracle {
    eligible: HashSet<(i32, i32)>,
    generated: HashSet<(i32, i32)>,
    unflagged_chunks: Vec<(i32, i32)>,
    unflagged_regions: Vec<(i32, i32)>,
}

impl MapOracle {
    fn with_eligible(chunks: impl IntoIterator<Item = (i32, i32)>) -> Self {
        Self {
            eligible: chunks.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl VisitOracle for MapOracle {
    fn status(&self, _world: &str, x: i32, z: i32) -> Result<VisitStatus, FlagError> {
        Ok(if self.eligible.contains(&(x, z)) {
            VisitStatus::Unvisited
        } else if self.generated.contains(&(x, z)) {
            VisitStatus::Generated
        } else {
            VisitStatus::Visited
        })
    }

    fn unflag_chunk(&mut self, _world: &str, x: i32, z: i32) -> Result<(), FlagError> {
        self.unflagged_chunks.push((x, z));
        Ok(())
    }

    fn unflag_region(&mut self, _world: &str, x: i32, z: i32) -> Result<(), FlagError> {
        self.unflagged_regions.push((x, z));
        Ok(())
    }
}

fn region_chunks(x: i32, z: i32) -> Vec<(i32, i32)> {
    let origin = RegionPos::new(x, z).origin();
    let mut chunks = Vec::new();
    for dz in 0..32 {
        for dx in 0..32 {
            chunks.push((origin.x + dx, origin.z + dz));
        }
    }
    chunks
}

fn settings(chunks_per_check: usize, generate_only_enabled: bool) -> ScanSettings {
    ScanSettings {
        chunks_per_check,
        generate_only_enabled,
        cycle_delay_ms: 60_000,
    }
}

/// Poll until the cycle ends, returning the notifications and final stats
fn run_cycle(
    world: &TestWorld,
    oracle: &mut dyn VisitOracle,
    settings: ScanSettings,
) -> (Vec<ChunkDeletion>, region_store::CycleReport) {
    let mut scanner = DeletionScanner::new(world, settings).unwrap();
    let mut sink = Vec::new();
    for _ in 0..100_000 {
        let result = scanner.poll(&mut ScanEnv {
            world,
            oracle: &mut *oracle,
            sink: &mut sink,
            paused: false,
            now_ms: 0,
        });
        if let ScanPoll::CycleComplete(report) = result {
            return (sink, report);
        }
    }
    panic!("cycle never completed");
}

fn table_of(path: &Path) -> PointerTable {
    PointerTable::read_from(&mut fs::File::open(path).unwrap()).unwrap()
}

#[test]
fn partial_region_wipes_only_eligible_entries() {
    let world = TestWorld::new();
    let before = world.write_full_region(0, 0);
    let mut oracle = MapOracle::with_eligible([(0, 0), (1, 0), (2, 0), (3, 0)]);

    let (events, report) = run_cycle(&world, &mut oracle, settings(1024, false));

    let after = fs::read(world.region_path(0, 0)).unwrap();
    assert_eq!(after.len(), before.len());
    assert!(after[..16].iter().all(|&b| b == 0));
    assert_eq!(after[16..], before[16..]);

    let deleted: Vec<_> = events.iter().map(|e| (e.chunk_x, e.chunk_z)).collect();
    assert_eq!(deleted, [(3, 0), (2, 0), (1, 0), (0, 0)]);
    assert!(events.iter().all(|e| e.world == "world"));
    assert_eq!(oracle.unflagged_chunks, [(3, 0), (2, 0), (1, 0), (0, 0)]);
    assert!(oracle.unflagged_regions.is_empty());

    assert_eq!(report.chunks_deleted, 4);
    assert_eq!(report.regions_deleted, 0);
    assert_eq!(report.stats, "world - Checked 1/1, deleted 0 regions and 4 chunks");
    assert_eq!(report.next_run_ms, 60_000);
}

#[test]
fn fully_eligible_region_is_deleted() {
    let world = TestWorld::new();
    world.write_full_region(2, -1);
    let keep = world.write_full_region(0, 0);
    let mut oracle = MapOracle::with_eligible(region_chunks(2, -1));

    let (events, report) = run_cycle(&world, &mut oracle, settings(1, false));

    assert!(!world.region_path(2, -1).exists());
    assert_eq!(fs::read(world.region_path(0, 0)).unwrap(), keep);

    assert_eq!(report.regions_deleted, 1);
    assert_eq!(report.chunks_deleted, 0);
    assert_eq!(oracle.unflagged_regions, [(64, -32)]);
    assert!(oracle.unflagged_chunks.is_empty());

    assert_eq!(events.len(), 1024);
    assert_eq!((events[0].chunk_x, events[0].chunk_z), (95, -1));
    assert_eq!((events[1].chunk_x, events[1].chunk_z), (94, -1));
    assert_eq!((events[1023].chunk_x, events[1023].chunk_z), (64, -32));
}

#[test]
fn active_chunks_are_never_removed() {
    let mut world = TestWorld::new();
    world.write_full_region(2, -1);
    world.active.insert((70, -30));
    let mut oracle = MapOracle::with_eligible(region_chunks(2, -1));

    let (events, report) = run_cycle(&world, &mut oracle, settings(4096, false));

    let path = world.region_path(2, -1);
    assert!(path.exists());
    let table = table_of(&path);
    let origin = ChunkPos::new(64, -32);
    let survivor = pointer_offset(origin, ChunkPos::new(70, -30));
    assert!(!table.is_empty(survivor));
    assert_eq!(table.present_count(), 1);

    assert_eq!(events.len(), 1023);
    assert!(!events.iter().any(|e| (e.chunk_x, e.chunk_z) == (70, -30)));
    assert!(!oracle.unflagged_chunks.contains(&(70, -30)));
    assert_eq!(report.chunks_deleted, 1023);
    assert_eq!(report.regions_deleted, 0);
}

#[test]
fn region_without_eligible_chunks_is_untouched() {
    let world = TestWorld::new();
    let before = world.write_full_region(-3, 4);
    let mut oracle = MapOracle::default();

    for _ in 0..2 {
        let (events, report) = run_cycle(&world, &mut oracle, settings(100, false));
        assert!(events.is_empty());
        assert_eq!(report.chunks_deleted, 0);
        assert_eq!(fs::read(world.region_path(-3, 4)).unwrap(), before);
    }
    assert!(oracle.unflagged_chunks.is_empty());
}

#[test]
fn orphaned_entries_are_unflagged_without_notification() {
    let world = TestWorld::new();
    let mut bytes = world.write_full_region(0, 0);
    // chunk (5, 1) already has no data
    let offset = 4 * (5 + 32);
    bytes[offset..offset + 4].fill(0);
    fs::write(world.region_path(0, 0), &bytes).unwrap();

    let mut oracle = MapOracle::with_eligible([(5, 1), (6, 1)]);
    let (events, report) = run_cycle(&world, &mut oracle, settings(1024, false));

    assert_eq!(events.len(), 1);
    assert_eq!((events[0].chunk_x, events[0].chunk_z), (6, 1));
    assert_eq!(oracle.unflagged_chunks, [(6, 1), (5, 1)]);
    assert_eq!(report.chunks_deleted, 1);
    assert!(table_of(&world.region_path(0, 0)).is_empty(4 * (6 + 32)));
}

#[test]
fn generated_chunks_follow_generate_only_setting() {
    let world = TestWorld::new();
    world.write_full_region(0, 0);
    let mut oracle = MapOracle {
        generated: [(10, 10)].into_iter().collect(),
        ..MapOracle::default()
    };

    let (events, _) = run_cycle(&world, &mut oracle, settings(1024, false));
    assert!(events.is_empty());

    let (events, report) = run_cycle(&world, &mut oracle, settings(1024, true));
    assert_eq!(events.len(), 1);
    assert_eq!(report.chunks_deleted, 1);
}

#[test]
fn unreadable_region_is_skipped_and_scan_continues() {
    let world = TestWorld::new();
    fs::write(world.region_path(0, 0), [1u8; 100]).unwrap();
    world.write_full_region(1, 0);
    let mut oracle = MapOracle::with_eligible([(0, 0), (32, 0)]);

    let (events, report) = run_cycle(&world, &mut oracle, settings(1024, false));

    assert_eq!(fs::read(world.region_path(0, 0)).unwrap(), [1u8; 100]);
    assert_eq!(events.len(), 1);
    assert_eq!((events[0].chunk_x, events[0].chunk_z), (32, 0));
    // the truncated region keeps its flag for the next cycle
    assert_eq!(oracle.unflagged_chunks, [(32, 0)]);
    assert_eq!(report.chunks_deleted, 1);
    assert_eq!(report.stats, "world - Checked 2/2, deleted 0 regions and 1 chunks");
}

#[test]
fn read_only_region_is_made_writable() {
    let world = TestWorld::new();
    world.write_full_region(0, 0);
    let path = world.region_path(0, 0);
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_readonly(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(0o444);
    }
    fs::set_permissions(&path, permissions).unwrap();

    let mut oracle = MapOracle::with_eligible([(31, 31)]);
    let (events, report) = run_cycle(&world, &mut oracle, settings(1024, false));

    let permissions = fs::metadata(&path).unwrap().permissions();
    assert!(!permissions.readonly());
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // only the owner gains write access
        assert_eq!(permissions.mode() & 0o777, 0o644);
    }
    assert_eq!(events.len(), 1);
    assert_eq!(report.chunks_deleted, 1);
    assert!(table_of(&path).is_empty(4092));
}

#[test]
fn vanished_region_is_reported_and_scan_continues() {
    let world = TestWorld::new();
    world.write_full_region(0, 0);
    world.write_full_region(1, 0);
    let mut oracle = MapOracle::with_eligible(region_chunks(0, 0).into_iter().chain([(32, 0)]));
    let mut scanner = DeletionScanner::new(&world, settings(1024, false)).unwrap();
    let mut sink: Vec<ChunkDeletion> = Vec::new();

    // one poll sweeps all of r.0.0, the next one completes it
    let first = scanner.poll(&mut ScanEnv {
        world: &world,
        oracle: &mut oracle,
        sink: &mut sink,
        paused: false,
        now_ms: 0,
    });
    assert!(matches!(first, ScanPoll::Progress));
    assert_eq!(scanner.cursor().region_index, 0);
    fs::remove_file(world.region_path(0, 0)).unwrap();

    let report = loop {
        let result = scanner.poll(&mut ScanEnv {
            world: &world,
            oracle: &mut oracle,
            sink: &mut sink,
            paused: false,
            now_ms: 0,
        });
        if let ScanPoll::CycleComplete(report) = result {
            break report;
        }
    };

    assert!(oracle.unflagged_regions.is_empty());
    assert_eq!(report.regions_deleted, 0);
    // r.1.0 was still processed
    let deleted: Vec<_> = sink.iter().map(|e| (e.chunk_x, e.chunk_z)).collect();
    assert_eq!(deleted, [(32, 0)]);
    assert_eq!(oracle.unflagged_chunks, [(32, 0)]);
    assert_eq!(report.chunks_deleted, 1);
    assert_eq!(report.stats, "world - Checked 2/2, deleted 0 regions and 1 chunks");
}

#[test]
fn failed_region_delete_leaves_flags_and_sends_nothing() {
    let world = TestWorld::new();
    world.write_full_region(2, -1);
    let region = RegionDirectory::locate("world", world.root.path())
        .unwrap()
        .list()
        .unwrap()
        .remove(0);
    fs::remove_file(&region.path).unwrap();

    let mut oracle = MapOracle::default();
    let mut sink: Vec<ChunkDeletion> = Vec::new();
    let mut pending: Vec<ChunkPos> = region_chunks(2, -1)
        .into_iter()
        .map(|(x, z)| ChunkPos::new(x, z))
        .collect();
    let outcome = complete_region(
        &mut ScanEnv {
            world: &world,
            oracle: &mut oracle,
            sink: &mut sink,
            paused: false,
            now_ms: 0,
        },
        &region,
        &mut pending,
    );

    match outcome {
        RegionOutcome::Failed(RegionError::DeleteFailed { path, reason }) => {
            assert_eq!(path, region.path);
            assert_eq!(reason, "file no longer exists");
        }
        other => panic!("expected a failed delete, got {other:?}"),
    }
    assert!(sink.is_empty());
    assert!(oracle.unflagged_regions.is_empty());
    assert!(oracle.unflagged_chunks.is_empty());
}

#[test]
fn sqlite_flags_are_cleared_with_deleted_region() {
    let world = TestWorld::new();
    world.write_full_region(2, -1);
    world.write_full_region(0, 0);

    let now = Arc::new(AtomicI64::new(0));
    let mut flagger = SqliteFlagger::open_in_memory().unwrap();
    let clock = Arc::clone(&now);
    flagger.set_clock(Box::new(move || clock.load(Ordering::SeqCst)));

    // every chunk of r.2.-1 visited long ago, r.0.0 only partly
    flagger.flag_visited("world", 64 + 16, -32 + 16, 16, 1_000).unwrap();
    flagger.flag_visited("world", 0, 0, 1, 1_000).unwrap();
    assert_eq!(flagger.count("world").unwrap(), 33 * 33 + 9);
    now.store(10_000, Ordering::SeqCst);

    let (events, report) = run_cycle(&world, &mut flagger, settings(512, false));

    assert!(!world.region_path(2, -1).exists());
    assert_eq!(report.regions_deleted, 1);
    // (0, 0) and (1, 1) and their neighbours inside r.0.0
    assert_eq!(report.chunks_deleted, 4);
    assert_eq!(events.len(), 1024 + 4);
    for x in 64..96 {
        for z in -32..0 {
            assert_eq!(flagger.status("world", x, z).unwrap(), VisitStatus::Unknown);
        }
    }
    // flags outside both regions were left alone
    assert_eq!(flagger.status("world", -1, -1).unwrap(), VisitStatus::Unvisited);
    assert_eq!(flagger.status("world", 96, -16).unwrap(), VisitStatus::Unvisited);
}
