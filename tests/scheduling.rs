//! Indexing and gap scheduling over on-disk archives.

mod common;

use std::fs;

use common::Archive;
use synthpro::{Calendar, Error, PeriodKey, Tile, plan_batch};

fn period(s: &str) -> PeriodKey {
    s.parse().unwrap()
}

#[test]
fn schedules_only_periods_without_output() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    let feb_a = archive.add_descriptor("T31TCJ", "20240210");
    let feb_b = archive.add_descriptor("T31TCJ", "20240222");
    archive.add_l3_product("T31TCJ", "20240115");

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();

    assert_eq!(plan.items.len(), 1);
    let item = &plan.items[0];
    assert_eq!(item.tile, Tile::new("T31TCJ"));
    assert_eq!(item.period, period("202402"));
    assert_eq!(item.inputs, vec![feb_a, feb_b]);
    assert_eq!(item.output_dir, archive.l3().join("T31TCJ"));
}

#[test]
fn covered_archive_schedules_nothing_on_every_run() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    archive.add_descriptor("T31TCK", "20240301");
    archive.add_l3_product("T31TCJ", "20240115");
    archive.add_l3_product("T31TCK", "20240315");

    for _ in 0..2 {
        let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
        assert!(plan.items.is_empty());
    }
}

#[test]
fn repeated_planning_is_deterministic() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCK", "20240301");
    archive.add_descriptor("T31TCJ", "20240210");
    archive.add_descriptor("T31TCJ", "20240105");

    let first = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    let second = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    assert_eq!(first.items, second.items);

    let order: Vec<(String, String)> = first
        .items
        .iter()
        .map(|i| (i.tile.to_string(), i.period.to_string()))
        .collect();
    assert_eq!(
        order,
        [
            ("T31TCJ".to_string(), "202401".to_string()),
            ("T31TCJ".to_string(), "202402".to_string()),
            ("T31TCK".to_string(), "202403".to_string()),
        ]
    );
}

#[test]
fn persian_months_split_at_nowruz() {
    let archive = Archive::new();
    archive.add_descriptor("T39SWA", "20240319");
    archive.add_descriptor("T39SWA", "20240320");
    archive.add_descriptor("T39SWA", "20240419");

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Persian).unwrap();

    let periods: Vec<String> = plan.items.iter().map(|i| i.period.to_string()).collect();
    assert_eq!(periods, ["140212", "140301"]);
    assert_eq!(plan.items[1].inputs.len(), 2);
}

#[test]
fn malformed_descriptors_are_skipped_not_fatal() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    archive.add_descriptor("T31TCJ", "2024XX01");
    common::touch(&archive.l2().join("T31TCJ").join("broken_MTD_ALL.xml"));

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();

    assert_eq!(plan.items.len(), 1);
    assert_eq!(plan.index.descriptor_count(), 1);
    assert_eq!(plan.index.skipped().len(), 2);
}

#[test]
fn malformed_l3_entries_do_not_count_as_output() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    fs::create_dir_all(archive.l3().join("T31TCJ").join("notes")).unwrap();
    common::touch(&archive.l3().join("T31TCJ").join(common::l3_product_name("T31TCJ", "20240110")));

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();
    assert_eq!(plan.items.len(), 1);
}

#[test]
fn missing_l2_root_is_fatal() {
    let archive = Archive::new();
    match plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian) {
        Err(Error::ArchiveUnavailable { path, .. }) => assert_eq!(path, archive.l2()),
        other => panic!("expected ArchiveUnavailable, got {other:?}"),
    }
}

#[test]
fn tiles_without_descriptors_are_dropped() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");
    common::touch(&archive.l2().join("T31TCK").join("README.txt"));

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();

    let tiles: Vec<&Tile> = plan.index.tiles().collect();
    assert_eq!(tiles, [&Tile::new("T31TCJ")]);
    assert!(!archive.l3().join("T31TCK").exists());
}

#[test]
fn first_run_creates_tile_output_directories() {
    let archive = Archive::new();
    archive.add_descriptor("T31TCJ", "20240105");

    let plan = plan_batch(&archive.l2(), &archive.l3(), Calendar::Gregorian).unwrap();

    assert_eq!(plan.items.len(), 1);
    assert!(archive.l3().join("T31TCJ").is_dir());
}
