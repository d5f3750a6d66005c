mod common;

use common::{lock, running_as_root, unlock, TestTree, MD5_EMPTY, MD5_HI};
use devscan_lib::{
    read_report, scan_directory, Config, DevscanError, FileRecord, HashAlgorithm, RecordStatus, ReportWriter,
    ScanContext, ScanOptions, ScanSummary, SymlinkPolicy, NOT_AVAILABLE,
};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tempfile::TempDir;

fn scan_to_report(tree: &TestTree, out_dir: &TempDir, options: ScanOptions) -> (ScanSummary, Vec<FileRecord>) {
    let report = out_dir.path().join("scan.csv");
    let mut writer = ReportWriter::create(&report, options.algorithm).unwrap();
    let mut ctx = ScanContext::new(options);
    let summary = scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
    writer.finish().unwrap();
    (summary, read_report(&report).unwrap())
}

#[test]
fn test_one_record_per_file() {
    let tree = TestTree::new();
    let mut expected = HashSet::new();
    for d in ["DCIM", "DCIM/Camera", "Music", "Download/nested/deeper"] {
        for i in 0..4 {
            let path = tree.file(&format!("{}/file{}.bin", d, i), format!("{}-{}", d, i).as_bytes());
            expected.insert(path);
        }
    }
    tree.dir("empty/dir");
    let out = TempDir::new().unwrap();

    let (summary, records) = scan_to_report(&tree, &out, ScanOptions::default());

    let seen: HashSet<PathBuf> = records.iter().map(|r| r.path.clone()).collect();
    assert_eq!(records.len(), 16);
    assert_eq!(seen, expected);
    assert_eq!(summary.files_hashed, 16);
    assert_eq!(summary.errors(), 0);
}

#[test]
fn test_example_device_scenario() {
    let tree = TestTree::new();
    tree.file("a.txt", b"hi");
    tree.file("sub/b.txt", b"");
    let locked = tree.file("sub/locked", b"secret");
    lock(&locked);
    let out = TempDir::new().unwrap();

    let (summary, records) = scan_to_report(&tree, &out, ScanOptions::default());
    unlock(&locked, 0o644);

    assert_eq!(records.len(), 3);

    let a = records.iter().find(|r| r.path.ends_with("a.txt")).unwrap();
    assert_eq!((a.digest.as_str(), a.size_bytes), (MD5_HI, 2));
    assert_eq!(a.status, RecordStatus::Success);

    let b = records.iter().find(|r| r.path.ends_with("sub/b.txt")).unwrap();
    assert_eq!((b.digest.as_str(), b.size_bytes), (MD5_EMPTY, 0));
    assert_eq!(b.status, RecordStatus::Success);

    assert!(records[2].path.ends_with("sub/locked"));

    // Root reads the file regardless of its mode.
    if !running_as_root() {
        let l = &records[2];
        assert_eq!((l.digest.as_str(), l.size_bytes), (NOT_AVAILABLE, 0));
        assert!(matches!(&l.status, RecordStatus::Failed(reason) if reason.contains("Permission denied")));
        assert_eq!(summary.files_hashed, 2);
        assert_eq!(summary.files_failed, 1);
    }
}

#[test]
fn test_example_scenario_with_vanished_file() {
    let tree = TestTree::new();
    tree.file("a.txt", b"hi");
    tree.file("sub/b.txt", b"");
    let gone = tree.file("sub/locked", b"secret");
    let out = TempDir::new().unwrap();
    let report = out.path().join("scan.csv");
    let mut writer = ReportWriter::create(&report, HashAlgorithm::Md5).unwrap();

    let target = gone.clone();
    let mut ctx = ScanContext::new(ScanOptions::default()).with_callback(Box::new(
        move |record: &FileRecord, _: &ScanSummary| {
            if record.path.ends_with("sub/b.txt") {
                fs::remove_file(&target).unwrap();
            }
        },
    ));
    let summary = scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
    writer.finish().unwrap();

    let records = read_report(&report).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!((records[0].digest.as_str(), records[0].size_bytes), (MD5_HI, 2));
    assert_eq!((records[1].digest.as_str(), records[1].size_bytes), (MD5_EMPTY, 0));

    assert_eq!(records[2].path, gone);
    assert_eq!((records[2].digest.as_str(), records[2].size_bytes), (NOT_AVAILABLE, 0));
    assert!(matches!(&records[2].status, RecordStatus::Failed(reason) if reason.contains("No such file")));
    assert_eq!(summary.files_hashed, 2);
    assert_eq!(summary.files_failed, 1);
}

#[test]
fn test_file_revoked_mid_scan_does_not_halt() {
    let tree = TestTree::new();
    tree.file("1_first.txt", b"one");
    let victim = tree.file("2_victim.txt", b"two");
    tree.file("3_last.txt", b"three");

    let report_dir = TempDir::new().unwrap();
    let report = report_dir.path().join("scan.csv");
    let mut writer = ReportWriter::create(&report, HashAlgorithm::Md5).unwrap();

    let target = victim.clone();
    let mut ctx = ScanContext::new(ScanOptions::default()).with_callback(Box::new(
        move |record: &FileRecord, _: &ScanSummary| {
            if record.path.ends_with("1_first.txt") {
                fs::remove_file(&target).unwrap();
            }
        },
    ));
    let summary = scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
    writer.finish().unwrap();

    let records = read_report(&report).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].path, victim);
    assert!(!records[1].status.is_success());
    assert_eq!(records[1].digest, NOT_AVAILABLE);
    assert!(records[2].status.is_success());
    assert_eq!(summary.files_failed, 1);
}

#[test]
fn test_directory_vanished_mid_scan_is_skipped() {
    let tree = TestTree::new();
    tree.file("a_first.txt", b"ok");
    tree.file("b_gone/hidden.txt", b"nope");
    tree.file("c_last.txt", b"ok");
    let gone = tree.root().join("b_gone");
    let out = TempDir::new().unwrap();
    let report = out.path().join("scan.csv");
    let mut writer = ReportWriter::create(&report, HashAlgorithm::Md5).unwrap();

    let mut ctx = ScanContext::new(ScanOptions::default()).with_callback(Box::new(
        move |record: &FileRecord, _: &ScanSummary| {
            if record.path.ends_with("a_first.txt") {
                fs::remove_dir_all(&gone).unwrap();
            }
        },
    ));
    let summary = scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
    writer.finish().unwrap();

    let records = read_report(&report).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[1].path.ends_with("c_last.txt"));
    assert_eq!(summary.dir_errors, 1);
    assert_eq!(summary.files_failed, 0);
}

#[test]
#[ignore = "needs a non-root user; root lists directories regardless of mode"]
fn test_unreadable_directory_is_skipped() {
    let tree = TestTree::new();
    tree.file("visible/ok.txt", b"ok");
    tree.file("private/hidden.txt", b"nope");
    let private = tree.root().join("private");
    lock(&private);
    let out = TempDir::new().unwrap();

    let (summary, records) = scan_to_report(&tree, &out, ScanOptions::default());
    unlock(&private, 0o755);

    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("visible/ok.txt"));
    assert_eq!(summary.dir_errors, 1);
    assert_eq!(summary.files_failed, 0);
}

#[test]
fn test_report_is_valid_mid_scan_and_after_interrupt() {
    let tree = TestTree::new();
    for i in 0..20 {
        tree.file(&format!("photos/img_{:02}.jpg", i), &vec![i as u8; 1000 + i]);
    }

    let report_dir = TempDir::new().unwrap();
    let report = report_dir.path().join("scan.csv");
    let mut writer = ReportWriter::create(&report, HashAlgorithm::Md5).unwrap();

    let mut ctx = ScanContext::new(ScanOptions::default());
    let token = ctx.cancel_token();
    let reading = report.clone();
    ctx = ctx.with_callback(Box::new(move |_: &FileRecord, summary: &ScanSummary| {
        let on_disk = read_report(&reading).unwrap();
        assert_eq!(on_disk.len(), summary.rows_written());
        if summary.rows_written() == 7 {
            token.store(true, Ordering::Relaxed);
        }
    }));

    let summary = scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
    // Dropped without finish(), as if the process went away here.
    drop(writer);

    assert!(summary.interrupted);
    let content = fs::read_to_string(&report).unwrap();
    assert!(content.starts_with("File Path,MD5 Hash,File Size (bytes),Status\n"));
    assert!(content.ends_with('\n'));

    let records = read_report(&report).unwrap();
    assert_eq!(records.len(), 7);
    assert!(records.iter().all(|r| r.status.is_success()));
}

#[test]
fn test_symlink_cycle_with_report() {
    let tree = TestTree::new();
    let a = tree.dir("a");
    let b = tree.dir("b");
    tree.file("a/x.txt", b"x");
    tree.file("b/y.txt", b"y");
    std::os::unix::fs::symlink(&b, a.join("link_b")).unwrap();
    std::os::unix::fs::symlink(&a, b.join("link_a")).unwrap();
    let out = TempDir::new().unwrap();

    let options = ScanOptions {
        symlinks: SymlinkPolicy::Always,
        ..Default::default()
    };
    let (summary, records) = scan_to_report(&tree, &out, options);

    assert_eq!(records.len(), 2);
    assert_eq!(summary.files_hashed, 2);
}

#[test]
fn test_append_accumulates_runs() {
    let tree = TestTree::new();
    tree.file("one.txt", b"1");
    let out = TempDir::new().unwrap();
    let report = out.path().join("inventory.csv");

    for _ in 0..2 {
        let mut writer = ReportWriter::append(&report, HashAlgorithm::Md5).unwrap();
        let mut ctx = ScanContext::new(ScanOptions::default());
        scan_directory(tree.root(), &mut writer, &mut ctx).unwrap();
        writer.finish().unwrap();
    }

    let records = read_report(&report).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], records[1]);

    let result = ReportWriter::append(&report, HashAlgorithm::Blake3);
    assert!(matches!(result, Err(DevscanError::ReportHeaderMismatch { .. })));
    assert_eq!(read_report(&report).unwrap().len(), 2);
}

#[test]
fn test_config_drives_scan_options() {
    let tree = TestTree::new();
    tree.file("song.mp3", b"hello world");
    let out = TempDir::new().unwrap();

    let config = Config::from_toml("[scan]\nalgorithm = \"blake3\"\n").unwrap();
    let (_, records) = scan_to_report(&tree, &out, config.scan_options());

    assert_eq!(
        records[0].digest,
        "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
    );
    let content = fs::read_to_string(out.path().join("scan.csv")).unwrap();
    assert!(content.starts_with("File Path,BLAKE3 Hash,"));
}
