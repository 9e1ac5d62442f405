//! End-to-end engine tests over a temporary deployment root, with the
//! mount table and package manager faked and the filesystem real.

use kiosk_core::system::fakes::{FakeMountTable, FakePackageManager, FixedHost};
use kiosk_core::system::real::RealFilesystem;
use kiosk_core::system::{MountTable, PackageManager, System};
use kiosk_core::{Engine, EngineError};
use kiosk_schema::{DeployState, ManifestFileName};
use std::path::{Path, PathBuf};

struct Rig {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    repo: PathBuf,
    engine: Engine,
    mounts: FakeMountTable,
    packages: FakePackageManager,
}

fn rig_with_host(host: FixedHost) -> Rig {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("root");
    let repo = tmp.path().join("repo");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::create_dir_all(&repo).unwrap();
    let mounts = FakeMountTable::default();
    let packages = FakePackageManager::default();
    let system = System {
        fs: Box::new(RealFilesystem::new(&root)),
        mounts: Box::new(mounts.clone()),
        packages: Box::new(packages.clone()),
        host: Box::new(host),
    };
    Rig {
        engine: Engine::new(&root, system),
        _tmp: tmp,
        root,
        repo,
        mounts,
        packages,
    }
}

fn rig() -> Rig {
    rig_with_host(FixedHost::classroom())
}

/// Write a valid manifest document whose header matches `file_name`.
fn write_manifest(dir: &Path, file_name: &str, artifacts: &str) -> PathBuf {
    let name = ManifestFileName::parse(file_name).unwrap();
    let doc = format!(
        r#"
[course]
name = "{}"
technology = "{}"
release = "{}"
modality = ["{}"]
generation = {}
locale = ["{}"]
description = "test course"
publisher = "Example Training"
publish-date = "2025-03-01 12:00:00+00:00"
{artifacts}
"#,
        name.name,
        name.technology,
        name.release,
        name.modalities.join("+"),
        name.generation,
        name.locales.join("+"),
    );
    let path = dir.join(file_name);
    std::fs::write(&path, doc).unwrap();
    path
}

const DISK_ISO: &str = r#"
[[artifact]]
filename = "disk.iso"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "iso"
target-directory = "content/course"
final-name = "content/mount/course"
"#;

const SHARED_RPM: &str = r#"
[[artifact]]
filename = "shared.rpm"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "rpm"
target-directory = "content/packages"
"#;

const LINKED_PDF: &str = r#"
[[artifact]]
filename = "guide.pdf"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "pdf"
target-directory = "content/docs"
hardlink-names = ["content/latest/guide.pdf"]
"#;

fn iso_artifact_in(filename: &str, dir: &str, mount: &str) -> String {
    format!(
        r#"
[[artifact]]
filename = "{filename}"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "iso"
target-directory = "{dir}"
final-name = "{mount}"
"#
    )
}

fn iso_artifact(filename: &str, mount: &str) -> String {
    iso_artifact_in(filename, "content/course", mount)
}

#[test]
fn iso_deploy_and_remove_round_trip() {
    let r = rig();
    std::fs::write(r.repo.join("disk.iso"), b"iso bytes").unwrap();
    let m = write_manifest(&r.repo, "COURSE-TECH-1-ILT-7-en_US.cmf", DISK_ISO);

    let report = r.engine.deploy(&m, &r.repo).unwrap();
    assert!(report.success(), "{report}");

    let device = r.root.join("content/course/disk.iso");
    let mountpoint = r.root.join("content/mount/course");
    assert!(device.exists());
    assert!(r.mounts.contains(&device, &mountpoint).unwrap());
    assert!(r
        .root
        .join("manifests/COURSE-TECH-1-ILT-7-en_US.cmf")
        .exists());

    let report = r.engine.remove("COURSE-TECH-1-ILT-7-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert!(!device.exists());
    assert!(!r.mounts.contains(&device, &mountpoint).unwrap());
    assert!(!r
        .root
        .join("manifests/COURSE-TECH-1-ILT-7-en_US.cmf")
        .exists());
}

#[test]
fn shared_rpm_survives_until_last_reference_is_removed() {
    let r = rig();
    std::fs::write(r.repo.join("shared.rpm"), b"rpm bytes").unwrap();
    let m1 = write_manifest(&r.repo, "AAA-T-1-ILT-1-en_US.cmf", SHARED_RPM);
    let m2 = write_manifest(&r.repo, "BBB-T-1-ILT-1-en_US.cmf", SHARED_RPM);
    r.engine.deploy(&m1, &r.repo).unwrap();
    r.engine.deploy(&m2, &r.repo).unwrap();
    assert!(r.packages.is_installed("shared").unwrap());

    let report = r.engine.remove("AAA-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert!(r.packages.is_installed("shared").unwrap());
    assert!(r.root.join("content/packages/shared.rpm").exists());

    let report = r.engine.remove("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert!(!r.packages.is_installed("shared").unwrap());
    assert!(!r.root.join("content/packages/shared.rpm").exists());
}

#[test]
fn shared_hardlink_survives_until_last_declaration_is_removed() {
    let r = rig();
    std::fs::write(r.repo.join("guide.pdf"), b"doc").unwrap();
    let m1 = write_manifest(&r.repo, "AAA-T-1-ILT-1-en_US.cmf", LINKED_PDF);
    let m2 = write_manifest(&r.repo, "BBB-T-1-ILT-1-en_US.cmf", LINKED_PDF);
    r.engine.deploy(&m1, &r.repo).unwrap();
    r.engine.deploy(&m2, &r.repo).unwrap();

    let link = r.root.join("content/latest/guide.pdf");
    assert!(link.exists());

    r.engine.remove("AAA-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(link.exists());
    assert!(r.root.join("content/docs/guide.pdf").exists());

    r.engine.remove("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(!link.exists());
    assert!(!r.root.join("content/docs/guide.pdf").exists());
}

#[test]
fn removing_a_manifest_unregisters_its_own_mountpoint_of_a_shared_iso() {
    let r = rig();
    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let ma = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-1-en_US.cmf",
        &iso_artifact("disk.iso", "content/mount/a"),
    );
    let mb = write_manifest(
        &r.repo,
        "BBB-T-1-ILT-1-en_US.cmf",
        &iso_artifact("disk.iso", "content/mount/b"),
    );
    r.engine.deploy(&ma, &r.repo).unwrap();
    r.engine.deploy(&mb, &r.repo).unwrap();

    let device = r.root.join("content/course/disk.iso");
    assert!(r
        .mounts
        .contains(&device, &r.root.join("content/mount/a"))
        .unwrap());

    let report = r.engine.remove("AAA-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    // Nothing claims AAA's mountpoint any more, so its entry goes;
    // the payload itself is still shared with BBB and stays.
    assert!(!r
        .mounts
        .contains(&device, &r.root.join("content/mount/a"))
        .unwrap());
    assert!(device.exists());
}

#[test]
fn activation_defers_to_an_existing_mountpoint_claim() {
    let r = rig();
    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let ma = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-1-en_US.cmf",
        &iso_artifact_in("disk.iso", "content/a", "content/mount/shared"),
    );
    let mb = write_manifest(
        &r.repo,
        "BBB-T-1-ILT-1-en_US.cmf",
        &iso_artifact_in("disk.iso", "content/b", "content/mount/shared"),
    );
    r.engine.deploy(&ma, &r.repo).unwrap();
    r.engine.deploy(&mb, &r.repo).unwrap();

    let report = r.engine.activate("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    // One entry serves the shared mountpoint; switching does not stack
    // a second device onto it.
    let entries = r.mounts.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mountpoint, r.root.join("content/mount/shared"));
}

#[test]
fn second_deploy_lands_quiesced_and_activate_switches() {
    let r = rig();
    std::fs::write(r.repo.join("a.iso"), b"a").unwrap();
    std::fs::write(r.repo.join("b.iso"), b"b").unwrap();
    let ma = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-1-en_US.cmf",
        &iso_artifact("a.iso", "content/mount/a"),
    );
    let mb = write_manifest(
        &r.repo,
        "BBB-T-1-ILT-1-en_US.cmf",
        &iso_artifact("b.iso", "content/mount/b"),
    );
    r.engine.deploy(&ma, &r.repo).unwrap();
    r.engine.deploy(&mb, &r.repo).unwrap();

    let mdir = r.root.join("manifests");
    assert!(mdir.join("AAA-T-1-ILT-1-en_US.cmf").exists());
    assert!(mdir.join("BBB-T-1-ILT-1-en_US.cmf_quiesced").exists());
    assert_eq!(r.mounts.entries().len(), 1);

    let report = r.engine.activate("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert!(mdir.join("AAA-T-1-ILT-1-en_US.cmf_quiesced").exists());
    assert!(mdir.join("BBB-T-1-ILT-1-en_US.cmf").exists());
    let entries = r.mounts.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mountpoint, r.root.join("content/mount/b"));

    // Idempotent: a second activation changes nothing.
    let report = r.engine.activate("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert!(mdir.join("AAA-T-1-ILT-1-en_US.cmf_quiesced").exists());
    assert!(mdir.join("BBB-T-1-ILT-1-en_US.cmf").exists());
    assert_eq!(r.mounts.entries().len(), 1);
}

#[test]
fn redeploy_replaces_unique_artifacts_and_keeps_shared_ones() {
    let r = rig();
    std::fs::write(r.repo.join("unique.iso"), b"old").unwrap();
    std::fs::write(r.repo.join("fresh.iso"), b"new").unwrap();
    std::fs::write(r.repo.join("guide.pdf"), b"doc").unwrap();

    let old_artifacts = format!(
        "{}{LINKED_PDF}",
        iso_artifact("unique.iso", "content/mount/course")
    );
    let new_artifacts = format!(
        "{}{LINKED_PDF}",
        iso_artifact("fresh.iso", "content/mount/course")
    );
    let old = write_manifest(&r.repo, "COURSE-TECH-1-ILT-7-en_US.cmf", &old_artifacts);
    r.engine.deploy(&old, &r.repo).unwrap();
    let new = write_manifest(&r.repo, "COURSE-TECH-1-ILT-8-en_US.cmf", &new_artifacts);
    let report = r.engine.deploy(&new, &r.repo).unwrap();
    assert!(report.success(), "{report}");

    assert!(!r.root.join("content/course/unique.iso").exists());
    assert!(r.root.join("content/course/fresh.iso").exists());
    assert!(r.root.join("content/docs/guide.pdf").exists());
    assert!(r.root.join("content/latest/guide.pdf").exists());

    let mdir = r.root.join("manifests");
    assert!(!mdir.join("COURSE-TECH-1-ILT-7-en_US.cmf").exists());
    assert!(mdir.join("COURSE-TECH-1-ILT-8-en_US.cmf").exists());

    let device = r.root.join("content/course/fresh.iso");
    assert!(r
        .mounts
        .contains(&device, &r.root.join("content/mount/course"))
        .unwrap());
}

#[test]
fn duplicate_course_match_aborts_before_mutation() {
    let r = rig();
    let mdir = r.root.join("manifests");
    std::fs::create_dir_all(&mdir).unwrap();
    write_manifest(&mdir, "COURSE-TECH-1-ILT-7-en_US.cmf", DISK_ISO);
    write_manifest(&mdir, "COURSE-TECH-1-ILT-8-en_US.cmf_quiesced", DISK_ISO);

    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let m = write_manifest(&r.repo, "COURSE-TECH-1-ILT-9-en_US.cmf", DISK_ISO);
    let err = r.engine.deploy(&m, &r.repo).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateManifest { .. }));

    // Nothing was placed or deleted.
    assert!(!r.root.join("content/course/disk.iso").exists());
    assert!(mdir.join("COURSE-TECH-1-ILT-7-en_US.cmf").exists());
    assert!(mdir.join("COURSE-TECH-1-ILT-8-en_US.cmf_quiesced").exists());
}

#[test]
fn foundation_artifacts_are_skipped_on_classroom_hosts() {
    let r = rig();
    let foundation_pdf = r#"
[[artifact]]
filename = "internal.pdf"
checksum = "NOCHECK"
type = "content"
usage = ["foundation"]
content-type = "pdf"
target-directory = "content/docs"
"#;
    std::fs::write(r.repo.join("internal.pdf"), b"doc").unwrap();
    let m = write_manifest(&r.repo, "AAA-T-1-ILT-1-en_US.cmf", foundation_pdf);
    let report = r.engine.deploy(&m, &r.repo).unwrap();
    assert!(report.success(), "{report}");
    assert!(!r.root.join("content/docs/internal.pdf").exists());
}

#[test]
fn infrastructure_manifest_stays_active_through_switches() {
    let r = rig();
    std::fs::write(r.repo.join("a.iso"), b"a").unwrap();
    std::fs::write(r.repo.join("b.iso"), b"b").unwrap();
    std::fs::write(r.repo.join("base.iso"), b"base").unwrap();

    let ma = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-1-en_US.cmf",
        &iso_artifact("a.iso", "content/mount/a"),
    );
    let infra = write_manifest(
        &r.repo,
        "INFRAbase-T-1-ILT-1-en_US.cmf",
        &iso_artifact("base.iso", "content/mount/base"),
    );
    let mb = write_manifest(
        &r.repo,
        "BBB-T-1-ILT-1-en_US.cmf",
        &iso_artifact("b.iso", "content/mount/b"),
    );
    r.engine.deploy(&ma, &r.repo).unwrap();
    r.engine.deploy(&infra, &r.repo).unwrap();
    r.engine.deploy(&mb, &r.repo).unwrap();

    let mdir = r.root.join("manifests");
    // Infrastructure deploys Active even though AAA already is.
    assert!(mdir.join("INFRAbase-T-1-ILT-1-en_US.cmf").exists());
    assert!(mdir.join("AAA-T-1-ILT-1-en_US.cmf").exists());
    assert!(mdir.join("BBB-T-1-ILT-1-en_US.cmf_quiesced").exists());

    r.engine.activate("BBB-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(mdir.join("INFRAbase-T-1-ILT-1-en_US.cmf").exists());
    assert!(mdir.join("AAA-T-1-ILT-1-en_US.cmf_quiesced").exists());
    assert!(mdir.join("BBB-T-1-ILT-1-en_US.cmf").exists());
    let base = r.root.join("content/course/base.iso");
    assert!(r
        .mounts
        .contains(&base, &r.root.join("content/mount/base"))
        .unwrap());
}

#[test]
fn removal_footprint_separates_freed_from_shared_bytes() {
    let r = rig();
    std::fs::write(r.repo.join("guide.pdf"), b"12345").unwrap();
    let unique_file = r#"
[[artifact]]
filename = "unique.txt"
checksum = "NOCHECK"
type = "content"
usage = ["classroom"]
content-type = "file"
target-directory = "content/extras"
"#;
    std::fs::write(r.repo.join("unique.txt"), b"123").unwrap();

    let m1 = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-1-en_US.cmf",
        &format!("{LINKED_PDF}{unique_file}"),
    );
    let m2 = write_manifest(&r.repo, "BBB-T-1-ILT-1-en_US.cmf", LINKED_PDF);
    r.engine.deploy(&m1, &r.repo).unwrap();
    r.engine.deploy(&m2, &r.repo).unwrap();

    let (footprint, report) = r.engine.removal_footprint("AAA-T-1-ILT-1-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
    assert_eq!(footprint.freed_bytes, 3);
    assert_eq!(footprint.shared_bytes, 5);
}

#[test]
fn deep_verify_flags_digest_mismatch_and_missing_payload() {
    let r = rig();
    let payload = b"expected payload";
    let mut reader: &[u8] = payload;
    let digest = kiosk_core::verify::sha256_hex(&mut reader).unwrap();
    let artifact = format!(
        r#"
[[artifact]]
filename = "guide.pdf"
checksum = "{digest}"
type = "content"
usage = ["classroom"]
content-type = "pdf"
target-directory = "content/docs"
"#
    );
    std::fs::write(r.repo.join("guide.pdf"), payload).unwrap();
    let m = write_manifest(&r.repo, "AAA-T-1-ILT-1-en_US.cmf", &artifact);
    r.engine.deploy(&m, &r.repo).unwrap();

    let report = r.engine.verify(None, true).unwrap();
    assert!(report.success(), "{report}");

    std::fs::write(r.root.join("content/docs/guide.pdf"), b"tampered").unwrap();
    let report = r.engine.verify(None, true).unwrap();
    assert!(!report.success());
    assert!(report.summary().contains("checksum mismatch"));

    std::fs::remove_file(r.root.join("content/docs/guide.pdf")).unwrap();
    let report = r.engine.verify(None, true).unwrap();
    assert!(!report.success());
    assert!(report.summary().contains("missing"));
}

#[test]
fn verify_flags_missing_mount_for_active_manifest() {
    let r = rig();
    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let m = write_manifest(&r.repo, "COURSE-TECH-1-ILT-7-en_US.cmf", DISK_ISO);
    r.engine.deploy(&m, &r.repo).unwrap();

    let device = r.root.join("content/course/disk.iso");
    let mountpoint = r.root.join("content/mount/course");
    r.mounts.remove(&device, &mountpoint).unwrap();

    let report = r.engine.verify(None, false).unwrap();
    assert!(!report.success());
    assert!(report.summary().contains("mount entry missing"));
}

#[test]
fn validate_reports_broken_manifests_without_aborting() {
    let r = rig();
    let mdir = r.root.join("manifests");
    std::fs::create_dir_all(&mdir).unwrap();
    write_manifest(&mdir, "AAA-T-1-ILT-1-en_US.cmf", LINKED_PDF);
    std::fs::write(mdir.join("BBB-T-1-ILT-1-en_US.cmf"), "not toml [").unwrap();

    let report = r.engine.validate(None).unwrap();
    assert!(!report.success());

    let report = r.engine.validate(Some("AAA-T-1-ILT-1-en_US.cmf")).unwrap();
    assert!(report.success(), "{report}");
}

#[test]
fn unknown_manifest_name_is_an_error() {
    let r = rig();
    std::fs::create_dir_all(r.root.join("manifests")).unwrap();
    assert!(matches!(
        r.engine.activate("NOPE-T-1-ILT-1-en_US.cmf"),
        Err(EngineError::ManifestNotFound(_))
    ));
    assert!(matches!(
        r.engine.remove("NOPE-T-1-ILT-1-en_US.cmf"),
        Err(EngineError::ManifestNotFound(_))
    ));
}

#[test]
fn invalid_sibling_aborts_mutation_before_side_effects() {
    let r = rig();
    let mdir = r.root.join("manifests");
    std::fs::create_dir_all(&mdir).unwrap();
    std::fs::write(mdir.join("BAD-T-1-ILT-1-en_US.cmf"), "garbage").unwrap();

    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let m = write_manifest(&r.repo, "COURSE-TECH-1-ILT-7-en_US.cmf", DISK_ISO);
    assert!(matches!(
        r.engine.deploy(&m, &r.repo),
        Err(EngineError::Validation(_))
    ));
    assert!(!r.root.join("content/course/disk.iso").exists());
}

#[test]
fn grammar_breaking_sibling_name_aborts_mutation() {
    let r = rig();
    std::fs::write(r.repo.join("disk.iso"), b"iso").unwrap();
    let m = write_manifest(&r.repo, "COURSE-TECH-1-ILT-7-en_US.cmf", DISK_ISO);
    r.engine.deploy(&m, &r.repo).unwrap();

    // A .cmf file the catalog cannot parse may still claim artifacts,
    // so removal must refuse to run rather than tear anything down.
    let stray = r.root.join("manifests/stray.cmf");
    std::fs::write(&stray, "whatever").unwrap();
    assert!(matches!(
        r.engine.remove("COURSE-TECH-1-ILT-7-en_US.cmf"),
        Err(EngineError::Validation(_))
    ));
    assert!(r.root.join("content/course/disk.iso").exists());

    // Browsing stays usable while the directory is broken.
    let entries = r.engine.list().unwrap();
    assert_eq!(entries.len(), 1);

    std::fs::remove_file(&stray).unwrap();
    let report = r.engine.remove("COURSE-TECH-1-ILT-7-en_US.cmf").unwrap();
    assert!(report.success(), "{report}");
}

#[test]
fn listing_reflects_states_in_natural_order() {
    let r = rig();
    std::fs::write(r.repo.join("a.iso"), b"a").unwrap();
    std::fs::write(r.repo.join("b.iso"), b"b").unwrap();
    let m2 = write_manifest(
        &r.repo,
        "AAA-T-1-ILT-10-en_US.cmf",
        &iso_artifact("a.iso", "content/mount/a"),
    );
    let m1 = write_manifest(
        &r.repo,
        "BBB-T-1-ILT-2-en_US.cmf",
        &iso_artifact("b.iso", "content/mount/b"),
    );
    r.engine.deploy(&m1, &r.repo).unwrap();
    r.engine.deploy(&m2, &r.repo).unwrap();

    let entries = r.engine.list().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].parsed.name, "AAA");
    assert_eq!(entries[0].state(), DeployState::Quiesced);
    assert_eq!(entries[1].parsed.name, "BBB");
    assert_eq!(entries[1].state(), DeployState::Active);
}
