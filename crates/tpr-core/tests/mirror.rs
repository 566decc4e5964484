//! Integration tests for repository mirroring.
use std::sync::Arc;
use tpr_core::{
    ArtifactRepository, InMemoryRepositoryManager, LocalRepositoryManager, MetadataRepository,
    MirrorApplication, RepositoryDescriptor, RepositoryManager, RootSelection, SlicingOptions,
    UnitSource,
};
use tpr_schema::{
    ArtifactDescriptor, ArtifactKey, Filter, InstallableUnit, RepositoryReference, Requirement,
    UnitReference, Version, VersionRange,
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn unit(id: &str, version: &str) -> InstallableUnit {
    InstallableUnit::new(id, Version::parse(version).unwrap())
}

fn member(id: &str) -> Requirement {
    Requirement::unit(id, VersionRange::exact(Version::new(1, 0, 0)))
}

fn bundle(id: &str) -> ArtifactKey {
    ArtifactKey::new("osgi.bundle", id, Version::new(1, 0, 0))
}

/// A feature group with a mandatory, an optional and a linux-only member.
fn source() -> Arc<InMemoryRepositoryManager> {
    let manager = Arc::new(InMemoryRepositoryManager::new());
    manager.add_metadata(
        MetadataRepository::new(url("memory://source"), "source").with_units([
            unit("feature.group", "1.0")
                .as_group()
                .with_requirement(member("core"))
                .with_requirement(member("extra").optional())
                .with_requirement(member("native").with_filter(Filter::equal("osgi.os", "linux"))),
            unit("core", "1.0").with_artifact(bundle("core")),
            unit("extra", "1.0").with_artifact(bundle("extra")),
            unit("native", "1.0").with_artifact(bundle("native")),
        ]),
    );
    manager.add_artifacts(
        ArtifactRepository::new(url("memory://source"), "source").with_descriptors(
            ["core", "extra", "native"]
                .into_iter()
                .map(|id| ArtifactDescriptor::new(bundle(id))),
        ),
    );
    manager
}

fn mirror(manager: &Arc<InMemoryRepositoryManager>, options: SlicingOptions) -> Vec<String> {
    MirrorApplication::new(
        manager.clone(),
        RepositoryDescriptor::new(url("memory://dest")),
    )
    .with_sources([url("memory://source")])
    .with_slicing_options(options)
    .run(&RootSelection::References(vec![UnitReference::latest(
        "feature.group",
    )]))
    .unwrap();

    let dest = manager
        .load_metadata_repository(&url("memory://dest"))
        .unwrap();
    dest.units().map(|u| u.id.clone()).collect()
}

#[test]
fn test_optional_members_follow_include_flag() {
    let without = mirror(
        &source(),
        SlicingOptions {
            include_optional_dependencies: false,
            ..SlicingOptions::default()
        },
    );
    assert_eq!(without, vec!["core", "feature.group", "native"]);

    let with = mirror(&source(), SlicingOptions::default());
    assert_eq!(with, vec!["core", "extra", "feature.group", "native"]);
}

#[test]
fn test_filter_context_restricts_members() {
    let windows = [("osgi.os", "win32"), ("osgi.ws", "win32"), ("osgi.arch", "x86_64")]
        .into_iter()
        .collect();
    let ids = mirror(
        &source(),
        SlicingOptions {
            filter: windows,
            ..SlicingOptions::default()
        },
    );
    assert_eq!(ids, vec!["core", "extra", "feature.group"]);
}

#[test]
fn test_filtered_requirements_only() {
    let ids = mirror(
        &source(),
        SlicingOptions {
            filtered_requirements_only: true,
            ..SlicingOptions::default()
        },
    );
    assert_eq!(ids, vec!["feature.group", "native"]);
}

#[test]
fn test_roots_only_without_slicing() {
    let manager = source();
    let report = MirrorApplication::new(
        manager.clone(),
        RepositoryDescriptor::new(url("memory://dest")),
    )
    .with_sources([url("memory://source")])
    .run(&RootSelection::References(vec![UnitReference::latest("core")]))
    .unwrap();
    assert_eq!(report.units_copied, 1);
    assert_eq!(report.artifacts_copied, 1);
}

#[test]
fn test_appending_mirror_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let source_url = Url::from_directory_path(temp.path().join("source")).unwrap();
    let dest_url = Url::from_directory_path(temp.path().join("dest")).unwrap();

    let manager = Arc::new(LocalRepositoryManager::new());
    manager
        .store_metadata_repository(
            &MetadataRepository::new(source_url.clone(), "source")
                .with_units([unit("core", "1.0").with_artifact(bundle("core"))]),
        )
        .unwrap();
    manager
        .store_artifact_repository(
            &ArtifactRepository::new(source_url.clone(), "source")
                .with_descriptors([ArtifactDescriptor::new(bundle("core"))]),
        )
        .unwrap();

    let mut destination = RepositoryDescriptor::new(dest_url.clone());
    destination.append = true;
    let job = MirrorApplication::new(manager.clone(), destination)
        .with_sources([source_url])
        .with_references([RepositoryReference::new(
            url("https://example.org/updates"),
            Some("Updates".into()),
            true,
        )])
        .with_slicing_options(SlicingOptions::default());
    let roots = RootSelection::References(vec![UnitReference::latest("core")]);

    let first = job.run(&roots).unwrap();
    assert_eq!((first.units_copied, first.units_present), (1, 0));

    let second = job.run(&roots).unwrap();
    assert_eq!((second.units_copied, second.units_present), (0, 1));
    assert_eq!(second.artifacts_copied, 0);

    let third = job.run(&roots).unwrap();
    assert_eq!(third.units_copied, 0);

    let dest = manager.load_metadata_repository(&dest_url).unwrap();
    assert_eq!(dest.len(), 1);
    assert_eq!(dest.references().len(), 2);
}
