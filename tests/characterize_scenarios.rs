//! End-to-end characterization scenarios over real temp directories.

use fathom::{
    Characterizer, Confidence, FathomConfig, FormatId, MemoryStore, SourceId, SourceKind,
    SourceRecord, Validity,
};
use fathom::store::Accessor;
use std::path::Path;

/// Minimal but well-formed WAVE stream: RIFF header + PCM fmt chunk +
/// 4-byte data chunk.
fn wave_bytes() -> Vec<u8> {
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&8000u32.to_le_bytes());
    fmt.extend_from_slice(&16000u32.to_le_bytes());
    fmt.extend_from_slice(&2u16.to_le_bytes());
    fmt.extend_from_slice(&16u16.to_le_bytes());

    let data = [0u8, 1, 2, 3];
    let riff_size = 4 + (8 + fmt.len()) + (8 + data.len());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(riff_size as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&fmt);
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&data);
    bytes
}

fn characterize_dir(store: &mut dyn Accessor, config: FathomConfig, dir: &Path) -> SourceId {
    let chr = Characterizer::with_builtins(config);
    chr.characterize_all(store, &[dir.to_string_lossy().into_owned()])
        .expect("characterization should complete")
}

fn module_names(store: &dyn Accessor, source: SourceId) -> Vec<String> {
    store
        .retrieve_source(source)
        .unwrap()
        .modules
        .iter()
        .map(|&m| store.retrieve_module(m).unwrap().name)
        .collect()
}

fn child_by_name(store: &dyn Accessor, parent: SourceId, name: &str) -> SourceId {
    store
        .retrieve_source(parent)
        .unwrap()
        .children
        .iter()
        .copied()
        .find(|&c| store.retrieve_source(c).unwrap().kind.display_name() == name)
        .unwrap_or_else(|| panic!("no child named {name}"))
}

fn clump_ids(store: &dyn Accessor) -> Vec<SourceId> {
    store
        .source_ids()
        .into_iter()
        .filter(|&id| store.retrieve_source(id).unwrap().kind == SourceKind::Clump)
        .collect()
}

// ─── Scenario A: WAVE file + unrelated text file ───────────────────

#[test]
fn wave_and_text_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sound.wav"), wave_bytes()).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"unrelated notes\n").unwrap();

    let mut store = MemoryStore::new();
    let root = characterize_dir(&mut store, FathomConfig::default(), dir.path());

    let root_record = store.retrieve_source(root).unwrap();
    assert!(matches!(root_record.kind, SourceKind::Directory { .. }));
    assert_eq!(root_record.children.len(), 2);

    // The WAVE file: RIFF chunk identifier and form type were parsed, and
    // the RIFF handler validated it.
    let wave = child_by_name(&store, root, "sound.wav");
    let wave_record = store.retrieve_source(wave).unwrap();
    assert_eq!(wave_record.property("riff.chunk.id"), Some("RIFF"));
    assert_eq!(wave_record.property("riff.form.type"), Some("WAVE"));
    let wave_modules = module_names(&store, wave);
    assert!(wave_modules.contains(&"fathom/riff-handler".to_string()));
    let riff_module = wave_record
        .modules
        .iter()
        .map(|&m| store.retrieve_module(m).unwrap())
        .find(|m| m.name == "fathom/riff-handler")
        .unwrap();
    assert_eq!(riff_module.validity, Some(Validity::True));

    let best = wave_record.best_format().unwrap();
    assert_eq!(best.canonical, Some(FormatId::native("wave")));
    assert_eq!(best.confidence, Confidence::PositiveSpecific);

    // The text file: identified heuristically, but no format-specific
    // handler is bound, so only the identifier ran.
    let text = child_by_name(&store, root, "notes.txt");
    assert_eq!(module_names(&store, text), vec!["fathom/identifier"]);
    let text_record = store.retrieve_source(text).unwrap();
    assert!(text_record
        .messages
        .iter()
        .any(|m| m.text.contains("no handler bound")));
}

// ─── Scenario B: shapefile clump ───────────────────────────────────

#[test]
fn shapefile_siblings_form_one_clump() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["abc.shp", "abc.dbf", "abc.prj"] {
        std::fs::write(dir.path().join(name), b"stub geometry").unwrap();
    }
    std::fs::write(dir.path().join("readme.txt"), b"unrelated\n").unwrap();

    let mut store = MemoryStore::new();
    let root = characterize_dir(&mut store, FathomConfig::default(), dir.path());

    let clumps = clump_ids(&store);
    assert_eq!(clumps.len(), 1, "exactly one clump should exist");
    let clump = clumps[0];

    let clump_record = store.retrieve_source(clump).unwrap();
    assert_eq!(clump_record.parent, Some(root));
    let member_names: Vec<String> = clump_record
        .children
        .iter()
        .map(|&c| store.retrieve_source(c).unwrap().kind.display_name())
        .collect();
    assert_eq!(member_names, vec!["abc.dbf", "abc.prj", "abc.shp"]);
    for &member in &clump_record.children {
        assert_eq!(store.retrieve_source(member).unwrap().parent, Some(clump));
    }

    let identification = clump_record.best_format().unwrap();
    assert_eq!(identification.reported, FormatId::native("esri-shapefile"));
    assert_eq!(identification.confidence, Confidence::Tentative);
    assert!(module_names(&store, clump).contains(&"fathom/shapefile-aggregator".to_string()));

    // The unrelated file stays an independent child of the directory.
    let readme = child_by_name(&store, root, "readme.txt");
    assert_eq!(store.retrieve_source(readme).unwrap().parent, Some(root));
    assert_eq!(store.retrieve_source(root).unwrap().children.len(), 2);
}

// ─── Scenario C: no identifier configured ──────────────────────────

#[test]
fn missing_identifier_is_tolerated() {
    let chr = Characterizer::builder()
        .config(FathomConfig::default())
        .registry(fathom::handlers::builtin_registry())
        .build();

    let mut store = MemoryStore::new();
    let root = store
        .persist_source(SourceRecord::new(SourceKind::FileSet))
        .unwrap();
    let a = store
        .persist_source(SourceRecord::new(SourceKind::File { path: "/a".into() }))
        .unwrap();
    let b = store
        .persist_source(SourceRecord::new(SourceKind::File { path: "/b".into() }))
        .unwrap();
    store.add_child(root, a).unwrap();
    store.add_child(root, b).unwrap();

    chr.characterize(&mut store, root).unwrap();

    for id in [root, a, b] {
        assert!(store.retrieve_source(id).unwrap().formats.is_empty());
    }
    assert!(store.retrieve_source(root).unwrap().timer.duration_ms().is_some());
}

// ─── Digest invocation rule ────────────────────────────────────────

#[test]
fn digests_follow_the_global_switch() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"some text\n").unwrap();

    // Switch on: the file is digested, the aggregate directory is not.
    let mut store = MemoryStore::new();
    let root = characterize_dir(
        &mut store,
        FathomConfig { compute_digests: true, ..FathomConfig::default() },
        dir.path(),
    );
    let file = child_by_name(&store, root, "notes.txt");
    let file_record = store.retrieve_source(file).unwrap();
    assert!(file_record.property("digest.sha256").is_some());
    assert!(file_record.property("digest.crc32").is_some());
    assert!(module_names(&store, file).contains(&"fathom/digester".to_string()));

    let root_record = store.retrieve_source(root).unwrap();
    assert!(root_record.property("digest.sha256").is_none());
    assert!(!module_names(&store, root).contains(&"fathom/digester".to_string()));

    // Switch off: no digests anywhere.
    let mut store = MemoryStore::new();
    let root = characterize_dir(&mut store, FathomConfig::default(), dir.path());
    let file = child_by_name(&store, root, "notes.txt");
    assert!(store
        .retrieve_source(file)
        .unwrap()
        .property("digest.sha256")
        .is_none());
}

// ─── Multiple inputs & error isolation ─────────────────────────────

#[test]
fn multiple_inputs_are_grouped_under_a_file_set() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    std::fs::write(&a, b"aaa\n").unwrap();
    std::fs::write(&b, b"bbb\n").unwrap();

    let mut store = MemoryStore::new();
    let chr = Characterizer::with_builtins(FathomConfig::default());
    let root = chr
        .characterize_all(
            &mut store,
            &[
                a.to_string_lossy().into_owned(),
                b.to_string_lossy().into_owned(),
            ],
        )
        .unwrap();

    let record = store.retrieve_source(root).unwrap();
    assert_eq!(record.kind, SourceKind::FileSet);
    assert_eq!(record.children.len(), 2);
    // Both children were actually characterized through the file-set
    // handler's recursion.
    for &child in &record.children {
        assert!(!store.retrieve_source(child).unwrap().formats.is_empty());
    }
    assert!(module_names(&store, root).contains(&"fathom/file-set-handler".to_string()));
}

#[test]
fn unreadable_sibling_does_not_poison_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("good.txt"), b"fine\n").unwrap();
    // A dangling symlink: discovered as a child, but unreadable.
    #[cfg(unix)]
    std::os::unix::fs::symlink(
        dir.path().join("missing-target"),
        dir.path().join("broken.txt"),
    )
    .unwrap();

    let mut store = MemoryStore::new();
    let root = characterize_dir(&mut store, FathomConfig::default(), dir.path());

    let good = child_by_name(&store, root, "good.txt");
    assert!(!store.retrieve_source(good).unwrap().formats.is_empty());

    #[cfg(unix)]
    {
        let broken = child_by_name(&store, root, "broken.txt");
        let record = store.retrieve_source(broken).unwrap();
        assert!(record
            .messages
            .iter()
            .any(|m| m.text.contains("characterization failed")));
        // The run itself still completed and the root closed its timer.
        assert!(store.retrieve_source(root).unwrap().timer.duration_ms().is_some());
    }
}

#[test]
fn repeated_runs_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sound.wav"), wave_bytes()).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"text\n").unwrap();

    let mut first = MemoryStore::new();
    let root_a = characterize_dir(&mut first, FathomConfig::default(), dir.path());
    let mut second = MemoryStore::new();
    let root_b = characterize_dir(&mut second, FathomConfig::default(), dir.path());

    let names_a: Vec<String> = first
        .retrieve_source(root_a)
        .unwrap()
        .children
        .iter()
        .map(|&c| first.retrieve_source(c).unwrap().kind.display_name())
        .collect();
    let names_b: Vec<String> = second
        .retrieve_source(root_b)
        .unwrap()
        .children
        .iter()
        .map(|&c| second.retrieve_source(c).unwrap().kind.display_name())
        .collect();
    assert_eq!(names_a, names_b);
    assert_eq!(module_names(&first, root_a), module_names(&second, root_b));
}
