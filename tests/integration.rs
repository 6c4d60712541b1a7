use std::fs;
use std::path::PathBuf;

use pkgmetadata_rs::{MetaDataXML, MetadataError};

const ESPEAK_NG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE pkgmetadata SYSTEM "https://www.gentoo.org/dtd/metadata.dtd">
<pkgmetadata>
	<maintainer type="person">
		<email>williamh@gentoo.org</email>
		<name>William Hubbs</name>
	</maintainer>
	<longdescription>
		eSpeak NG is a compact open source software text-to-speech synthesizer.
	</longdescription>
	<use>
		<flag name="async">Enables asynchronous commands</flag>
		<flag name="klatt">Enables Klatt formant synthesis and implementation</flag>
		<flag name="l10n_ru">Builds extended Russian Dictionary file</flag>
		<flag name="man">Builds and installs manpage with <pkg>app-text/ronn</pkg></flag>
		<flag name="mbrola">Adds support for mbrola voices</flag>
	</use>
	<upstream>
		<maintainer status="active">
			<email>msclrhd@gmail.com</email>
			<name>Reece H. Dunn</name>
		</maintainer>
		<changelog>https://github.com/espeak-ng/espeak-ng/releases.atom</changelog>
		<remote-id type="github">espeak-ng/espeak-ng</remote-id>
	</upstream>
</pkgmetadata>
"#;

fn write_metadata(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("metadata.xml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_real_world_metadata() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = write_metadata(&temp_dir, ESPEAK_NG);

    let md = MetaDataXML::new(&path).unwrap();
    assert_eq!(md.path(), path.as_path());

    let maintainers = md.maintainers();
    assert_eq!(maintainers.len(), 1);
    assert_eq!(maintainers[0].email(), Some("williamh@gentoo.org"));
    assert_eq!(maintainers[0].name(), Some("William Hubbs"));
    assert_eq!(maintainers[0].to_string(), "williamh@gentoo.org (William Hubbs)");

    let descriptions = md.descriptions();
    assert_eq!(descriptions.len(), 1);
    assert!(descriptions[0].text.as_deref().unwrap().contains("text-to-speech"));

    let flags: Vec<String> = md.use_flags().iter().map(|f| f.to_string()).collect();
    assert_eq!(
        flags,
        vec![
            "async -> Enables asynchronous commands",
            "klatt -> Enables Klatt formant synthesis and implementation",
            "l10n_ru -> Builds extended Russian Dictionary file",
            "man -> Builds and installs manpage with app-text/ronn",
            "mbrola -> Adds support for mbrola voices",
        ]
    );

    let upstream = md.upstream();
    assert_eq!(upstream.len(), 1);
    assert_eq!(upstream[0].maintainers[0].name(), Some("Reece H. Dunn"));
    assert_eq!(upstream[0].maintainers[0].status(), Some("active"));
    assert_eq!(
        upstream[0].changelogs,
        vec!["https://github.com/espeak-ng/espeak-ng/releases.atom"]
    );
    assert!(upstream[0].docs.is_empty());
    assert!(upstream[0].bugtrackers.is_empty());
    assert_eq!(upstream[0].remoteids[0].id, "espeak-ng/espeak-ng");
    assert_eq!(upstream[0].remoteids[0].site.as_deref(), Some("github"));
}

#[test]
fn test_repeated_calls_return_equal_results() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = write_metadata(&temp_dir, ESPEAK_NG);
    let md = MetaDataXML::new(&path).unwrap();

    let first = md.use_flags().to_vec();
    fs::write(&path, "<pkgmetadata/>").unwrap();
    assert_eq!(md.use_flags(), first.as_slice());
    assert_eq!(md.upstream(), md.upstream());
}

#[test]
fn test_order_preserved() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = write_metadata(
        &temp_dir,
        r#"<pkgmetadata>
  <maintainer><email>p1@gentoo.org</email></maintainer>
  <upstream><bugs-to>https://bugs/1</bugs-to><bugs-to>https://bugs/2</bugs-to></upstream>
  <maintainer><email>p2@gentoo.org</email></maintainer>
  <upstream><bugs-to>https://bugs/3</bugs-to></upstream>
  <maintainer><email>p3@gentoo.org</email></maintainer>
</pkgmetadata>"#,
    );
    let md = MetaDataXML::new(&path).unwrap();

    let emails: Vec<&str> = md.maintainers().iter().filter_map(|m| m.email()).collect();
    assert_eq!(emails, vec!["p1@gentoo.org", "p2@gentoo.org", "p3@gentoo.org"]);

    let bugs: Vec<&str> = md
        .upstream()
        .iter()
        .flat_map(|u| u.bugtrackers.iter().map(String::as_str))
        .collect();
    assert_eq!(bugs, vec!["https://bugs/1", "https://bugs/2", "https://bugs/3"]);
}

#[test]
fn test_shared_across_threads() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = write_metadata(&temp_dir, ESPEAK_NG);
    let md = MetaDataXML::new(&path).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| assert_eq!(md.use_flags().len(), 5));
        }
    });
}

#[test]
fn test_fatal_construction_errors() {
    let temp_dir = tempfile::TempDir::new().unwrap();

    let missing = MetaDataXML::new(temp_dir.path().join("metadata.xml"));
    assert!(matches!(missing, Err(MetadataError::Read { .. })));

    let path = write_metadata(&temp_dir, "<pkgmetadata><unclosed>");
    let malformed = MetaDataXML::new(&path);
    assert!(matches!(malformed, Err(MetadataError::Malformed { .. })));
}
