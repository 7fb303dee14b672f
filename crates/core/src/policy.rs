use crate::filename::{filename_candidate, MediaFile};
use crate::metadata::WRITE_TARGET_TAGS;
use crate::timestamp::CanonicalTimestamp;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    MoveByTag,
    WriteByFilename,
    SetCtimeByFilename,
    Compare,
    Sequential { base: CanonicalTimestamp },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Rename {
        from: PathBuf,
        to: PathBuf,
    },
    WriteTags {
        path: PathBuf,
        tags: &'static [&'static str],
        value: CanonicalTimestamp,
    },
    SetFileTimes {
        path: PathBuf,
        value: CanonicalTimestamp,
    },
    Report {
        path: PathBuf,
        value: CanonicalTimestamp,
    },
}

// A missing target never agrees with a present source.
fn agrees(source: &CanonicalTimestamp, target: Option<&CanonicalTimestamp>) -> bool {
    target.is_some_and(|target| target == source)
}

pub fn move_by_tag(
    file: &MediaFile,
    tag: Option<&CanonicalTimestamp>,
    name: Option<&CanonicalTimestamp>,
    force: bool,
) -> Vec<Action> {
    let Some(tag) = tag else {
        return Vec::new();
    };
    if !force && agrees(tag, name) {
        return Vec::new();
    }
    vec![Action::Rename {
        from: file.path().to_path_buf(),
        to: file.renamed_to(tag.as_str()),
    }]
}

pub fn write_by_filename(
    file: &MediaFile,
    tag: Option<&CanonicalTimestamp>,
    name: Option<&CanonicalTimestamp>,
    force: bool,
) -> Vec<Action> {
    let Some(name) = name else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    if force || !agrees(name, tag) {
        actions.push(Action::WriteTags {
            path: file.path().to_path_buf(),
            tags: WRITE_TARGET_TAGS,
            value: name.clone(),
        });
    }
    if !file.basename().starts_with(name.as_str()) {
        actions.push(Action::Rename {
            from: file.path().to_path_buf(),
            to: file.renamed_to(name.as_str()),
        });
    }
    actions
}

pub fn set_ctime_by_filename(file: &MediaFile, stamp: Option<&CanonicalTimestamp>) -> Vec<Action> {
    stamp
        .map(|value| Action::SetFileTimes {
            path: file.path().to_path_buf(),
            value: value.clone(),
        })
        .into_iter()
        .collect()
}

pub fn compare(
    file: &MediaFile,
    tag: Option<&CanonicalTimestamp>,
    name: Option<&CanonicalTimestamp>,
    force: bool,
) -> Vec<Action> {
    let Some(tag) = tag else {
        return Vec::new();
    };
    if !force && agrees(tag, name) {
        return Vec::new();
    }
    vec![Action::Report {
        path: file.path().to_path_buf(),
        value: tag.clone(),
    }]
}

pub fn sequential(file: &MediaFile, assigned: &CanonicalTimestamp) -> Vec<Action> {
    let target = file.renamed_to(assigned.as_str());
    let mut actions = vec![Action::Rename {
        from: file.path().to_path_buf(),
        to: target.clone(),
    }];

    let Some(renamed) = MediaFile::new(target) else {
        return actions;
    };
    match filename_candidate(renamed.basename(), None) {
        Some(name) => actions.extend(write_by_filename(&renamed, None, Some(&name), true)),
        None => debug!(
            file = %renamed.path().display(),
            "assigned name does not parse back, skipping tag write"
        ),
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> CanonicalTimestamp {
        CanonicalTimestamp::parse(s).expect("valid canonical timestamp")
    }

    fn file(path: &str) -> MediaFile {
        MediaFile::new(path).expect("path has basename")
    }

    fn name_of(f: &MediaFile) -> Option<CanonicalTimestamp> {
        filename_candidate(f.basename(), None)
    }

    #[test]
    fn move_is_noop_when_name_matches_tag() {
        let f = file("/p/2020-01-01_10-00-00.jpg");
        let tag = ts("2020-01-01_10-00-00");
        assert!(move_by_tag(&f, Some(&tag), name_of(&f).as_ref(), false).is_empty());
    }

    #[test]
    fn move_renames_on_mismatch() {
        let f = file("/p/2020-01-01_10-00-00.jpg");
        let tag = ts("2020-01-01_11-30-00");
        assert_eq!(
            move_by_tag(&f, Some(&tag), name_of(&f).as_ref(), false),
            vec![Action::Rename {
                from: PathBuf::from("/p/2020-01-01_10-00-00.jpg"),
                to: PathBuf::from("/p/2020-01-01_11-30-00.jpg"),
            }]
        );
    }

    #[test]
    fn move_renames_non_canonical_names() {
        let f = file("/p/IMG_0001.JPG");
        let tag = ts("2021-06-15_08-00-00");
        let actions = move_by_tag(&f, Some(&tag), name_of(&f).as_ref(), false);
        assert_eq!(
            actions,
            vec![Action::Rename {
                from: PathBuf::from("/p/IMG_0001.JPG"),
                to: PathBuf::from("/p/2021-06-15_08-00-00.jpg"),
            }]
        );
    }

    #[test]
    fn move_is_idempotent() {
        let f = file("/p/IMG_0001.jpg");
        let tag = ts("2021-06-15_08-00-00");
        let first = move_by_tag(&f, Some(&tag), name_of(&f).as_ref(), false);
        let Some(Action::Rename { to, .. }) = first.first() else {
            panic!("first run should rename");
        };
        let moved = MediaFile::new(to.clone()).expect("basename");
        assert!(move_by_tag(&moved, Some(&tag), name_of(&moved).as_ref(), false).is_empty());
    }

    #[test]
    fn force_renames_even_when_matching() {
        let f = file("/p/2020-01-01_10-00-00.JPG");
        let tag = ts("2020-01-01_10-00-00");
        let actions = move_by_tag(&f, Some(&tag), name_of(&f).as_ref(), true);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn write_only_touches_tags_when_name_is_canonical() {
        let f = file("/p/2019-03-04_12-00-00.mov");
        let tag = ts("2001-01-01_00-00-00");
        let actions = write_by_filename(&f, Some(&tag), name_of(&f).as_ref(), false);
        assert_eq!(
            actions,
            vec![Action::WriteTags {
                path: PathBuf::from("/p/2019-03-04_12-00-00.mov"),
                tags: WRITE_TARGET_TAGS,
                value: ts("2019-03-04_12-00-00"),
            }]
        );
    }

    #[test]
    fn write_is_noop_when_tag_agrees() {
        let f = file("/p/2019-03-04_12-00-00.mov");
        let tag = ts("2019-03-04_12-00-00");
        assert!(write_by_filename(&f, Some(&tag), name_of(&f).as_ref(), false).is_empty());
        assert_eq!(
            write_by_filename(&f, Some(&tag), name_of(&f).as_ref(), true).len(),
            1
        );
    }

    #[test]
    fn write_renames_capture_tool_names() {
        let f = file("/p/Screenshot 2019-03-04 12.00.00.PNG");
        let name = ts("2019-03-04_12-00-00");
        let actions = write_by_filename(&f, None, Some(&name), false);
        assert_eq!(
            actions,
            vec![
                Action::WriteTags {
                    path: PathBuf::from("/p/Screenshot 2019-03-04 12.00.00.PNG"),
                    tags: WRITE_TARGET_TAGS,
                    value: name.clone(),
                },
                Action::Rename {
                    from: PathBuf::from("/p/Screenshot 2019-03-04 12.00.00.PNG"),
                    to: PathBuf::from("/p/2019-03-04_12-00-00.png"),
                },
            ]
        );
    }

    #[test]
    fn missing_source_yields_nothing() {
        let f = file("/p/IMG_0001.jpg");
        let tag = ts("2019-03-04_12-00-00");
        assert!(write_by_filename(&f, Some(&tag), None, true).is_empty());
        assert!(move_by_tag(&f, None, None, true).is_empty());
        assert!(compare(&f, None, None, true).is_empty());
        assert!(set_ctime_by_filename(&f, None).is_empty());
    }

    #[test]
    fn compare_reports_only_mismatches() {
        let same = file("/p/2020-01-01_10-00-00.jpg");
        let other = file("/p/IMG_0001.jpg");
        let tag = ts("2020-01-01_10-00-00");

        assert!(compare(&same, Some(&tag), name_of(&same).as_ref(), false).is_empty());
        let report = compare(&other, Some(&tag), name_of(&other).as_ref(), false);
        assert_eq!(
            report,
            vec![Action::Report {
                path: PathBuf::from("/p/IMG_0001.jpg"),
                value: tag,
            }]
        );
    }

    #[test]
    fn ctime_sets_times_for_matching_names() {
        let dir = file("/albums/2019");
        let stamp = ts("2019-01-02_12-00-00");
        assert_eq!(
            set_ctime_by_filename(&dir, Some(&stamp)),
            vec![Action::SetFileTimes {
                path: PathBuf::from("/albums/2019"),
                value: stamp,
            }]
        );
    }

    #[test]
    fn sequential_renames_then_forces_tag_write() {
        let f = file("/scan/page.TIF");
        let assigned = ts("2022-01-01_00-01-00");
        let actions = sequential(&f, &assigned);
        assert_eq!(
            actions,
            vec![
                Action::Rename {
                    from: PathBuf::from("/scan/page.TIF"),
                    to: PathBuf::from("/scan/2022-01-01_00-01-00.tif"),
                },
                Action::WriteTags {
                    path: PathBuf::from("/scan/2022-01-01_00-01-00.tif"),
                    tags: WRITE_TARGET_TAGS,
                    value: assigned.clone(),
                },
            ]
        );
    }
}
