//! Capability-based file access for CLI inputs and the score database.

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

use crate::CliError;

/// Open `path` for reading.
pub(crate) fn open_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    let missing = || CliError::MissingSourceFile {
        field,
        path: path.to_path_buf(),
    };
    let parent = parent_or_cwd(path);
    let Some(name) = path.file_name() else {
        return Err(missing());
    };
    let inspected = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.metadata(name));
    match inspected {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(missing()),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Err(missing()),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create the directory that will hold the database at `path`.
pub(crate) fn ensure_parent_dir(path: &Utf8Path) -> Result<(), CliError> {
    let prepare = |source| CliError::PrepareDatabase {
        path: path.to_path_buf(),
        source,
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base, relative) = split_anchor(parent).map_err(prepare)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())
        .and_then(|dir| dir.create_dir_all(&relative))
        .map_err(prepare)
}

fn parent_or_cwd(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

/// Split `dir` into an ambient anchor (root, drive prefix or `.`) and the
/// relative remainder cap-std can create beneath it.
fn split_anchor(dir: &Utf8Path) -> io::Result<(Utf8PathBuf, Utf8PathBuf)> {
    let std_dir = dir.as_std_path();
    let base = match std_dir.components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(drive).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => return Ok((Utf8PathBuf::from("."), dir.to_path_buf())),
    };
    let relative = dir
        .strip_prefix(&base)
        .map_err(|_| io::Error::other("failed to strip anchor from database path"))?
        .to_path_buf();
    Ok((base, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/var/lib/homescore", "/", "var/lib/homescore")]
    #[case("data/scores", ".", "data/scores")]
    fn splits_anchor_from_remainder(
        #[case] dir: &str,
        #[case] base: &str,
        #[case] relative: &str,
    ) {
        let (anchor, rest) = split_anchor(Utf8Path::new(dir))
            .unwrap_or_else(|err| panic!("split {dir}: {err}"));
        assert_eq!(anchor, Utf8PathBuf::from(base));
        assert_eq!(rest, Utf8PathBuf::from(relative));
    }
}
