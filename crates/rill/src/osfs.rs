//! The OS abstraction the runtime uses for all file I/O.
//!
//! Paths are resolved against a configured base directory; traversal outside
//! the base is rejected before any I/O happens.

use std::{
    fs,
    io::{Read, Write},
    path::{Component, Path, PathBuf},
};

use crate::errors::{Error, RunResult};

/// Metadata returned by [`Fs::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Flags for [`Fs::open_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
}

/// Callback for [`Fs::walk_dir`]; receives each path relative to the walk
/// root along with its entry.
pub type WalkDirFn<'a> = &'a mut dyn FnMut(&str, &DirEntry) -> RunResult<()>;

/// The filesystem interface consumed by the `os` module and the local
/// importer.
pub trait Fs: Send + Sync {
    fn create(&self, name: &str) -> RunResult<Box<dyn Write + Send>>;
    fn mkdir(&self, name: &str) -> RunResult<()>;
    fn mkdir_all(&self, name: &str) -> RunResult<()>;
    fn open(&self, name: &str) -> RunResult<Box<dyn Read + Send>>;
    fn open_file(&self, name: &str, flags: OpenFlags) -> RunResult<Box<dyn Write + Send>>;
    fn read_file(&self, name: &str) -> RunResult<Vec<u8>>;
    fn write_file(&self, name: &str, data: &[u8]) -> RunResult<()>;
    fn remove(&self, name: &str) -> RunResult<()>;
    fn remove_all(&self, name: &str) -> RunResult<()>;
    fn rename(&self, from: &str, to: &str) -> RunResult<()>;
    fn stat(&self, name: &str) -> RunResult<FileStat>;
    fn symlink(&self, old: &str, new: &str) -> RunResult<()>;
    fn read_dir(&self, name: &str) -> RunResult<Vec<DirEntry>>;
    fn walk_dir(&self, root: &str, f: WalkDirFn) -> RunResult<()>;
}

/// A local filesystem confined to a base directory.
#[derive(Debug, Clone)]
pub struct LocalFs {
    base: PathBuf,
}

impl LocalFs {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolves a script-provided path under the base, rejecting any path
    /// that would climb out of it. Absolute paths are re-rooted at the base.
    fn resolve(&self, path: &str, op: &str) -> RunResult<PathBuf> {
        let mut resolved = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(Error::value_error(format!(
                            "invalid path for {op}: {path}"
                        )));
                    }
                }
                Component::Normal(part) => resolved.push(part),
            }
        }
        Ok(self.base.join(resolved))
    }
}

fn io_error(op: &str, name: &str, err: &std::io::Error) -> Error {
    Error::eval_error(format!("{op} {name}: {err}"))
}

impl Fs for LocalFs {
    fn create(&self, name: &str) -> RunResult<Box<dyn Write + Send>> {
        let path = self.resolve(name, "create")?;
        let file = fs::File::create(path).map_err(|err| io_error("create", name, &err))?;
        Ok(Box::new(file))
    }

    fn mkdir(&self, name: &str) -> RunResult<()> {
        let path = self.resolve(name, "mkdir")?;
        fs::create_dir(path).map_err(|err| io_error("mkdir", name, &err))
    }

    fn mkdir_all(&self, name: &str) -> RunResult<()> {
        let path = self.resolve(name, "mkdir")?;
        fs::create_dir_all(path).map_err(|err| io_error("mkdir", name, &err))
    }

    fn open(&self, name: &str) -> RunResult<Box<dyn Read + Send>> {
        let path = self.resolve(name, "open")?;
        let file = fs::File::open(path).map_err(|err| io_error("open", name, &err))?;
        Ok(Box::new(file))
    }

    fn open_file(&self, name: &str, flags: OpenFlags) -> RunResult<Box<dyn Write + Send>> {
        let path = self.resolve(name, "open")?;
        let file = fs::OpenOptions::new()
            .write(flags.write || flags.append)
            .append(flags.append)
            .create(flags.create)
            .truncate(flags.truncate)
            .open(path)
            .map_err(|err| io_error("open", name, &err))?;
        Ok(Box::new(file))
    }

    fn read_file(&self, name: &str) -> RunResult<Vec<u8>> {
        let path = self.resolve(name, "read")?;
        fs::read(path).map_err(|err| io_error("read", name, &err))
    }

    fn write_file(&self, name: &str, data: &[u8]) -> RunResult<()> {
        let path = self.resolve(name, "write")?;
        fs::write(path, data).map_err(|err| io_error("write", name, &err))
    }

    fn remove(&self, name: &str) -> RunResult<()> {
        let path = self.resolve(name, "remove")?;
        if path.is_dir() {
            fs::remove_dir(path).map_err(|err| io_error("remove", name, &err))
        } else {
            fs::remove_file(path).map_err(|err| io_error("remove", name, &err))
        }
    }

    fn remove_all(&self, name: &str) -> RunResult<()> {
        let path = self.resolve(name, "remove")?;
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(|err| io_error("remove", name, &err))
        } else if path.exists() {
            fs::remove_file(path).map_err(|err| io_error("remove", name, &err))
        } else {
            Ok(())
        }
    }

    fn rename(&self, from: &str, to: &str) -> RunResult<()> {
        let from_path = self.resolve(from, "rename")?;
        let to_path = self.resolve(to, "rename")?;
        fs::rename(from_path, to_path).map_err(|err| io_error("rename", from, &err))
    }

    fn stat(&self, name: &str) -> RunResult<FileStat> {
        let path = self.resolve(name, "stat")?;
        let meta = fs::metadata(&path).map_err(|err| io_error("stat", name, &err))?;
        Ok(FileStat {
            name: name.to_owned(),
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn symlink(&self, old: &str, new: &str) -> RunResult<()> {
        let old_path = self.resolve(old, "symlink")?;
        let new_path = self.resolve(new, "symlink")?;
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(old_path, new_path)
                .map_err(|err| io_error("symlink", old, &err))
        }
        #[cfg(not(unix))]
        {
            let _ = (old_path, new_path);
            Err(Error::eval_error("symlink is not supported on this platform"))
        }
    }

    fn read_dir(&self, name: &str) -> RunResult<Vec<DirEntry>> {
        let path = self.resolve(name, "read")?;
        let entries = fs::read_dir(path).map_err(|err| io_error("read", name, &err))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_error("read", name, &err))?;
            let is_dir = entry
                .file_type()
                .map_err(|err| io_error("read", name, &err))?
                .is_dir();
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn walk_dir(&self, root: &str, f: WalkDirFn) -> RunResult<()> {
        fn walk(fs: &LocalFs, prefix: &str, f: WalkDirFn) -> RunResult<()> {
            for entry in fs.read_dir(prefix)? {
                let path = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{prefix}/{}", entry.name)
                };
                f(&path, &entry)?;
                if entry.is_dir {
                    walk(fs, &path, f)?;
                }
            }
            Ok(())
        }
        walk(self, root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal() {
        let fs = LocalFs::new("/tmp/base");
        let err = fs.resolve("../outside", "read").expect_err("should fail");
        assert_eq!(err.to_string(), "value error: invalid path for read: ../outside");
    }

    #[test]
    fn resolves_inside_base() {
        let fs = LocalFs::new("/tmp/base");
        let path = fs.resolve("a/./b/../c.rill", "read").expect("resolve");
        assert_eq!(path, PathBuf::from("/tmp/base/a/c.rill"));
    }

    #[test]
    fn reroots_absolute_paths() {
        let fs = LocalFs::new("/tmp/base");
        let path = fs.resolve("/etc/passwd", "read").expect("resolve");
        assert_eq!(path, PathBuf::from("/tmp/base/etc/passwd"));
    }

    #[test]
    fn round_trips_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        fs.write_file("hello.txt", b"hi").expect("write");
        assert_eq!(fs.read_file("hello.txt").expect("read"), b"hi");
        let stat = fs.stat("hello.txt").expect("stat");
        assert_eq!(stat.size, 2);
        assert!(!stat.is_dir);
        fs.remove("hello.txt").expect("remove");
        assert!(fs.read_file("hello.txt").is_err());
    }

    #[test]
    fn walks_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs = LocalFs::new(dir.path());
        fs.mkdir_all("a/b").expect("mkdir");
        fs.write_file("a/b/c.txt", b"x").expect("write");
        let mut seen = Vec::new();
        fs.walk_dir("", &mut |path, _entry| {
            seen.push(path.to_owned());
            Ok(())
        })
        .expect("walk");
        assert_eq!(seen, vec!["a", "a/b", "a/b/c.txt"]);
    }
}
