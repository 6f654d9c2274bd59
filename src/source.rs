//! Expansion of command line sources into list entries.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use walkdir::WalkDir;

use crate::entry::{ImageEntry, SRC_EXEC, SRC_STDIN};
use crate::list::{EntryId, ImageList};

/// Absolute form of `path` with `.` and `..` folded, without touching the
/// filesystem beyond reading the current directory.
pub fn abspath(path: &str) -> Option<String> {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        let cwd = std::env::current_dir().ok()?;
        format!("{}/{}", cwd.to_str()?, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

fn with_slash(mut path: String) -> String {
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

impl ImageList {
    /// One-time construction from command line sources.
    ///
    /// Returns the entry to show first, `None` if nothing usable was found.
    pub fn load(&mut self, sources: &[String]) -> Option<EntryId> {
        debug_assert!(self.is_empty(), "image list already loaded");

        let first = if self.opts.from_file {
            self.load_fromfile(sources)
        } else {
            self.load_sources(sources)
        };
        self.reindex();

        log::info!(
            "image list loaded: {} entries, {} order",
            self.len(),
            self.opts.order.name()
        );
        first
    }

    fn load_sources(&mut self, sources: &[String]) -> Option<EntryId> {
        match sources {
            [] => {
                self.opts.all_files = false;
                self.add_source(".")
            }
            [single] if single == "-" => self.add_source(SRC_STDIN),
            [single] => {
                if self.opts.all_files && Path::new(single).is_dir() {
                    self.opts.all_files = false;
                }
                let first = self.add_source(single)?;
                if self.opts.all_files {
                    let dir = self.get(first).map(|e| format!("{}/", e.dir_prefix()));
                    if let Some(dir) = dir {
                        self.add_dir(&dir);
                    }
                }
                Some(first)
            }
            many => {
                self.opts.all_files = false;
                let mut first = None;
                for source in many {
                    let added = self.add_source(source);
                    first = first.or(added);
                }
                first
            }
        }
    }

    fn load_fromfile(&mut self, files: &[String]) -> Option<EntryId> {
        self.opts.all_files = false;

        for file in files {
            let handle = match fs::File::open(file) {
                Ok(handle) => handle,
                Err(err) => {
                    log::warn!("unable to open list file {file}: {err}");
                    continue;
                }
            };
            for line in BufReader::new(handle).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        log::warn!("error reading list file {file}: {err}");
                        break;
                    }
                };
                let line = line.trim_end_matches(['\r', '\n']);
                if !line.is_empty() {
                    self.add_source(line);
                }
            }
        }

        self.first()
    }

    /// Adds a file, a directory or a pseudo source.
    ///
    /// For directories the first entry of the directory is returned.
    pub fn add_source(&mut self, source: &str) -> Option<EntryId> {
        if source.starts_with(SRC_STDIN) || source.starts_with(SRC_EXEC) {
            return Some(self.insert(ImageEntry::new(source)));
        }

        let meta = match fs::metadata(source) {
            Ok(meta) => meta,
            Err(err) => {
                log::warn!("ignore file {source}: {err}");
                return None;
            }
        };
        let Some(path) = abspath(source) else {
            log::warn!("ignore file {source}: unknown absolute path");
            return None;
        };

        if meta.is_dir() {
            return self.add_dir(&with_slash(path));
        }
        if meta.is_file() {
            let id = self.insert(ImageEntry::from_metadata(path.clone(), &meta));
            if !self.opts.all_files {
                if let Some(monitor) = self.monitor.as_mut() {
                    monitor.register(&path);
                }
            }
            return Some(id);
        }

        log::warn!("ignore special file {source}");
        None
    }

    /// Adds regular files of `dir` (which ends with `/`), descending into
    /// subdirectories in recursive mode. Returns the first entry, in list
    /// order, among those the scan added or found.
    pub(crate) fn add_dir(&mut self, dir: &str) -> Option<EntryId> {
        if let Err(err) = fs::read_dir(dir) {
            log::warn!("unable to read directory {dir}: {err}");
            return None;
        }

        let mut walker = WalkDir::new(dir).follow_links(true).min_depth(1);
        if !self.opts.recursive {
            walker = walker.max_depth(1);
        }

        let mut found: Vec<EntryId> = Vec::new();
        let mut watched = vec![dir.to_string()];
        for item in walker {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    // symlink loops end up here too
                    log::warn!("skip in {dir}: {err}");
                    continue;
                }
            };
            let Some(path) = item.path().to_str() else {
                log::debug!("skip non UTF-8 name in {dir}");
                continue;
            };
            let file_type = item.file_type();
            if file_type.is_dir() {
                watched.push(with_slash(path.to_string()));
            } else if file_type.is_file() {
                match item.metadata() {
                    Ok(meta) => found.push(self.insert(ImageEntry::from_metadata(path, &meta))),
                    Err(err) => log::warn!("ignore file {path}: {err}"),
                }
            }
        }

        if let Some(monitor) = self.monitor.as_mut() {
            for path in &watched {
                monitor.register(path);
            }
        }

        found
            .into_iter()
            .filter_map(|id| self.get(id).map(|e| (e.index(), id)))
            .min_by_key(|(index, _)| *index)
            .map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ListOptions;
    use crate::order::Order;
    use crate::watch::Monitor;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Monitor for Recorder {
        fn register(&mut self, path: &str) {
            self.0.lock().unwrap().push(path.to_string());
        }
        fn unregister_all(&mut self) {
            self.0.lock().unwrap().clear();
        }
    }

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("a.png"));
        fs::create_dir(dir.path().join("sub")).unwrap();
        touch(&dir.path().join("sub").join("c.png"));
        dir
    }

    fn root(dir: &tempfile::TempDir) -> String {
        dir.path().to_str().unwrap().to_string()
    }

    fn list(opts: ListOptions) -> ImageList {
        ImageList::new(ListOptions {
            order: Order::Alpha,
            ..opts
        })
    }

    #[test]
    fn abspath_folds_dots() {
        assert_eq!(abspath("/a/b/../c/./d").unwrap(), "/a/c/d");
        assert_eq!(abspath("/../..").unwrap(), "/");
        assert_eq!(abspath("//a//b/").unwrap(), "/a/b");
        assert!(abspath("rel").unwrap().starts_with('/'));
        assert!(abspath("rel").unwrap().ends_with("/rel"));
    }

    #[test]
    fn directory_scan_is_flat_by_default() {
        let dir = tree();
        let mut list = list(ListOptions::default());
        let first = list.load(&[root(&dir)]).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(first).unwrap().source(), format!("{}/a.png", root(&dir)));
    }

    #[test]
    fn recursive_scan_descends() {
        let dir = tree();
        let mut list = list(ListOptions {
            recursive: true,
            ..ListOptions::default()
        });
        let first = list.load(&[root(&dir)]).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(first).unwrap().index(), 1);
        assert!(list.find(&format!("{}/sub/c.png", root(&dir))).is_some());
    }

    #[test]
    fn unusable_sources_are_skipped() {
        let dir = tree();
        let mut list = list(ListOptions::default());
        let missing = format!("{}/missing.png", root(&dir));
        let good = format!("{}/b.png", root(&dir));
        let first = list.load(&[missing, good.clone()]).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(first).unwrap().source(), good);

        let mut empty = self::list(ListOptions::default());
        assert!(empty.load(&[format!("{}/nothing", root(&dir))]).is_none());
        assert!(empty.is_empty());
    }

    #[test]
    fn all_mode_adds_neighbours() {
        let dir = tree();
        let mut list = list(ListOptions {
            all_files: true,
            ..ListOptions::default()
        });
        let file = format!("{}/b.png", root(&dir));
        let first = list.load(&[file.clone()]).unwrap();
        assert_eq!(list.get(first).unwrap().source(), file);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn dash_means_stdin() {
        let mut list = list(ListOptions::default());
        let first = list.load(&["-".to_string()]).unwrap();
        assert_eq!(list.get(first).unwrap().source(), SRC_STDIN);
    }

    #[test]
    fn list_files_are_read_line_by_line() {
        let dir = tree();
        let listing = dir.path().join("list.txt");
        fs::write(
            &listing,
            format!("{0}/b.png\r\n\n{0}/sub/c.png\nexec://true\n", root(&dir)),
        )
        .unwrap();
        let mut list = list(ListOptions {
            from_file: true,
            ..ListOptions::default()
        });
        let sources = [
            listing.to_str().unwrap().to_string(),
            format!("{}/no-such-list", root(&dir)),
        ];
        let first = list.load(&sources).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.first(), Some(first));
    }

    #[test]
    fn watches_are_registered() {
        let dir = tree();
        let recorder = Recorder::default();
        let mut list = list(ListOptions::default());
        list.set_monitor(Box::new(recorder.clone()));
        let file = format!("{}/a.png", root(&dir));
        list.load(&[file.clone(), root(&dir)]);
        let watched = recorder.0.lock().unwrap().clone();
        assert!(watched.contains(&file));
        assert!(watched.contains(&format!("{}/", root(&dir))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loops_are_not_followed_forever() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        let mut list = list(ListOptions {
            recursive: true,
            ..ListOptions::default()
        });
        list.load(&[root(&dir)]);
        assert_eq!(list.len(), 3);
        assert!(list.iter().all(|(_, e)| !e.source().contains("/loop/")));
    }

    #[test]
    fn recursive_scan_watches_every_directory() {
        let dir = tree();
        let recorder = Recorder::default();
        let mut list = list(ListOptions {
            recursive: true,
            ..ListOptions::default()
        });
        list.set_monitor(Box::new(recorder.clone()));
        list.load(&[root(&dir)]);
        let watched = recorder.0.lock().unwrap().clone();
        assert!(watched.contains(&format!("{}/", root(&dir))));
        assert!(watched.contains(&format!("{}/sub/", root(&dir))));
    }
}
