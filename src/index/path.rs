//! File-name hashing for indexed definitions.
//!
//! Two definitions with the same name and tag are told apart by a 64-bit
//! hash of the source file they were declared in. Components are hashed in
//! reverse order so that paths which differ only in a distant prefix still
//! compare quickly, and each directory component is followed by a slash. A
//! collision would merge two definitions, which at 64 bits is unlikely
//! enough, especially combined with the name and tag.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Yields the components of `path` from last to first, normalizing `.`,
/// `..`, and repeated slashes away.
pub(crate) struct ReverseComponents<'a> {
    path: &'a [u8],
    /// One past the end of the unconsumed prefix.
    end: usize,
    /// Components still owed to `..` entries seen further right.
    dot_dot: usize,
}

impl<'a> ReverseComponents<'a> {
    pub fn new(path: &'a [u8]) -> Self {
        ReverseComponents {
            path,
            end: path.len(),
            dot_dot: 0,
        }
    }
}

impl<'a> Iterator for ReverseComponents<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        loop {
            while self.end > 0 && self.path[self.end - 1] == b'/' {
                self.end -= 1;
            }
            if self.end == 0 {
                return None;
            }
            let mut start = self.end;
            while start > 0 && self.path[start - 1] != b'/' {
                start -= 1;
            }
            let component = &self.path[start..self.end];
            self.end = start;
            match component {
                b"." => continue,
                b".." => {
                    self.dot_dot += 1;
                    continue;
                }
                _ if self.dot_dot > 0 => {
                    self.dot_dot -= 1;
                    continue;
                }
                _ => return Some(component),
            }
        }
    }
}

/// Hashes the directory part of a file-name-table entry. The returned state
/// is continued with the file component by [`hash_file`].
pub(crate) fn hash_directory(path: &[u8]) -> DefaultHasher {
    let mut hasher = DefaultHasher::new();
    for component in ReverseComponents::new(path) {
        hasher.write(component);
        hasher.write(b"/");
    }
    hasher
}

pub(crate) fn hash_file(directory: Option<&DefaultHasher>, name: &[u8]) -> u64 {
    let mut hasher = directory.cloned().unwrap_or_default();
    hasher.write(name);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(path: &[u8]) -> Vec<&[u8]> {
        ReverseComponents::new(path).collect()
    }

    #[test]
    fn reverse_order() {
        assert_eq!(components(b"/usr/include"), vec![b"include" as &[u8], b"usr"]);
    }

    #[test]
    fn normalization() {
        assert_eq!(components(b"a//b/./c/"), vec![b"c" as &[u8], b"b", b"a"]);
        assert_eq!(components(b"a/b/../c"), vec![b"c" as &[u8], b"a"]);
        assert_eq!(components(b".."), Vec::<&[u8]>::new());
    }

    #[test]
    fn equivalent_paths_hash_alike() {
        let a = hash_file(Some(&hash_directory(b"/usr/include")), b"stdio.h");
        let b = hash_file(Some(&hash_directory(b"/usr//include/.")), b"stdio.h");
        assert_eq!(a, b);
    }

    #[test]
    fn different_directories_hash_apart() {
        let a = hash_file(Some(&hash_directory(b"/usr/include")), b"stdio.h");
        let b = hash_file(Some(&hash_directory(b"/usr/local")), b"stdio.h");
        assert_ne!(a, b);
    }

    #[test]
    fn no_directory_hashes_the_bare_name() {
        let a = hash_file(None, b"main.c");
        let b = hash_file(Some(&hash_directory(b"")), b"main.c");
        assert_eq!(a, b);
    }
}
