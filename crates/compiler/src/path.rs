//! Slash-separated import path helpers

/// Directory part of `path`, `.` when there is none
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ".",
        Some(index) => &path[..index],
    }
}

/// Join two paths and normalize the result
pub fn join_paths(base: &str, path: &str) -> String {
    normalize_path(&format!("{}/{}", base, path))
}

/// Resolve `.` and `..` segments and drop empty ones
///
/// `..` segments that climb above the start are discarded.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirname() {
        assert_eq!(dirname(""), ".");
        assert_eq!(dirname("base.roo"), ".");
        assert_eq!(dirname("lib/base.roo"), "lib");
        assert_eq!(dirname("a/b/c.roo"), "a/b");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths(".", "base.roo"), "base.roo");
        assert_eq!(join_paths("lib", "base.roo"), "lib/base.roo");
        assert_eq!(join_paths("lib", "../base.roo"), "base.roo");
        assert_eq!(join_paths("a/b", "./c/../d.roo"), "a/b/d.roo");
    }

    #[test]
    fn test_normalize_discards_leading_parent() {
        assert_eq!(normalize_path("../a.roo"), "a.roo");
        assert_eq!(normalize_path("./a//b.roo"), "a/b.roo");
    }
}
