//! Virtual path normalisation
//!
//! Resource paths are `/`-separated and always absolute. A leading resource
//! marker (`:` as in `:/images/logo.png`, or the URL form `qrc:`) is accepted
//! and ignored, as are empty and `.` segments. `..` drops the previous segment
//! and stops at the root.

/// URL scheme accepted in front of a resource path
pub const URL_SCHEME: &str = "qrc:";

/// Split a virtual path into normalised segments
pub fn segments(path: &str) -> Vec<&str> {
    let path = path.strip_prefix(URL_SCHEME).unwrap_or(path);
    let path = path.strip_prefix(':').unwrap_or(path);
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            name => out.push(name),
        }
    }
    out
}

/// Normalised lookup key: segments joined by `/`, root is the empty string
pub fn key(path: &str) -> String {
    segments(path).join("/")
}

/// Render a lookup key as an absolute path (`/` for the root)
pub fn display(key: &str) -> String {
    format!("/{key}")
}

/// Join a child name onto a lookup key
pub fn join(parent_key: &str, name: &str) -> String {
    if parent_key.is_empty() {
        name.to_string()
    } else {
        format!("{parent_key}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        assert_eq!(segments("/a/b/c"), vec!["a", "b", "c"]);
        assert_eq!(segments("a//b/./c/"), vec!["a", "b", "c"]);
        assert_eq!(segments(":/images/logo.png"), vec!["images", "logo.png"]);
        assert_eq!(segments("/a/../b"), vec!["b"]);
        assert_eq!(segments("/../../x"), vec!["x"]);
        assert!(segments("/").is_empty());
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_url_scheme() {
        assert_eq!(segments("qrc:/text/readme.txt"), vec!["text", "readme.txt"]);
        assert_eq!(key("qrc:/text/readme.txt"), key(":/text/readme.txt"));
        assert_eq!(key("qrc:text"), "text");
        assert!(segments("qrc:/").is_empty());
        // Only a leading scheme is special
        assert_eq!(segments("/a/qrc:/b"), vec!["a", "qrc:", "b"]);
    }

    #[test]
    fn test_keys() {
        assert_eq!(key("/a/b"), "a/b");
        assert_eq!(key("/"), "");
        assert_eq!(display(""), "/");
        assert_eq!(display("a/b"), "/a/b");
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
    }
}
