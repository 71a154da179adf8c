use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use edgefn_core::ImportMap;
use regex::Regex;

use crate::source::SourceTree;

/// Matches `import … from "x"`, `import "x"` and `import("x")`.
static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)import\s+(?:\{[^{}]+\}|.*?)\s*(?:from)?\s*['"](.*?)['"]|import\(\s*['"](.*?)['"]\)"#,
    )
    .expect("valid import pattern")
});

/// A source file reached from the entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: Vec<u8>,
}

/// Iterates every local file transitively imported from an entrypoint.
///
/// Each resolved path is yielded at most once, so import cycles terminate.
/// The work list is a FIFO queue: files come out in breadth-first order,
/// which is deterministic for a given tree. Missing files are logged and
/// skipped; any other read failure ends the walk with an error.
pub struct ImportWalker<'a, S: SourceTree + ?Sized> {
    tree: &'a S,
    import_map: &'a ImportMap,
    discovered: HashSet<String>,
    queue: VecDeque<String>,
}

impl<'a, S: SourceTree + ?Sized> ImportWalker<'a, S> {
    pub fn new(entrypoint: &str, import_map: &'a ImportMap, tree: &'a S) -> Self {
        let entrypoint = entrypoint.to_owned();
        Self {
            tree,
            import_map,
            discovered: HashSet::from([entrypoint.clone()]),
            queue: VecDeque::from([entrypoint]),
        }
    }

    fn enqueue_imports(&mut self, current: &str, content: &[u8]) {
        let text = String::from_utf8_lossy(content);
        for captures in IMPORT_PATTERN.captures_iter(&text) {
            let Some(specifier) = captures.get(1).or_else(|| captures.get(2)) else {
                continue;
            };
            let Some(resolved) = resolve_specifier(current, specifier.as_str(), self.import_map)
            else {
                continue;
            };
            if self.discovered.insert(resolved.clone()) {
                self.queue.push_back(resolved);
            }
        }
    }
}

impl<S: SourceTree + ?Sized> Iterator for ImportWalker<'_, S> {
    type Item = Result<SourceFile, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.queue.pop_front() {
            let content = match self.tree.read(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path, "skipping missing import");
                    continue;
                }
                Err(e) => return Some(Err(WalkError::Read { path, source: e })),
            };
            self.enqueue_imports(&path, &content);
            return Some(Ok(SourceFile { path, content }));
        }
        None
    }
}

/// Resolve an import specifier found in `current`.
///
/// The longest matching import-map prefix is substituted first. Relative
/// results (`./`, `../`) are joined to the directory of `current`, absolute
/// ones are kept. Anything else (bare module names, URLs) is external and
/// yields `None`.
pub fn resolve_specifier(current: &str, specifier: &str, import_map: &ImportMap) -> Option<String> {
    let mapped = import_map.resolve(specifier.trim());
    if mapped.starts_with("./") || mapped.starts_with("../") {
        let dir = current.rsplit_once('/').map_or("", |(dir, _)| dir);
        Some(clean_path(&format!("{dir}/{mapped}"), dir.starts_with('/')))
    } else if mapped.starts_with('/') {
        Some(mapped.into_owned())
    } else {
        None
    }
}

/// Lexically normalize `.` and `..` segments.
fn clean_path(path: &str, absolute: bool) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_owned()
    } else {
        joined
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("failed to read source file {path}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid glob pattern {pattern:?}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to expand glob pattern {pattern:?}")]
    Glob {
        pattern: String,
        source: glob::GlobError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_resolves_parent_segments() {
        assert_eq!(clean_path("functions/hello/../_shared/util.ts", false), "functions/_shared/util.ts");
        assert_eq!(clean_path("functions/hello/./a.ts", false), "functions/hello/a.ts");
        assert_eq!(clean_path("../a.ts", false), "../a.ts");
        assert_eq!(clean_path("/a/../../b.ts", true), "/b.ts");
    }

    #[test]
    fn pattern_extracts_static_and_dynamic_imports() {
        let src = r#"
import { serve } from "https://deno.land/std/http/server.ts";
import * as helper from './helper.ts';
import {
  a,
  b,
} from "../shared/util.ts";
import "./side-effect.ts";
const lazy = await import("./lazy.ts");
"#;
        let found: Vec<String> = IMPORT_PATTERN
            .captures_iter(src)
            .filter_map(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_owned())
            .collect();

        assert_eq!(
            found,
            vec![
                "https://deno.land/std/http/server.ts",
                "./helper.ts",
                "../shared/util.ts",
                "./side-effect.ts",
                "./lazy.ts",
            ]
        );
    }

    #[test]
    fn relative_specifier_in_top_level_file() {
        let map = ImportMap::default();
        assert_eq!(resolve_specifier("index.ts", "./a.ts", &map).as_deref(), Some("a.ts"));
    }
}
