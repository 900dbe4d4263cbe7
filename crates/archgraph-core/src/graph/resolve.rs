//! Specifier resolution over the in-memory module set.
//!
//! Resolution is pure: it consults only the set of scanned module paths and
//! package manifests, never the filesystem.

use std::collections::{BTreeMap, HashSet};

use super::ExternalOrigin;
use crate::scanner::PackageRoot;
use crate::utils::paths;

/// Extensions tried when a specifier omits one, in priority order.
const CANDIDATE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "mts", "cts", "d.ts", "js", "jsx", "mjs", "cjs",
];

/// Node core modules importable without the `node:` prefix.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Result of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A scanned module, by canonical path.
    Module(String),
    /// A dependency outside the scanned set.
    External {
        /// Package name.
        name: String,
        /// Origin of the dependency.
        origin: ExternalOrigin,
    },
    /// Nothing matched.
    Unresolved,
}

/// Returns true if a specifier names a package rather than a path.
#[must_use]
pub fn is_bare(specifier: &str) -> bool {
    !(specifier.is_empty()
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/'))
}

/// Splits a bare specifier into package name and optional subpath.
///
/// `@scope/pkg/a/b` → (`@scope/pkg`, `a/b`); `lodash/fp` → (`lodash`, `fp`).
#[must_use]
pub fn split_bare(specifier: &str) -> (&str, Option<&str>) {
    let name_segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut end = 0;
    for (seen, (i, _)) in specifier.match_indices('/').enumerate() {
        if seen + 1 == name_segments {
            end = i;
            break;
        }
    }
    if end == 0 {
        (specifier, None)
    } else {
        let sub = &specifier[end + 1..];
        (&specifier[..end], (!sub.is_empty()).then_some(sub))
    }
}

/// Resolves specifiers against a fixed module set and package list.
pub struct Resolver<'a> {
    modules: HashSet<&'a str>,
    packages: BTreeMap<&'a str, &'a PackageRoot>,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver. When two packages share a name, the first by
    /// root order wins.
    #[must_use]
    pub fn new(modules: impl IntoIterator<Item = &'a str>, packages: &'a [PackageRoot]) -> Self {
        let mut by_name = BTreeMap::new();
        for p in packages {
            by_name.entry(p.name.as_str()).or_insert(p);
        }
        Self {
            modules: modules.into_iter().collect(),
            packages: by_name,
        }
    }

    /// Resolves `specifier` as written in the module at `from`.
    #[must_use]
    pub fn resolve(&self, from: &str, specifier: &str) -> Resolution {
        if specifier.is_empty() {
            return Resolution::Unresolved;
        }
        if !is_bare(specifier) {
            let (base, tail) = match specifier.strip_prefix('/') {
                Some(rest) => ("", rest),
                None => (paths::parent(from), specifier),
            };
            return paths::normalize(base, tail)
                .and_then(|target| self.find_file(&target))
                .map_or(Resolution::Unresolved, Resolution::Module);
        }

        if let Some(rest) = specifier.strip_prefix("node:") {
            let (name, _) = split_bare(rest);
            return external(name, ExternalOrigin::Builtin);
        }
        if specifier.starts_with('#') || specifier.contains(':') {
            return Resolution::Unresolved;
        }

        let (name, subpath) = split_bare(specifier);
        if NODE_BUILTINS.contains(&name) && !self.packages.contains_key(name) {
            return external(name, ExternalOrigin::Builtin);
        }
        let Some(package) = self.packages.get(name) else {
            return external(name, ExternalOrigin::Registry);
        };

        let found = match subpath {
            Some(sub) => self
                .find_file(&paths::join(&package.root, sub))
                .or_else(|| self.find_file(&paths::join(&package.root, &format!("src/{sub}")))),
            None => self.entry(package),
        };
        found.map_or_else(
            || external(name, ExternalOrigin::Workspace),
            Resolution::Module,
        )
    }

    fn entry(&self, package: &PackageRoot) -> Option<String> {
        package
            .entry_points
            .iter()
            .filter_map(|e| paths::normalize(&package.root, e))
            .find_map(|target| self.find_file(&target))
            .or_else(|| self.find_file(&paths::join(&package.root, "src/index")))
            .or_else(|| self.find_file(&paths::join(&package.root, "index")))
    }

    /// Tries the exact path, a TypeScript sibling for JS extensions, each
    /// candidate extension, then `index.<ext>` inside the path.
    fn find_file(&self, target: &str) -> Option<String> {
        if target.is_empty() {
            return self.find_index(target);
        }
        if self.modules.contains(target) {
            return Some(target.to_string());
        }
        if let Some(ext) = paths::extension(target) {
            let stem = &target[..target.len() - ext.len() - 1];
            let siblings: &[&str] = match ext {
                "js" => &["ts", "tsx"],
                "jsx" => &["tsx"],
                "mjs" => &["mts"],
                "cjs" => &["cts"],
                _ => &[],
            };
            for sibling in siblings {
                let candidate = format!("{stem}.{sibling}");
                if self.modules.contains(candidate.as_str()) {
                    return Some(candidate);
                }
            }
        }
        for ext in CANDIDATE_EXTENSIONS {
            let candidate = format!("{target}.{ext}");
            if self.modules.contains(candidate.as_str()) {
                return Some(candidate);
            }
        }
        self.find_index(target)
    }

    fn find_index(&self, dir: &str) -> Option<String> {
        CANDIDATE_EXTENSIONS.iter().find_map(|ext| {
            let candidate = paths::join(dir, &format!("index.{ext}"));
            self.modules
                .contains(candidate.as_str())
                .then_some(candidate)
        })
    }
}

fn external(name: &str, origin: ExternalOrigin) -> Resolution {
    Resolution::External {
        name: name.to_string(),
        origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn package(name: &str, root: &str, entries: &[&str]) -> PackageRoot {
        PackageRoot {
            name: name.to_string(),
            root: root.to_string(),
            manifest: paths::join(root, "package.json"),
            declared: Some(BTreeSet::new()),
            dependency_lines: BTreeMap::new(),
            entry_points: entries.iter().map(|s| (*s).to_string()).collect(),
            manifest_hash: String::new(),
        }
    }

    const MODULES: &[&str] = &[
        "packages/app/src/main.ts",
        "packages/app/src/util/index.ts",
        "packages/app/src/legacy.tsx",
        "packages/app/src/types.d.ts",
        "packages/core/src/index.ts",
        "packages/core/src/model.ts",
        "packages/ui/lib/entry.js",
        "scripts/build.mjs",
    ];

    fn with<R>(f: impl FnOnce(&Resolver<'_>) -> R) -> R {
        let packages = vec![
            package("app", "packages/app", &[]),
            package("@acme/core", "packages/core", &[]),
            package("@acme/ui", "packages/ui", &["./lib/entry.js"]),
            package("@acme/empty", "packages/empty", &[]),
        ];
        let resolver = Resolver::new(MODULES.iter().copied(), &packages);
        f(&resolver)
    }

    fn module(path: &str) -> Resolution {
        Resolution::Module(path.to_string())
    }

    #[test]
    fn bare_detection_and_split() {
        assert!(is_bare("lodash"));
        assert!(is_bare("@scope/pkg/sub"));
        assert!(!is_bare("./a"));
        assert!(!is_bare("../a"));
        assert!(!is_bare("/src/a"));
        assert_eq!(split_bare("lodash/fp"), ("lodash", Some("fp")));
        assert_eq!(split_bare("@scope/pkg/a/b"), ("@scope/pkg", Some("a/b")));
        assert_eq!(split_bare("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(split_bare("react"), ("react", None));
    }

    #[test]
    fn relative_with_extension_probing() {
        with(|r| {
            let from = "packages/app/src/main.ts";
            assert_eq!(r.resolve(from, "./legacy"), module("packages/app/src/legacy.tsx"));
            assert_eq!(r.resolve(from, "./util"), module("packages/app/src/util/index.ts"));
            assert_eq!(r.resolve(from, "./types"), module("packages/app/src/types.d.ts"));
            assert_eq!(
                r.resolve(from, "../../core/src/model.js"),
                module("packages/core/src/model.ts")
            );
            assert_eq!(r.resolve(from, "./missing"), Resolution::Unresolved);
            assert_eq!(r.resolve(from, "../../../../x"), Resolution::Unresolved);
        });
    }

    #[test]
    fn root_relative() {
        with(|r| {
            assert_eq!(
                r.resolve("packages/app/src/main.ts", "/scripts/build.mjs"),
                module("scripts/build.mjs")
            );
        });
    }

    #[test]
    fn workspace_packages() {
        with(|r| {
            let from = "packages/app/src/main.ts";
            assert_eq!(r.resolve(from, "@acme/core"), module("packages/core/src/index.ts"));
            assert_eq!(r.resolve(from, "@acme/core/model"), module("packages/core/src/model.ts"));
            assert_eq!(r.resolve(from, "@acme/ui"), module("packages/ui/lib/entry.js"));
            assert_eq!(
                r.resolve(from, "@acme/empty"),
                Resolution::External {
                    name: "@acme/empty".into(),
                    origin: ExternalOrigin::Workspace
                }
            );
        });
    }

    #[test]
    fn builtins_and_registry() {
        with(|r| {
            let from = "packages/app/src/main.ts";
            assert_eq!(
                r.resolve(from, "node:fs/promises"),
                Resolution::External {
                    name: "fs".into(),
                    origin: ExternalOrigin::Builtin
                }
            );
            assert_eq!(
                r.resolve(from, "path"),
                Resolution::External {
                    name: "path".into(),
                    origin: ExternalOrigin::Builtin
                }
            );
            assert_eq!(
                r.resolve(from, "lodash/fp"),
                Resolution::External {
                    name: "lodash".into(),
                    origin: ExternalOrigin::Registry
                }
            );
            assert_eq!(r.resolve(from, "#internal"), Resolution::Unresolved);
        });
    }
}
