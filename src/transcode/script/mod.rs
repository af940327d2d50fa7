//! TypeScript / JavaScript bundling with oxc.
//!
//! Starting from an entry file, every imported module is resolved
//! (relative paths and `node_modules`, see [`resolve`]), transformed on its
//! own (strip types, lower syntax to the configured target) and linked into
//! a module registry. The registry is wrapped as an IIFE or kept as a
//! module body, then minified.
//!
//! An entry without imports, exports or requires skips the registry and is
//! emitted as-is inside the wrapper.

mod link;
mod resolve;

use std::fmt::Write;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use rustc_hash::FxHashMap;

use super::TranscodeError;
use crate::config::{ScriptFormat, ScriptsConfig};
use crate::freshness::{ContentHash, Fingerprint};
use crate::utils::path::normalize_path;
use link::{PREFIX, link};
use resolve::resolve;

/// Options that shape the output bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    pub format: ScriptFormat,
    pub target: String,
    pub minify: bool,
}

impl BundleOptions {
    pub fn from_config(config: &ScriptsConfig) -> Self {
        Self {
            format: config.format,
            target: config.target.clone(),
            minify: config.minify,
        }
    }

    fn fingerprint(&self) -> Fingerprint {
        let format = match self.format {
            ScriptFormat::Iife => "iife",
            ScriptFormat::Esm => "esm",
        };
        Fingerprint::new()
            .part(format)
            .part(&self.target)
            .part([u8::from(self.minify)])
    }

    /// Fingerprint of the current contents of `inputs` under these options.
    pub fn fingerprint_files(&self, inputs: &[PathBuf]) -> io::Result<ContentHash> {
        let mut fingerprint = self.fingerprint();
        for path in inputs {
            fingerprint = with_input(fingerprint, path, &fs::read(path)?);
        }
        Ok(fingerprint.finish())
    }
}

fn with_input(fingerprint: Fingerprint, path: &Path, bytes: &[u8]) -> Fingerprint {
    fingerprint
        .part(path.as_os_str().as_encoded_bytes())
        .part(bytes)
}

/// A bundled entry.
#[derive(Debug)]
pub struct Bundle {
    pub code: String,
    /// Every module file read, entry first.
    pub inputs: Vec<PathBuf>,
    /// [`BundleOptions::fingerprint_files`] over `inputs` as they were read.
    pub fingerprint: ContentHash,
}

/// Modules discovered from an entry, by registry id.
struct ModuleGraph {
    paths: Vec<PathBuf>,
    ids: FxHashMap<PathBuf, usize>,
}

impl ModuleGraph {
    fn new(entry: &Path) -> Self {
        let entry = normalize_path(entry);
        let mut ids = FxHashMap::default();
        ids.insert(entry.clone(), 0);
        Self {
            paths: vec![entry],
            ids,
        }
    }

    /// Registry id of `specifier` imported from `importer`.
    fn add(&mut self, specifier: &str, importer: &Path) -> Result<usize, String> {
        let path = resolve(specifier, importer)?;
        if let Some(&id) = self.ids.get(&path) {
            return Ok(id);
        }
        let id = self.paths.len();
        self.ids.insert(path.clone(), id);
        self.paths.push(path);
        Ok(id)
    }
}

/// Bundle one entry file and everything it imports.
pub fn bundle(entry: &Path, options: &BundleOptions) -> Result<Bundle, TranscodeError> {
    let mut graph = ModuleGraph::new(entry);
    let mut fingerprint = options.fingerprint();
    let mut bodies = Vec::new();
    let mut plain = false;

    let mut next = 0;
    while next < graph.paths.len() {
        let path = graph.paths[next].clone();
        let source = fs::read_to_string(&path).map_err(|e| TranscodeError::io(&path, e))?;
        fingerprint = with_input(fingerprint, &path, source.as_bytes());

        if is_json(&path) {
            bodies.push(json_module(&path, &source)?);
        } else {
            let code = transform(&path, &source, &options.target)?;
            let linked = link(&code, |spec| graph.add(spec, &path))
                .map_err(|e| TranscodeError::Script(format!("{}: {e}", path.display())))?;
            if next == 0 {
                plain = linked.plain;
            }
            bodies.push(linked.body);
        }
        next += 1;
    }

    let single = plain && bodies.len() == 1;
    let code = if single {
        bodies.concat()
    } else {
        registry(&bodies)
    };

    let code = match options.format {
        ScriptFormat::Iife if single => format!("(function () {{\n\"use strict\";\n{code}\n}})();\n"),
        ScriptFormat::Iife => format!("(function () {{\n{code}\n}})();\n"),
        ScriptFormat::Esm => code,
    };

    let code = if options.minify {
        let source_type = match options.format {
            ScriptFormat::Iife => SourceType::cjs(),
            ScriptFormat::Esm => SourceType::mjs(),
        };
        minify(&code, source_type)?
    } else {
        code
    };

    Ok(Bundle {
        code,
        inputs: graph.paths,
        fingerprint: fingerprint.finish(),
    })
}

/// Module bodies plus the registry runtime. Module 0 is the entry.
///
/// The runtime names use [`PREFIX`].
fn registry(bodies: &[String]) -> String {
    let mut out = format!("var {PREFIX}modules = [\n");
    for body in bodies {
        let _ = writeln!(out, "function (module, exports, require) {{\n{body}\n}},");
    }
    out.push_str("];\n");
    out.push_str(RUNTIME);
    let _ = writeln!(out, "{PREFIX}require(0);");
    out
}

const RUNTIME: &str = r#"var __sluice_cache = [];
function __sluice_require(id) {
  if (typeof id !== "number") throw new Error("Cannot find module '" + id + "'");
  var cached = __sluice_cache[id];
  if (cached) return cached.exports;
  var module = __sluice_cache[id] = { exports: {} };
  __sluice_modules[id].call(module.exports, module, module.exports, __sluice_require);
  return module.exports;
}
function __sluice_export(target, getters) {
  Object.defineProperty(target, "__esModule", { value: true });
  for (var name in getters) Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
}
function __sluice_star(target, source) {
  Object.keys(source).forEach(function (name) {
    if (name === "default" || Object.prototype.hasOwnProperty.call(target, name)) return;
    Object.defineProperty(target, name, { enumerable: true, get: function () { return source[name]; } });
  });
}
function __sluice_interop(m) {
  if (m && m.__esModule) return m;
  var ns = { default: m };
  if (m && (typeof m === "object" || typeof m === "function")) {
    Object.keys(m).forEach(function (name) { if (name !== "default") ns[name] = m[name]; });
  }
  return ns;
}
"#;

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn json_module(path: &Path, source: &str) -> Result<String, TranscodeError> {
    let value: serde_json::Value = serde_json::from_str(source)
        .map_err(|e| TranscodeError::Script(format!("{}: {e}", path.display())))?;
    Ok(format!("module.exports = {value};"))
}

/// Parse, strip types and lower syntax. Returns unminified code.
fn transform(path: &Path, source: &str, target: &str) -> Result<String, TranscodeError> {
    let allocator = Allocator::default();
    let mut source_type = SourceType::from_path(path)
        .map_err(|e| TranscodeError::Script(format!("{}: {e}", path.display())))?;
    if matches!(path.extension().and_then(|e| e.to_str()), Some("js" | "jsx")) {
        // Packages still ship CommonJS under `.js`
        source_type = source_type.with_unambiguous(true);
    }

    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(script_error(path, &ret.errors));
    }
    let mut program = ret.program;

    let ret = SemanticBuilder::new().build(&program);
    if !ret.errors.is_empty() {
        return Err(script_error(path, &ret.errors));
    }
    let scoping = ret.semantic.into_scoping();

    let options = TransformOptions::from_target(target).map_err(TranscodeError::Script)?;
    let ret = Transformer::new(&allocator, path, &options).build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        return Err(script_error(path, &ret.errors));
    }

    Ok(Codegen::new().build(&program).code)
}

/// Minify JavaScript source code (mangle + compress).
pub fn minify(source: &str, source_type: SourceType) -> Result<String, TranscodeError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(TranscodeError::Script(join_errors(&ret.errors)));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

fn script_error<E: std::fmt::Display>(path: &Path, errors: &[E]) -> TranscodeError {
    TranscodeError::Script(format!("{}: {}", path.display(), join_errors(errors)))
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(format: ScriptFormat, minify: bool) -> BundleOptions {
        BundleOptions {
            format,
            target: "es2015".into(),
            minify,
        }
    }

    /// Write `files` under a temp dir and return it with the first file's path.
    fn project(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let entry = dir.path().join(files[0].0);
        (dir, entry)
    }

    #[test]
    fn test_strips_types_and_wraps() {
        let (_dir, entry) = project(&[(
            "main.ts",
            "const greet = (name: string): string => `hi ${name}`;\nconsole.log(greet(\"a\"));",
        )]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap();
        assert!(out.code.starts_with("(function () {\n\"use strict\";"));
        assert!(out.code.trim_end().ends_with("})();"));
        assert!(!out.code.contains(": string"));
        assert!(!out.code.contains(PREFIX));
        assert_eq!(out.inputs.len(), 1);
    }

    #[test]
    fn test_type_only_import_is_not_followed() {
        let (_dir, entry) = project(&[(
            "main.ts",
            "import type { User } from './types';\nconst u: User = { id: 1 };\nconsole.log(u);",
        )]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap();
        assert_eq!(out.inputs.len(), 1);
        assert!(!out.code.contains(PREFIX));
    }

    #[test]
    fn test_bundles_imported_module() {
        let (dir, entry) = project(&[
            ("src/main.ts", "import { add } from './util';\nconsole.log(add(1, 2));\n"),
            ("src/util.ts", "export function add(a: number, b: number): number { return a + b; }\n"),
        ]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap();

        assert!(out.code.starts_with("(function () {"));
        assert!(!out.code.contains("import "));
        assert!(!out.code.contains("export "));
        assert!(out.code.contains("return a + b"));
        assert!(out.code.contains("__sluice_require(0);"));
        let util = normalize_path(&dir.path().join("src/util.ts"));
        assert_eq!(out.inputs, vec![normalize_path(&entry), util]);
    }

    #[test]
    fn test_node_modules_and_json() {
        let (_dir, entry) = project(&[
            (
                "src/main.js",
                "import pad from 'left-pad';\nimport config from './config.json';\nconsole.log(pad(config.name, 8));\n",
            ),
            ("src/config.json", "{\"name\": \"sluice\"}"),
            ("node_modules/left-pad/package.json", "{\"main\": \"index.js\"}"),
            (
                "node_modules/left-pad/index.js",
                "module.exports = function (s, n) { while (s.length < n) s = ' ' + s; return s; };\n",
            ),
        ]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap();
        assert_eq!(out.inputs.len(), 3);
        assert!(out.code.contains("module.exports = {\"name\":\"sluice\"};"));
        assert!(out.code.contains("while (s.length < n)"));
    }

    #[test]
    fn test_shared_module_bundled_once() {
        let (_dir, entry) = project(&[
            ("main.ts", "import { a } from './a';\nimport { b } from './b';\nconsole.log(a, b);\n"),
            ("a.ts", "import { shared } from './shared';\nexport const a = shared + 1;\n"),
            ("b.ts", "import { shared } from './shared';\nexport const b = shared + 2;\n"),
            ("shared.ts", "export const shared = 40;\n"),
        ]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap();
        assert_eq!(out.inputs.len(), 4);
        assert_eq!(out.code.matches("shared = 40").count(), 1);
    }

    #[test]
    fn test_unresolved_import_names_module() {
        let (_dir, entry) = project(&[("main.ts", "import { run } from './app';\nrun();\n")]);
        let err = bundle(&entry, &options(ScriptFormat::Iife, false)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("main.ts"), "{message}");
        assert!(message.contains("cannot resolve `./app`"), "{message}");
    }

    #[test]
    fn test_esm_format_is_unwrapped() {
        let (_dir, entry) = project(&[
            ("main.js", "import { run } from './app.js';\nrun();\n"),
            ("app.js", "export function run() { console.log('run'); }\n"),
        ]);
        let out = bundle(&entry, &options(ScriptFormat::Esm, false)).unwrap();
        assert!(out.code.starts_with("var __sluice_modules"));
        assert!(!out.code.contains("import "));
    }

    #[test]
    fn test_minified_output_is_smaller_and_stable() {
        let src = "function add(first: number, second: number) { return first + second; }\nconsole.log(add(1, 2));";
        let (_dir, entry) = project(&[("main.ts", src)]);
        let opts = options(ScriptFormat::Iife, true);
        let a = bundle(&entry, &opts).unwrap();
        let b = bundle(&entry, &opts).unwrap();
        assert_eq!(a.code, b.code);
        assert!(a.code.len() < src.len());
        assert!(!a.code.contains("second"));
    }

    #[test]
    fn test_minified_bundle_parses() {
        let (_dir, entry) = project(&[
            ("main.ts", "import { add } from './util';\nconsole.log(add(1, 2));\n"),
            ("util.ts", "export const add = (a: number, b: number) => a + b;\n"),
        ]);
        let out = bundle(&entry, &options(ScriptFormat::Iife, true)).unwrap();
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &out.code, SourceType::cjs()).parse();
        assert!(ret.errors.is_empty());
    }

    #[test]
    fn test_syntax_error() {
        let (_dir, entry) = project(&[("main.ts", "let = ;")]);
        let err = bundle(&entry, &options(ScriptFormat::Iife, true));
        assert!(matches!(err, Err(TranscodeError::Script(_))));
    }

    #[test]
    fn test_fingerprint_tracks_every_input() {
        let (dir, entry) = project(&[
            ("main.ts", "import { v } from './dep';\nconsole.log(v);\n"),
            ("dep.ts", "export const v = 1;\n"),
        ]);
        let opts = options(ScriptFormat::Iife, true);
        let out = bundle(&entry, &opts).unwrap();
        assert_eq!(opts.fingerprint_files(&out.inputs).unwrap(), out.fingerprint);

        fs::write(dir.path().join("dep.ts"), "export const v = 2;\n").unwrap();
        assert_ne!(opts.fingerprint_files(&out.inputs).unwrap(), out.fingerprint);

        let esm = options(ScriptFormat::Esm, true);
        assert_ne!(
            esm.fingerprint_files(&out.inputs).unwrap(),
            opts.fingerprint_files(&out.inputs).unwrap()
        );
    }
}
