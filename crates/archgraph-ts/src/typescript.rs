//! TypeScript/JavaScript parser using Tree-sitter.

use std::path::Path;

use archgraph_core::config::SOURCE_EXTENSIONS;
use archgraph_core::parser::Exports;
use archgraph_core::{ImportKind, ModuleParser, ParseError, ParsedModule, RawImport};
use tracing::debug;
use tree_sitter::{Language, Node, Parser};

/// Extracts imports and exports from TypeScript and JavaScript sources.
///
/// `.ts`, `.mts` and `.cts` use the TypeScript grammar. Everything else uses
/// the TSX grammar so JSX in plain `.js` files parses.
pub struct TypeScriptParser {
    typescript: Language,
    tsx: Language,
}

impl TypeScriptParser {
    /// Creates a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn language_for(&self, path: &Path) -> &Language {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "mts" | "cts") => &self.typescript,
            _ => &self.tsx,
        }
    }
}

impl Default for TypeScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleParser for TypeScriptParser {
    fn id(&self) -> &'static str {
        "typescript"
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn extensions(&self) -> &'static [&'static str] {
        SOURCE_EXTENSIONS
    }

    fn parse(&self, path: &Path, source: &str) -> Result<ParsedModule, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(self.language_for(path))
            .map_err(|e| ParseError::Internal {
                message: e.to_string(),
            })?;
        let src = source.as_bytes();
        let tree = parser.parse(src, None).ok_or_else(|| ParseError::Internal {
            message: "tree-sitter returned no tree".to_string(),
        })?;
        let root = tree.root_node();

        if root.has_error() {
            if let Some(node) = first_error(root) {
                let pos = node.start_position();
                debug!(file = %path.display(), line = pos.row + 1, "syntax error");
                return Err(ParseError::Syntax {
                    line: pos.row + 1,
                    column: pos.column + 1,
                });
            }
        }

        let mut module = ParsedModule::default();
        collect_imports(root, src, &mut module.imports);

        let mut statements = 0;
        let mut reexports = 0;
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            if node.kind() == "comment" {
                continue;
            }
            statements += 1;
            if node.kind() == "export_statement" {
                if node.child_by_field_name("source").is_some() {
                    reexports += 1;
                }
                collect_exports(node, src, &mut module.exports);
            }
        }
        module.reexport_only = statements > 0 && statements == reexports;

        Ok(module)
    }
}

fn text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// True if `node` has an anonymous keyword child such as `type` or `default`.
fn has_keyword(node: Node<'_>, keyword: &str) -> bool {
    children(node)
        .iter()
        .any(|c| !c.is_named() && c.kind() == keyword)
}

/// First error or missing node in source order.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() {
            stack.extend(children(node).into_iter().rev());
        }
    }
    None
}

/// Unquoted value of a plain string literal. Template strings yield `None`.
fn string_value(node: Node<'_>, src: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let raw = text(node, src);
    let inner = raw.get(1..raw.len().checked_sub(1)?)?;
    Some(inner.to_string())
}

fn push(imports: &mut Vec<RawImport>, source: Node<'_>, src: &[u8], kind: ImportKind) {
    if let Some(specifier) = string_value(source, src) {
        let pos = source.start_position();
        imports.push(RawImport::new(specifier, kind, pos.row + 1, pos.column + 1));
    }
}

/// Walks the whole tree in source order.
fn collect_imports(root: Node<'_>, src: &[u8], imports: &mut Vec<RawImport>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                import_statement(node, src, imports);
                continue;
            }
            "export_statement" => {
                if let Some(source) = node.child_by_field_name("source") {
                    let kind = if has_keyword(node, "type")
                        || all_specifiers_typed(node, "export_clause", "export_specifier")
                    {
                        ImportKind::TypeOnly
                    } else {
                        ImportKind::ReExport
                    };
                    push(imports, source, src, kind);
                }
            }
            "call_expression" => call_expression(node, src, imports),
            _ => {}
        }
        stack.extend(children(node).into_iter().rev());
    }
}

fn import_statement(node: Node<'_>, src: &[u8], imports: &mut Vec<RawImport>) {
    let type_only = has_keyword(node, "type");
    if let Some(source) = node.child_by_field_name("source") {
        let kind = if type_only || all_specifiers_typed(node, "import_clause", "import_specifier")
        {
            ImportKind::TypeOnly
        } else {
            ImportKind::Static
        };
        push(imports, source, src, kind);
        return;
    }
    // import x = require("x")
    for child in children(node) {
        if child.kind() == "import_require_clause" {
            if let Some(source) = child.child_by_field_name("source") {
                let kind = if type_only {
                    ImportKind::TypeOnly
                } else {
                    ImportKind::Static
                };
                push(imports, source, src, kind);
            }
        }
    }
}

/// True when the clause lists at least one specifier and every specifier is
/// `type`-qualified. A default or namespace binding makes it a value import.
fn all_specifiers_typed(statement: Node<'_>, clause_kind: &str, specifier_kind: &str) -> bool {
    let Some(clause) = children(statement)
        .into_iter()
        .find(|c| c.kind() == clause_kind)
    else {
        return false;
    };

    let mut specifiers = Vec::new();
    for child in children(clause) {
        match child.kind() {
            "named_imports" => specifiers.extend(
                children(child)
                    .into_iter()
                    .filter(|c| c.kind() == specifier_kind),
            ),
            k if k == specifier_kind => specifiers.push(child),
            _ if child.is_named() => return false,
            _ => {}
        }
    }
    !specifiers.is_empty() && specifiers.iter().all(|s| has_keyword(*s, "type"))
}

fn call_expression(node: Node<'_>, src: &[u8], imports: &mut Vec<RawImport>) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let kind = match function.kind() {
        "import" => ImportKind::Dynamic,
        "identifier" if text(function, src) == "require" => ImportKind::Static,
        _ => return,
    };
    let Some(arguments) = node.child_by_field_name("arguments") else {
        return;
    };
    let mut cursor = arguments.walk();
    let first = arguments.named_children(&mut cursor).next();
    if let Some(argument) = first {
        push(imports, argument, src, kind);
    }
}

fn collect_exports(node: Node<'_>, src: &[u8], exports: &mut Exports) {
    if has_keyword(node, "default") {
        exports.insert("default");
        return;
    }
    if has_keyword(node, "=") {
        exports.mark_unknown();
        return;
    }
    if let Some(declaration) = node.child_by_field_name("declaration") {
        declaration_names(declaration, src, exports);
        return;
    }
    for child in children(node) {
        match child.kind() {
            "*" => exports.mark_unknown(),
            "namespace_export" => {
                let mut cursor = child.walk();
                let name = child.named_children(&mut cursor).next();
                if let Some(name) = name {
                    exports.insert(unquote(text(name, src)));
                }
            }
            "export_clause" => {
                for specifier in children(child) {
                    if specifier.kind() != "export_specifier" {
                        continue;
                    }
                    let name = specifier
                        .child_by_field_name("alias")
                        .or_else(|| specifier.child_by_field_name("name"));
                    if let Some(name) = name {
                        exports.insert(unquote(text(name, src)));
                    }
                }
            }
            _ => {}
        }
    }
}

fn declaration_names(declaration: Node<'_>, src: &[u8], exports: &mut Exports) {
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            for declarator in children(declaration) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                match declarator.child_by_field_name("name") {
                    Some(name) if name.kind() == "identifier" => exports.insert(text(name, src)),
                    // destructured exports
                    _ => exports.mark_unknown(),
                }
            }
        }
        "ambient_declaration" => {
            for inner in children(declaration) {
                if inner.is_named() {
                    declaration_names(inner, src, exports);
                }
            }
        }
        _ => match declaration.child_by_field_name("name") {
            Some(name) => exports.insert(unquote(text(name, src))),
            None => exports.mark_unknown(),
        },
    }
}

fn unquote(name: &str) -> &str {
    name.trim_matches(|c| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn parse_as(path: &str, src: &str) -> ParsedModule {
        TypeScriptParser::new().parse(Path::new(path), src).unwrap()
    }

    fn parse(src: &str) -> ParsedModule {
        parse_as("src/mod.ts", src)
    }

    fn imports(module: &ParsedModule) -> Vec<(&str, ImportKind, usize)> {
        module
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.kind, i.line))
            .collect()
    }

    fn names(module: &ParsedModule) -> BTreeSet<&str> {
        match &module.exports {
            Exports::Known(names) => names.iter().map(String::as_str).collect(),
            Exports::Unknown => panic!("exports unexpectedly unknown"),
        }
    }

    #[test]
    fn static_imports() {
        let m = parse(
            "import a from \"./a\";\nimport { b } from '../b';\n\
             import * as c from \"c\";\nimport \"./side\";\n",
        );
        assert_eq!(
            imports(&m),
            vec![
                ("./a", ImportKind::Static, 1),
                ("../b", ImportKind::Static, 2),
                ("c", ImportKind::Static, 3),
                ("./side", ImportKind::Static, 4),
            ]
        );
        assert_eq!(m.imports[1].column, 19);
    }

    #[test]
    fn type_only_imports() {
        let m = parse(
            "import type { A } from \"./a\";\n\
             import { type B, type C } from \"./b\";\n\
             import { type D, e } from \"./d\";\n",
        );
        let kinds: Vec<ImportKind> = m.imports.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![ImportKind::TypeOnly, ImportKind::TypeOnly, ImportKind::Static]
        );
    }

    #[test]
    fn default_binding_keeps_value_import() {
        let m = parse("import D, { type T } from \"./d\";\n");
        assert_eq!(m.imports[0].kind, ImportKind::Static);
    }

    #[test]
    fn reexports_and_barrel_detection() {
        let m = parse(
            "// barrel\nexport { a } from \"./a\";\nexport * from \"./b\";\n\
             export * as ns from \"./c\";\nexport type { T } from \"./t\";\n",
        );
        assert_eq!(
            imports(&m),
            vec![
                ("./a", ImportKind::ReExport, 2),
                ("./b", ImportKind::ReExport, 3),
                ("./c", ImportKind::ReExport, 4),
                ("./t", ImportKind::TypeOnly, 5),
            ]
        );
        assert_eq!(m.exports, Exports::Unknown);
        assert!(m.reexport_only);
    }

    #[test]
    fn named_reexports_keep_known_exports() {
        let m = parse("export { a as b, c } from \"./a\";\nexport * as ns from \"./n\";\n");
        assert_eq!(names(&m), BTreeSet::from(["b", "c", "ns"]));
        assert!(m.reexport_only);
    }

    #[test]
    fn declared_exports() {
        let m = parse(
            "export const a = 1, b = 2;\n\
             export function f() {}\n\
             export class C {}\n\
             export interface I {}\n\
             export type T = string;\n\
             export enum E { X }\n\
             const x = 1;\n\
             export { x as y };\n\
             export default f;\n",
        );
        assert_eq!(
            names(&m),
            BTreeSet::from(["a", "b", "f", "C", "I", "T", "E", "y", "default"])
        );
        assert!(!m.reexport_only);
        assert!(m.imports.is_empty());
    }

    #[test]
    fn export_assignment_is_unknown() {
        let m = parse("const api = {};\nexport = api;\n");
        assert_eq!(m.exports, Exports::Unknown);
    }

    #[test]
    fn dynamic_import_and_require() {
        let m = parse(
            "async function load() { return import(\"./lazy\"); }\n\
             const r = require(\"lodash\");\n\
             const n = import(name);\n\
             import fs = require(\"fs\");\n\
             const t = require(`tpl`);\n",
        );
        assert_eq!(
            imports(&m),
            vec![
                ("./lazy", ImportKind::Dynamic, 1),
                ("lodash", ImportKind::Static, 2),
                ("fs", ImportKind::Static, 4),
            ]
        );
    }

    #[test]
    fn nested_dynamic_import_inside_exported_declaration() {
        let m = parse("export const load = () => import(\"./page\");\n");
        assert_eq!(imports(&m), vec![("./page", ImportKind::Dynamic, 1)]);
        assert_eq!(names(&m), BTreeSet::from(["load"]));
    }

    #[test]
    fn tsx_and_jsx_use_tsx_grammar() {
        let m = parse_as(
            "src/App.tsx",
            "import React from \"react\";\nexport const App = () => <div>{1}</div>;\n",
        );
        assert_eq!(imports(&m), vec![("react", ImportKind::Static, 1)]);
        assert_eq!(names(&m), BTreeSet::from(["App"]));

        let m = parse_as("src/view.js", "export default () => <p />;\n");
        assert_eq!(names(&m), BTreeSet::from(["default"]));
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = TypeScriptParser::new()
            .parse(Path::new("src/bad.ts"), "import { a from \"./a\";\nconst = ;\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line, .. } if line >= 1));
    }

    #[test]
    fn empty_file_is_not_a_barrel() {
        let m = parse("");
        assert!(m.imports.is_empty());
        assert!(!m.reexport_only);
        assert_eq!(m.exports, Exports::default());
    }

    #[test]
    fn handles_every_source_extension() {
        let parser = TypeScriptParser::new();
        assert_eq!(parser.id(), "typescript");
        for ext in parser.extensions() {
            let path = format!("src/m.{ext}");
            let m = parser
                .parse(Path::new(&path), "import x from \"./x\";\n")
                .unwrap();
            assert_eq!(m.imports.len(), 1, "extension {ext}");
        }
    }
}
