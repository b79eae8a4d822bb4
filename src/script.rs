//! Component script processing
//!
//! The instance script is parsed with oxc and rewritten in place: `export` keywords
//! go away, props and getters are recorded, `$:` statements are made valid
//! TypeScript, and `$store` references are rewritten. The module script only
//! contributes names.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::walk::walk_program;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::ast::Script;
use crate::buffer::RewriteBuffer;
use crate::exports::{ComponentEvents, ExportedName, ExportedNames, SlotDefinitions};
use crate::expression::{declared_names, Analyzer, CallSite};
use crate::stores::{apply_edits, StoreSite, TextEdit};
use crate::validate::{
    BufferResultExt, CompilerError, Result, TransformError, ERR_COMPUTED_EVENT_KEY,
    ERR_SCRIPT_SYNTAX,
};

/// Everything the template walk and the assembler need to know about the scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptInfo {
    pub exports: ExportedNames,
    pub events: ComponentEvents,
    pub slots: SlotDefinitions,
    /// Untyped `createEventDispatcher()` results; their call sites name events.
    pub dispatchers: HashSet<String>,
    /// Top-level names of both scripts.
    pub declared: HashSet<String>,
    /// `const NAME = "literal"` at the top level of either script.
    pub string_consts: HashMap<String, String>,
    /// Spans of instance-script imports, hoisted in front of `render`.
    pub imports: Vec<(u32, u32)>,
    pub is_typescript: bool,
}

impl ScriptInfo {
    pub fn note_calls(&mut self, calls: &[CallSite]) {
        for call in calls {
            if !self.dispatchers.contains(&call.callee) {
                continue;
            }
            if let Some(event) = &call.event {
                self.events.discover(event, "__sveltets_2_customEvent");
            }
        }
    }
}

fn source_type(typescript: bool) -> SourceType {
    SourceType::default()
        .with_typescript(typescript)
        .with_module(true)
}

fn script_error(
    message: &str,
    file: &str,
    source: &str,
    start: u32,
    end: u32,
    strict: bool,
) -> TransformError {
    let error = CompilerError::at(ERR_SCRIPT_SYNTAX, message, file, source, start, end);
    if strict {
        TransformError::Strict(error.positioned(source))
    } else {
        TransformError::parse(error)
    }
}

fn first_parse_error(
    errors: &[oxc_diagnostics::OxcDiagnostic],
    base: u32,
    len: u32,
) -> (String, u32, u32) {
    let Some(first) = errors.first() else {
        return ("Invalid script".to_string(), base, base + len);
    };
    let (start, end) = first
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| (label.offset() as u32, (label.offset() + label.len()) as u32))
        .unwrap_or((0, len));
    (first.message.to_string(), base + start.min(len), base + end.min(len))
}

/// Collect names and string constants from the module script. Its text is left alone.
pub fn scan_module(
    info: &mut ScriptInfo,
    script: &Script,
    source: &str,
    file: &str,
    strict: bool,
) -> Result<()> {
    let text = script.content.text(source);
    let typescript = script.is_typescript() || info.is_typescript;
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, source_type(typescript)).parse();
    if !ret.errors.is_empty() {
        let (message, start, end) =
            first_parse_error(&ret.errors, script.content.start, text.len() as u32);
        return Err(script_error(&message, file, source, start, end, strict));
    }
    info.declared.extend(declared_names(&ret.program.body));
    collect_string_consts(&ret.program.body, &mut info.string_consts);
    Ok(())
}

fn collect_string_consts(body: &[Statement<'_>], out: &mut HashMap<String, String>) {
    for statement in body {
        let decl = match statement {
            Statement::VariableDeclaration(decl) => decl,
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => decl,
                _ => continue,
            },
            _ => continue,
        };
        if decl.kind != VariableDeclarationKind::Const {
            continue;
        }
        for declarator in &decl.declarations {
            let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                continue;
            };
            let value = match &declarator.init {
                Some(Expression::StringLiteral(lit)) => lit.value.to_string(),
                Some(Expression::TemplateLiteral(tpl)) if tpl.expressions.is_empty() => tpl
                    .quasis
                    .iter()
                    .map(|q| q.value.raw.to_string())
                    .collect(),
                _ => continue,
            };
            out.insert(id.name.to_string(), value);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTANCE SCRIPT
// ═══════════════════════════════════════════════════════════════════════════════

struct InstanceRewriter<'s> {
    source: &'s str,
    file: &'s str,
    base: u32,
    edits: Vec<TextEdit>,
    comments: Vec<(u32, u32)>,
    top_level_lets: HashSet<String>,
}

impl<'s> InstanceRewriter<'s> {
    fn abs(&self, pos: u32) -> u32 {
        self.base + pos
    }

    fn slice(&self, span: oxc_span::Span) -> &'s str {
        let start = self.abs(span.start) as usize;
        let end = self.abs(span.end) as usize;
        self.source.get(start..end).unwrap_or_default()
    }

    /// JSDoc comment that directly precedes `at` (only whitespace in between).
    fn doc_before(&self, at: u32) -> Option<String> {
        let (start, end) = *self.comments.iter().rev().find(|&&(_, end)| end <= at)?;
        let between = self.source.get(self.abs(end) as usize..self.abs(at) as usize)?;
        if !between.trim().is_empty() {
            return None;
        }
        let text = self.source.get(self.abs(start) as usize..self.abs(end) as usize)?;
        let inner = text.strip_prefix("/**")?.strip_suffix("*/")?;
        let cleaned: Vec<&str> = inner
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect();
        (!cleaned.is_empty()).then(|| format!(" {} ", cleaned.join("\n ")))
    }

    fn remove_export_keyword(&mut self, export: &ExportNamedDeclaration<'_>, decl_start: u32) {
        self.edits.push(TextEdit::new(
            self.abs(export.span.start),
            self.abs(decl_start),
            "",
        ));
    }

    fn export_declaration(
        &mut self,
        export: &ExportNamedDeclaration<'_>,
        declaration: &Declaration<'_>,
        info: &mut ScriptInfo,
    ) {
        let doc = self.doc_before(export.span.start);
        self.remove_export_keyword(export, declaration.span().start);
        match declaration {
            Declaration::VariableDeclaration(decl) => {
                let is_prop = matches!(
                    decl.kind,
                    VariableDeclarationKind::Let | VariableDeclarationKind::Var
                );
                for declarator in &decl.declarations {
                    let type_text = declarator
                        .type_annotation
                        .as_ref()
                        .map(|t| self.slice(t.type_annotation.span()).to_string());
                    let initialized = declarator.init.is_some();
                    for id in declarator.id.get_binding_identifiers() {
                        let name = id.name.to_string();
                        if is_prop && !initialized {
                            self.edits.push(TextEdit::insert(
                                self.abs(decl.span.end),
                                format!(";{} = __sveltets_2_any({});", name, name),
                            ));
                        }
                        info.exports.add(ExportedName {
                            name,
                            identifier: None,
                            type_text: if is_prop { type_text.clone() } else { None },
                            required: is_prop && !initialized,
                            doc: doc.clone(),
                            is_prop,
                        });
                    }
                }
            }
            Declaration::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    info.exports.add(getter(id.name.as_str(), doc));
                }
            }
            Declaration::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    info.exports.add(getter(id.name.as_str(), doc));
                }
            }
            // `$$Props`/`$$Events`/`$$Slots` are picked up by `surface_types`.
            _ => {}
        }
    }

    fn export_specifiers(&mut self, export: &ExportNamedDeclaration<'_>, info: &mut ScriptInfo) {
        for specifier in &export.specifiers {
            let local = specifier.local.name().to_string();
            let exported = specifier.exported.name().to_string();
            let is_prop = self.top_level_lets.contains(&local);
            info.exports.add(ExportedName {
                identifier: (local != exported).then(|| local.clone()),
                name: exported,
                type_text: None,
                required: false,
                doc: self.doc_before(export.span.start),
                is_prop,
            });
        }
        self.edits.push(TextEdit::new(
            self.abs(export.span.start),
            self.abs(export.span.end),
            "",
        ));
    }

    /// `$$Props`, `$$Events` and `$$Slots` declarations, exported or not. Runs
    /// before any event is discovered, so a declared `$$Events` replaces discovery.
    fn surface_types(&self, body: &[Statement<'_>], info: &mut ScriptInfo) {
        for statement in body {
            match statement {
                Statement::TSInterfaceDeclaration(decl) => self.surface_interface(decl, info),
                Statement::TSTypeAliasDeclaration(decl) => self.surface_alias(decl, info),
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(Declaration::TSInterfaceDeclaration(decl)) => {
                        self.surface_interface(decl, info)
                    }
                    Some(Declaration::TSTypeAliasDeclaration(decl)) => {
                        self.surface_alias(decl, info)
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn surface_interface(&self, decl: &TSInterfaceDeclaration<'_>, info: &mut ScriptInfo) {
        note_surface_type(decl.id.name.as_str(), info);
        if decl.id.name == "$$Events" {
            self.events_interface(&decl.body.body, info);
        }
    }

    fn surface_alias(&self, decl: &TSTypeAliasDeclaration<'_>, info: &mut ScriptInfo) {
        note_surface_type(decl.id.name.as_str(), info);
        if decl.id.name == "$$Events" {
            if let TSType::TSTypeLiteral(literal) = &decl.type_annotation {
                self.events_interface(&literal.members, info);
            }
        }
    }

    /// `$: x = expr` declares `x` when nothing else does; other labeled
    /// statements are parked inside an arrow so they stay valid statements.
    fn reactive_statement(&mut self, labeled: &LabeledStatement<'_>, declared: &mut HashSet<String>) {
        if let Statement::ExpressionStatement(stmt) = &labeled.body {
            if let Expression::AssignmentExpression(assign) = &stmt.expression {
                if let AssignmentTarget::AssignmentTargetIdentifier(id) = &assign.left {
                    let name = id.name.as_str();
                    if assign.operator == AssignmentOperator::Assign
                        && !name.starts_with('$')
                        && !declared.contains(name)
                    {
                        declared.insert(name.to_string());
                        let right = assign.right.span();
                        self.edits.push(TextEdit::new(
                            self.abs(labeled.span.start),
                            self.abs(stmt.span.start),
                            "let ",
                        ));
                        self.edits.push(TextEdit::new(
                            self.abs(id.span.end),
                            self.abs(right.start),
                            " = __sveltets_2_invalidate(() => (",
                        ));
                        self.edits.push(TextEdit::insert(self.abs(right.end), "))"));
                        return;
                    }
                }
            }
        }
        self.edits.push(TextEdit::insert_before(
            self.abs(labeled.span.start),
            ";() => {",
        ));
        self.edits
            .push(TextEdit::insert(self.abs(labeled.span.end), "}"));
    }

    fn dispatcher(
        &mut self,
        decl: &VariableDeclaration<'_>,
        info: &mut ScriptInfo,
    ) -> Result<()> {
        for declarator in &decl.declarations {
            let Some(Expression::CallExpression(call)) = &declarator.init else {
                continue;
            };
            let Expression::Identifier(callee) = &call.callee else {
                continue;
            };
            if callee.name != "createEventDispatcher" {
                continue;
            }
            let BindingPattern::BindingIdentifier(id) = &declarator.id else {
                continue;
            };
            match call.type_arguments.as_ref().and_then(|t| t.params.first()) {
                Some(ty) => {
                    if let TSType::TSTypeLiteral(literal) = ty {
                        for member in &literal.members {
                            let TSSignature::TSPropertySignature(property) = member else {
                                continue;
                            };
                            let name = match &property.key {
                                PropertyKey::StaticIdentifier(ident) if !property.computed => {
                                    ident.name.to_string()
                                }
                                PropertyKey::StringLiteral(lit) => lit.value.to_string(),
                                other => {
                                    let span = other.span();
                                    return Err(TransformError::structural(
                                        CompilerError::at(
                                            ERR_COMPUTED_EVENT_KEY,
                                            "Event names in createEventDispatcher types must be identifiers or string literals",
                                            self.file,
                                            self.source,
                                            self.abs(span.start),
                                            self.abs(span.end),
                                        )
                                        .with_hint("Replace the computed key with a literal name."),
                                    ));
                                }
                            };
                            let payload = property
                                .type_annotation
                                .as_ref()
                                .map(|t| self.slice(t.type_annotation.span()).to_string())
                                .unwrap_or_else(|| "any".to_string());
                            info.events.discover(&name, format!("CustomEvent<{}>", payload));
                        }
                    }
                    info.events
                        .dispatcher_types
                        .push(self.slice(ty.span()).to_string());
                }
                None => {
                    info.dispatchers.insert(id.name.to_string());
                }
            }
        }
        Ok(())
    }

    fn events_interface(&self, body: &[TSSignature<'_>], info: &mut ScriptInfo) {
        for member in body {
            if let TSSignature::TSPropertySignature(property) = member {
                if let Some(name) = property.key.static_name() {
                    let ty = property
                        .type_annotation
                        .as_ref()
                        .map(|t| self.slice(t.type_annotation.span()).to_string())
                        .unwrap_or_else(|| "any".to_string());
                    info.events.add(&name, ty);
                }
            }
        }
    }
}

fn note_surface_type(name: &str, info: &mut ScriptInfo) {
    match name {
        "$$Props" => info.exports.props_interface = true,
        "$$Events" => info.events.interface = true,
        "$$Slots" => info.slots.interface = true,
        _ => {}
    }
}

fn getter(name: &str, doc: Option<String>) -> ExportedName {
    ExportedName {
        name: name.to_string(),
        identifier: None,
        type_text: None,
        required: false,
        doc,
        is_prop: false,
    }
}

fn top_level_lets(body: &[Statement<'_>]) -> HashSet<String> {
    let mut names = HashSet::new();
    for statement in body {
        let decl = match statement {
            Statement::VariableDeclaration(decl) => decl,
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => decl,
                _ => continue,
            },
            _ => continue,
        };
        if decl.kind == VariableDeclarationKind::Const {
            continue;
        }
        for declarator in &decl.declarations {
            for id in declarator.id.get_binding_identifiers() {
                names.insert(id.name.to_string());
            }
        }
    }
    names
}

/// Rewrite the instance script in `buffer` and record its exported surface.
pub fn process_instance(
    buffer: &mut RewriteBuffer,
    info: &mut ScriptInfo,
    script: &Script,
    source: &str,
    file: &str,
    strict: bool,
) -> Result<()> {
    let text = script.content.text(source);
    let base = script.content.start;
    let typescript = script.is_typescript() || info.is_typescript;
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, text, source_type(typescript)).parse();
    if !ret.errors.is_empty() {
        let (message, start, end) = first_parse_error(&ret.errors, base, text.len() as u32);
        return Err(script_error(&message, file, source, start, end, strict));
    }
    let program = &ret.program;
    let mut declared: HashSet<String> = declared_names(&program.body).into_iter().collect();
    info.declared.extend(declared.iter().cloned());

    // Stores first: every later edit is placed around them. Top-level names are
    // filtered below rather than treated as locals, so dispatcher calls are seen.
    let mut analyzer = Analyzer::new(base, 0);
    walk_program(&mut analyzer, program);
    let module_names = info.declared.clone();
    let sites: Vec<&StoreSite> = analyzer
        .out
        .stores
        .iter()
        .filter(|site| !module_names.contains(&site.sigil_name()))
        .collect();
    let mut edits: Vec<TextEdit> = sites.iter().flat_map(|s| s.edits()).collect();

    let mut rewriter = InstanceRewriter {
        source,
        file,
        base,
        edits: Vec::new(),
        comments: program
            .comments
            .iter()
            .filter(|c| c.is_block())
            .map(|c| (c.span.start, c.span.end))
            .collect(),
        top_level_lets: top_level_lets(&program.body),
    };

    rewriter.surface_types(&program.body, info);
    // Dispatchers are known before any call site is looked at.
    for statement in &program.body {
        if let Statement::VariableDeclaration(decl) = statement {
            rewriter.dispatcher(decl, info)?;
        }
    }
    info.note_calls(&analyzer.out.calls);
    collect_string_consts(&program.body, &mut info.string_consts);

    for statement in &program.body {
        match statement {
            Statement::ImportDeclaration(import) => {
                info.imports
                    .push((base + import.span.start, base + import.span.end));
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(declaration) => rewriter.export_declaration(export, declaration, info),
                None => rewriter.export_specifiers(export, info),
            },
            Statement::LabeledStatement(labeled) if labeled.label.name == "$" => {
                rewriter.reactive_statement(labeled, &mut declared);
            }
            _ => {}
        }
    }
    info.declared.extend(declared);

    debug!(
        exports = info.exports.names.len(),
        stores = sites.len(),
        imports = info.imports.len(),
        "processed instance script"
    );
    edits.extend(rewriter.edits);
    apply_edits(buffer, &edits).in_node("Script", script.start, script.end)
}
